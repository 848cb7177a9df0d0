use super::{agent_request, number_items, parse_payload, Agent, ItemList, Upstream};
use crate::error::ExtractionError;
use crate::model::{ActionItem, Domain, Message, TaskOutput};
use crate::provider::Invoker;
use async_trait::async_trait;
use tracing::debug;

const PROMPT: &str = include_str!("../../prompts/agents/action_items.md");

pub struct ActionItemAgent {
    invoker: Invoker,
}

impl ActionItemAgent {
    pub fn new(invoker: Invoker) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl Agent for ActionItemAgent {
    fn domain(&self) -> Domain {
        Domain::ActionItemExtraction
    }

    async fn extract(
        &self,
        purpose: &str,
        message: &Message,
        upstream: &Upstream,
    ) -> Result<TaskOutput, ExtractionError> {
        let request = agent_request(self.domain(), PROMPT, purpose, message, upstream);
        let value = self.invoker.propose(&request).await?;

        let mut items: Vec<ActionItem> = parse_payload::<ItemList<ActionItem>>(self.domain(), value)?
            .into_items()
            .into_iter()
            .filter(|item| !item.description.trim().is_empty())
            .collect();

        // Gap flags are derived from the fields, never trusted from the provider
        for item in &mut items {
            item.refresh_flags();
        }
        number_items(&mut items, "AI", |item| &mut item.id);

        debug!("Extracted {} action items from {}", items.len(), message.id);
        Ok(TaskOutput::ActionItems { items })
    }
}
