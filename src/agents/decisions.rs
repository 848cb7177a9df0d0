use super::{agent_request, number_items, parse_payload, Agent, ItemList, Upstream};
use crate::error::ExtractionError;
use crate::model::{Decision, Domain, Message, TaskOutput};
use crate::provider::Invoker;
use async_trait::async_trait;
use tracing::debug;

const PROMPT: &str = include_str!("../../prompts/agents/decisions.md");

pub struct DecisionAgent {
    invoker: Invoker,
}

impl DecisionAgent {
    pub fn new(invoker: Invoker) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl Agent for DecisionAgent {
    fn domain(&self) -> Domain {
        Domain::DecisionExtraction
    }

    async fn extract(
        &self,
        purpose: &str,
        message: &Message,
        upstream: &Upstream,
    ) -> Result<TaskOutput, ExtractionError> {
        let request = agent_request(self.domain(), PROMPT, purpose, message, upstream);
        let value = self.invoker.propose(&request).await?;

        let mut items: Vec<Decision> = parse_payload::<ItemList<Decision>>(self.domain(), value)?
            .into_items()
            .into_iter()
            .filter(|decision| !decision.decision.trim().is_empty())
            .map(|mut decision| {
                if decision.topic.trim().is_empty() {
                    decision.topic = "General".to_string();
                }
                decision
            })
            .collect();
        number_items(&mut items, "DEC", |decision| &mut decision.id);

        debug!("Extracted {} decisions from {}", items.len(), message.id);
        Ok(TaskOutput::Decisions { items })
    }
}
