use super::{agent_request, number_items, parse_payload, Agent, ItemList, Upstream};
use crate::error::ExtractionError;
use crate::model::{Domain, Message, Risk, TaskOutput};
use crate::provider::Invoker;
use async_trait::async_trait;
use tracing::debug;

const PROMPT: &str = include_str!("../../prompts/agents/risks.md");

pub struct RiskAgent {
    invoker: Invoker,
}

impl RiskAgent {
    pub fn new(invoker: Invoker) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl Agent for RiskAgent {
    fn domain(&self) -> Domain {
        Domain::RiskExtraction
    }

    async fn extract(
        &self,
        purpose: &str,
        message: &Message,
        upstream: &Upstream,
    ) -> Result<TaskOutput, ExtractionError> {
        let request = agent_request(self.domain(), PROMPT, purpose, message, upstream);
        let value = self.invoker.propose(&request).await?;

        let mut items: Vec<Risk> = parse_payload::<ItemList<Risk>>(self.domain(), value)?
            .into_items()
            .into_iter()
            .filter(|risk| !risk.description.trim().is_empty())
            .collect();
        number_items(&mut items, "RISK", |risk| &mut risk.id);

        debug!("Extracted {} risks from {}", items.len(), message.id);
        Ok(TaskOutput::Risks { items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Level, Sender, Source};
    use crate::provider::testing::{fast_invoker, ScriptedProvider};
    use crate::provider::PromptKind;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unset_probability_is_absent() {
        let provider = Arc::new(ScriptedProvider::new().reply(
            PromptKind::Agent(Domain::RiskExtraction),
            json!([
                {"description": "Timeline slip", "severity": "HIGH", "likelihood": "?"},
                {"description": "Vendor outage", "severity": "low"}
            ]),
        ));
        let agent = RiskAgent::new(fast_invoker(provider));
        let message = Message {
            id: "MSG-T".to_string(),
            source: Source::Email,
            sender: Sender::default(),
            content: "x".to_string(),
            project: None,
        };

        let TaskOutput::Risks { items } = agent
            .extract("risks", &message, &Upstream::new())
            .await
            .unwrap()
        else {
            panic!("expected risks");
        };

        assert_eq!(items[0].id.as_deref(), Some("RISK-001"));
        assert_eq!(items[0].severity, Level::High);
        assert!(items[0].probability.is_none());
        assert!(items[1].probability.is_none());
    }
}
