use super::{agent_request, parse_payload, Agent, Upstream};
use crate::error::ExtractionError;
use crate::model::{clean_text, DeliveryRecord, DeliveryStatus, Domain, Message, TaskOutput};
use crate::provider::Invoker;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

const PROMPT: &str = include_str!("../../prompts/agents/delivery.md");

#[derive(Deserialize)]
struct ProposedDelivery {
    #[serde(default)]
    cc: Vec<String>,
    #[serde(default, alias = "delivery_status")]
    status: Option<String>,
}

fn parse_status(raw: Option<&str>) -> DeliveryStatus {
    match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
        Some("PENDING") => DeliveryStatus::Pending,
        Some("FAILED") => DeliveryStatus::Failed,
        _ => DeliveryStatus::Sent,
    }
}

/// Records delivery of the reply. Channel and recipient always come from the
/// message; only CC and status come from the provider. The scheduler only
/// runs this agent behind an approved evaluation.
pub struct DeliveryAgent {
    invoker: Invoker,
}

impl DeliveryAgent {
    pub fn new(invoker: Invoker) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl Agent for DeliveryAgent {
    fn domain(&self) -> Domain {
        Domain::MessageDelivery
    }

    async fn extract(
        &self,
        purpose: &str,
        message: &Message,
        upstream: &Upstream,
    ) -> Result<TaskOutput, ExtractionError> {
        let request = agent_request(self.domain(), PROMPT, purpose, message, upstream);
        let value = self.invoker.propose(&request).await?;
        let proposed: ProposedDelivery = parse_payload(self.domain(), value)?;

        let recipient = message.sender.name.clone();
        let mut cc: Vec<String> = Vec::new();
        for name in proposed.cc.iter().filter_map(|name| clean_text(name)) {
            if name != recipient && !cc.contains(&name) {
                cc.push(name);
            }
        }

        let record = DeliveryRecord {
            channel: message.source,
            recipient,
            cc,
            status: parse_status(proposed.status.as_deref()),
        };

        info!(
            "Reply to {} recorded on {} ({})",
            record.recipient, record.channel, record.status
        );
        Ok(TaskOutput::Delivery(record))
    }
}
