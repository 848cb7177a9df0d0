use super::{agent_request, parse_payload, Agent, Upstream};
use crate::error::ExtractionError;
use crate::model::{ActionItem, Domain, GapFlag, Message, QnaAnswer, TaskOutput};
use crate::provider::Invoker;
use async_trait::async_trait;
use tracing::debug;

const PROMPT: &str = include_str!("../../prompts/agents/qna.md");

/// Gap-aware reply to the sender.
///
/// The provider drafts the reply. The agent then adds the gaps it can prove
/// from upstream results (unowned or undated action items, a missing
/// project) and the list of logged items, so a reply never claims more
/// than the pipeline knows.
pub struct QnaAgent {
    invoker: Invoker,
}

impl QnaAgent {
    pub fn new(invoker: Invoker) -> Self {
        Self { invoker }
    }
}

fn push_unique(list: &mut Vec<String>, entry: String) {
    if !list.iter().any(|existing| existing.eq_ignore_ascii_case(&entry)) {
        list.push(entry);
    }
}

fn missing_detail(item: &ActionItem) -> Option<String> {
    let owner = item.flags.contains(&GapFlag::MissingOwner);
    let deadline = item.flags.contains(&GapFlag::MissingDueDate);
    let what = match (owner, deadline) {
        (true, true) => "Owner and deadline",
        (true, false) => "Owner",
        (false, true) => "Deadline",
        (false, false) => return None,
    };
    Some(format!("{} for: {}", what, item.description))
}

/// Entries for the logged section, in upstream task order
fn logged_entries(upstream: &Upstream) -> Vec<String> {
    let mut logged = Vec::new();
    for output in upstream.values() {
        match output {
            TaskOutput::ActionItems { items } => {
                for item in items {
                    logged.push(format!(
                        "Action item {}: {}",
                        item.id.as_deref().unwrap_or("-"),
                        item.description
                    ));
                }
            }
            TaskOutput::Risks { items } => {
                for risk in items {
                    logged.push(format!(
                        "Risk {} ({}): {}",
                        risk.id.as_deref().unwrap_or("-"),
                        risk.severity,
                        risk.description
                    ));
                }
            }
            TaskOutput::Decisions { items } => {
                for decision in items {
                    logged.push(format!(
                        "Decision {} ({}): {}",
                        decision.id.as_deref().unwrap_or("-"),
                        decision.status,
                        decision.decision
                    ));
                }
            }
            _ => {}
        }
    }
    logged
}

#[async_trait]
impl Agent for QnaAgent {
    fn domain(&self) -> Domain {
        Domain::Qna
    }

    async fn extract(
        &self,
        purpose: &str,
        message: &Message,
        upstream: &Upstream,
    ) -> Result<TaskOutput, ExtractionError> {
        let request = agent_request(self.domain(), PROMPT, purpose, message, upstream);
        let value = self.invoker.propose(&request).await?;
        let mut answer: QnaAnswer = parse_payload(self.domain(), value)?;

        for output in upstream.values() {
            if let TaskOutput::ActionItems { items } = output {
                for gap in items.iter().filter_map(missing_detail) {
                    push_unique(&mut answer.needed, gap);
                }
            }
        }
        if message.project.is_none() {
            push_unique(
                &mut answer.needed,
                "Which project this request belongs to".to_string(),
            );
        }

        let logged = logged_entries(upstream);
        if !logged.is_empty() {
            answer.logged = logged;
        }

        answer.compose();

        debug!(
            "Answer for {} has {} open gaps",
            message.id,
            answer.needed.len()
        );
        Ok(TaskOutput::Answer(answer))
    }
}
