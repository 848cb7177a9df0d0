use super::{agent_request, parse_payload, Agent, Upstream};
use crate::error::ExtractionError;
use crate::model::{Check, Domain, Evaluation, Message, QnaAnswer, TaskOutput, Verdict};
use crate::provider::Invoker;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

const PROMPT: &str = include_str!("../../prompts/agents/evaluation.md");

/// Provider verdict before normalization. Every field is optional so a
/// partial answer can still be judged.
#[derive(Deserialize)]
struct ProposedEvaluation {
    #[serde(default)]
    relevance: Option<String>,
    #[serde(default)]
    accuracy: Option<String>,
    #[serde(default)]
    tone: Option<String>,
    #[serde(default)]
    gaps_acknowledged: Option<String>,
    #[serde(default, alias = "result", alias = "verdict")]
    overall: Option<String>,
    #[serde(default)]
    feedback: Option<String>,
}

/// Anything other than an explicit pass fails
fn parse_check(raw: Option<&str>) -> Check {
    match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
        Some("PASS") => Check::Pass,
        _ => Check::Fail,
    }
}

fn parse_verdict(raw: Option<&str>) -> Option<Verdict> {
    match raw?.trim().to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
        "APPROVED" | "APPROVE" => Some(Verdict::Approved),
        "REJECTED" | "REJECT" | "NEEDS_REVISION" => Some(Verdict::Rejected),
        _ => None,
    }
}

/// Checks the reply produced upstream before delivery may run
pub struct EvaluationAgent {
    invoker: Invoker,
}

impl EvaluationAgent {
    pub fn new(invoker: Invoker) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl Agent for EvaluationAgent {
    fn domain(&self) -> Domain {
        Domain::Evaluation
    }

    async fn extract(
        &self,
        purpose: &str,
        message: &Message,
        upstream: &Upstream,
    ) -> Result<TaskOutput, ExtractionError> {
        let answer = upstream.values().rev().find_map(|output| match output {
            TaskOutput::Answer(answer) => Some(answer),
            _ => None,
        });

        let Some(answer) = answer else {
            info!("No reply upstream of evaluation for {}, approving", message.id);
            return Ok(TaskOutput::Evaluation(Evaluation {
                relevance: Check::Pass,
                accuracy: Check::Pass,
                tone: Check::Pass,
                gaps_acknowledged: Check::Pass,
                overall: Verdict::Approved,
                feedback: Some("No reply to evaluate".to_string()),
            }));
        };

        let request = agent_request(self.domain(), PROMPT, purpose, message, upstream);
        let value = self.invoker.propose(&request).await?;
        let proposed: ProposedEvaluation = parse_payload(self.domain(), value)?;

        let mut evaluation = Evaluation {
            relevance: parse_check(proposed.relevance.as_deref()),
            accuracy: parse_check(proposed.accuracy.as_deref()),
            tone: parse_check(proposed.tone.as_deref()),
            gaps_acknowledged: parse_check(proposed.gaps_acknowledged.as_deref()),
            overall: Verdict::Approved,
            feedback: proposed.feedback.filter(|f| !f.trim().is_empty()),
        };
        // Any failed check rejects; the provider can only tighten the verdict
        evaluation.overall = if evaluation.failed_checks() > 0 {
            Verdict::Rejected
        } else {
            parse_verdict(proposed.overall.as_deref()).unwrap_or(Verdict::Approved)
        };

        // A reply with open gaps must say so, whatever the provider thinks
        if answer.has_gaps() && !answer.text.contains(QnaAnswer::NEEDED_HEADER) {
            evaluation.gaps_acknowledged = Check::Fail;
            evaluation.overall = Verdict::Rejected;
        }

        debug!("Evaluation for {}: {}", message.id, evaluation.overall);
        Ok(TaskOutput::Evaluation(evaluation))
    }
}
