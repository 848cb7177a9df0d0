use super::candidate::{parse_candidates, CandidateTask};
use super::validate::check_structure;
use crate::error::{PlanError, ValidationError};
use crate::model::{Domain, Message, Plan, Task, TaskId};
use crate::provider::{Invoker, PromptKind, ProposalRequest};
use serde_json::json;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

const PLAN_PROMPT: &str = include_str!("../../prompts/plan.md");

/// The first proposal plus one corrective retry
pub const MAX_PLAN_ATTEMPTS: u32 = 2;

/// Issues `TASK-001`, `TASK-002`, ... for one plan build
#[derive(Debug, Default)]
pub struct TaskIdSequence {
    issued: u32,
}

impl TaskIdSequence {
    pub fn next_id(&mut self) -> TaskId {
        self.issued += 1;
        TaskId(format!("TASK-{:03}", self.issued))
    }
}

pub struct PlanBuilder {
    invoker: Invoker,
    domains: BTreeSet<Domain>,
    max_tasks: usize,
}

impl PlanBuilder {
    /// `domains` are the tags the task registry can serve; candidates routed
    /// anywhere else are dropped.
    pub fn new(
        invoker: Invoker,
        domains: impl IntoIterator<Item = Domain>,
        max_tasks: usize,
    ) -> Self {
        Self {
            invoker,
            domains: domains.into_iter().collect(),
            max_tasks: max_tasks.max(1),
        }
    }

    pub async fn build(&self, message: &Message) -> Result<Plan, PlanError> {
        let mut attempt = 1;
        let mut feedback: Option<ValidationError> = None;

        loop {
            let request = self.request(message, feedback.as_ref());
            let proposal = self.invoker.propose(&request).await?;
            debug!("Plan proposal (attempt {}): {}", attempt, proposal);

            let checked = parse_candidates(&proposal).and_then(|candidates| {
                check_structure(&candidates)?;
                Ok(candidates)
            });

            match checked {
                Ok(candidates) => return self.repair(message, candidates),
                Err(e) if attempt >= MAX_PLAN_ATTEMPTS => {
                    warn!("Plan for {} rejected after {} attempts: {}", message.id, attempt, e);
                    return Err(PlanError::Invalid {
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) => {
                    warn!("Plan attempt {} rejected: {}. Retrying with feedback", attempt, e);
                    feedback = Some(e);
                    attempt += 1;
                }
            }
        }
    }

    fn request(&self, message: &Message, feedback: Option<&ValidationError>) -> ProposalRequest {
        let domains: Vec<&str> = self.domains.iter().map(Domain::as_str).collect();
        let mut payload = json!({
            "message": message,
            "domains": domains,
            "max_tasks": self.max_tasks,
        });
        if let Some(error) = feedback {
            payload["feedback"] = json!(error.to_string());
        }

        ProposalRequest {
            kind: PromptKind::Plan,
            instructions: PLAN_PROMPT.to_string(),
            payload,
        }
    }

    /// Turn a structurally valid candidate list into a plan.
    ///
    /// Candidate order is kept, so the result stays topologically ordered.
    fn repair(&self, message: &Message, candidates: Vec<CandidateTask>) -> Result<Plan, PlanError> {
        let total = candidates.len();
        let mut sequence = TaskIdSequence::default();
        let mut remapped: HashMap<String, TaskId> = HashMap::new();
        let mut dropped: HashSet<String> = HashSet::new();
        let mut warnings = Vec::new();
        let mut tasks = Vec::new();

        for candidate in candidates {
            if tasks.len() >= self.max_tasks {
                warnings.push(format!(
                    "Dropped task '{}': plan is limited to {} tasks",
                    candidate.id, self.max_tasks
                ));
                dropped.insert(candidate.id);
                continue;
            }

            let upstream_dropped = candidate
                .depends_on
                .iter()
                .find(|dependency| dropped.contains(*dependency))
                .cloned();
            if let Some(dependency) = upstream_dropped {
                warnings.push(format!(
                    "Dropped task '{}': depends on dropped task '{}'",
                    candidate.id, dependency
                ));
                dropped.insert(candidate.id);
                continue;
            }

            let domain = match self.resolve_domain(&candidate) {
                Ok(domain) => domain,
                Err(reason) => {
                    warnings.push(format!("Dropped task '{}': {}", candidate.id, reason));
                    dropped.insert(candidate.id);
                    continue;
                }
            };

            let id = sequence.next_id();
            let mut depends_on: Vec<TaskId> = Vec::new();
            for dependency in &candidate.depends_on {
                if let Some(mapped) = remapped.get(dependency) {
                    if !depends_on.contains(mapped) {
                        depends_on.push(mapped.clone());
                    }
                }
            }

            let purpose = candidate
                .purpose
                .or(candidate.description)
                .unwrap_or_else(|| domain.default_purpose().to_string());

            remapped.insert(candidate.id, id.clone());
            tasks.push(Task {
                id,
                domain,
                purpose,
                depends_on,
            });
        }

        for warning in &warnings {
            warn!("{}", warning);
        }

        if tasks.is_empty() {
            return Err(PlanError::Empty { dropped: total });
        }

        info!(
            "Planned {} tasks for {} ({} dropped)",
            tasks.len(),
            message.id,
            dropped.len()
        );

        let mut plan = Plan::new(message.id.clone(), tasks);
        plan.warnings = warnings;
        Ok(plan)
    }

    fn resolve_domain(&self, candidate: &CandidateTask) -> Result<Domain, String> {
        let tags = [candidate.agent.as_deref(), candidate.domain.as_deref()];

        match tags.into_iter().flatten().find_map(Domain::from_tag) {
            Some(domain) if self.domains.contains(&domain) => Ok(domain),
            Some(domain) => Err(format!("no agent registered for '{}'", domain)),
            None => match tags.into_iter().flatten().next() {
                Some(tag) => Err(format!("unknown domain '{}'", tag)),
                None => Err("no domain given".to_string()),
            },
        }
    }
}
