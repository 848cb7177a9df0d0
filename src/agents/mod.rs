//! Task registry and the extraction agents.
//!
//! Every agent turns `(purpose, message, upstream results)` into one typed
//! [`TaskOutput`]. Agents that need reasoning go through the shared
//! [`Invoker`]; provider output is parsed into the typed payload and
//! normalized before it leaves the agent.

mod action_items;
mod decisions;
mod delivery;
mod evaluation;
mod knowledge;
mod qna;
mod risks;

pub use action_items::ActionItemAgent;
pub use decisions::DecisionAgent;
pub use delivery::DeliveryAgent;
pub use evaluation::EvaluationAgent;
pub use knowledge::{KnowledgeAgent, ProjectCatalog};
pub use qna::QnaAgent;
pub use risks::RiskAgent;

use crate::error::ExtractionError;
use crate::model::{Domain, Message, TaskId, TaskOutput};
use crate::provider::{Invoker, PromptKind, ProposalRequest};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Outputs of a task's completed direct dependencies
pub type Upstream = BTreeMap<TaskId, TaskOutput>;

#[async_trait]
pub trait Agent: Send + Sync {
    fn domain(&self) -> Domain;

    async fn extract(
        &self,
        purpose: &str,
        message: &Message,
        upstream: &Upstream,
    ) -> Result<TaskOutput, ExtractionError>;
}

/// Domain tag to agent lookup. Holds no state beyond the mapping.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<Domain, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All seven agents backed by one invoker
    pub fn standard(invoker: Invoker, catalog: ProjectCatalog) -> Self {
        Self::new()
            .with(Arc::new(ActionItemAgent::new(invoker.clone())))
            .with(Arc::new(RiskAgent::new(invoker.clone())))
            .with(Arc::new(DecisionAgent::new(invoker.clone())))
            .with(Arc::new(KnowledgeAgent::new(invoker.clone(), catalog)))
            .with(Arc::new(QnaAgent::new(invoker.clone())))
            .with(Arc::new(EvaluationAgent::new(invoker.clone())))
            .with(Arc::new(DeliveryAgent::new(invoker)))
    }

    pub fn with(mut self, agent: Arc<dyn Agent>) -> Self {
        self.register(agent);
        self
    }

    /// Replaces any agent already registered for the same domain
    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        self.agents.insert(agent.domain(), agent);
    }

    pub fn lookup(&self, domain: Domain) -> Option<Arc<dyn Agent>> {
        self.agents.get(&domain).cloned()
    }

    pub fn contains(&self, domain: Domain) -> bool {
        self.agents.contains_key(&domain)
    }

    pub fn domains(&self) -> impl Iterator<Item = Domain> + '_ {
        self.agents.keys().copied()
    }
}

/// Request for an agent prompt: purpose, the message and upstream outputs
pub(crate) fn agent_request(
    domain: Domain,
    instructions: &str,
    purpose: &str,
    message: &Message,
    upstream: &Upstream,
) -> ProposalRequest {
    let upstream: Vec<Value> = upstream
        .iter()
        .map(|(task_id, output)| json!({ "task_id": task_id, "output": output }))
        .collect();

    ProposalRequest {
        kind: PromptKind::Agent(domain),
        instructions: instructions.to_string(),
        payload: json!({
            "purpose": purpose,
            "message": message,
            "upstream": upstream,
        }),
    }
}

pub(crate) fn parse_payload<T: DeserializeOwned>(
    domain: Domain,
    value: Value,
) -> Result<T, ExtractionError> {
    serde_json::from_value(value).map_err(|e| ExtractionError::Payload {
        domain: domain.to_string(),
        reason: e.to_string(),
    })
}

/// `{"items": [...]}` or a bare list. Items need not be `Default`.
#[derive(Deserialize)]
#[serde(untagged, bound = "T: Deserialize<'de>")]
pub(crate) enum ItemList<T> {
    Wrapped {
        #[serde(default)]
        items: Vec<T>,
    },
    Bare(Vec<T>),
}

impl<T> ItemList<T> {
    pub(crate) fn into_items(self) -> Vec<T> {
        match self {
            ItemList::Wrapped { items } => items,
            ItemList::Bare(items) => items,
        }
    }
}

/// Fill in `PREFIX-001` style ids where the provider left them out
pub(crate) fn number_items<T>(items: &mut [T], prefix: &str, id: impl Fn(&mut T) -> &mut Option<String>) {
    for (index, item) in items.iter_mut().enumerate() {
        let slot = id(item);
        if slot.is_none() {
            *slot = Some(format!("{}-{:03}", prefix, index + 1));
        }
    }
}
