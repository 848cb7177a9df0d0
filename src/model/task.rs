use serde::{Deserialize, Serialize};

/// Identifier of a task within one plan (`TASK-001`, `TASK-002`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

/// Extraction capability a task is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    ActionItemExtraction,
    RiskExtraction,
    DecisionExtraction,
    KnowledgeRetrieval,
    Qna,
    Evaluation,
    MessageDelivery,
}

impl Domain {
    pub const ALL: [Domain; 7] = [
        Domain::ActionItemExtraction,
        Domain::RiskExtraction,
        Domain::DecisionExtraction,
        Domain::KnowledgeRetrieval,
        Domain::Qna,
        Domain::Evaluation,
        Domain::MessageDelivery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::ActionItemExtraction => "action_item_extraction",
            Domain::RiskExtraction => "risk_extraction",
            Domain::DecisionExtraction => "decision_extraction",
            Domain::KnowledgeRetrieval => "knowledge_retrieval",
            Domain::Qna => "qna",
            Domain::Evaluation => "evaluation",
            Domain::MessageDelivery => "message_delivery",
        }
    }

    /// Resolve a tag as emitted by a planner. Accepts the agent tags and the
    /// three coarse domain categories; matching ignores case.
    pub fn from_tag(tag: &str) -> Option<Domain> {
        let normalized = tag.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let domain = match normalized.as_str() {
            "action_item_extraction" | "action_items" => Domain::ActionItemExtraction,
            "risk_extraction" | "risks" => Domain::RiskExtraction,
            "decision_extraction" | "decisions" => Domain::DecisionExtraction,
            "knowledge_retrieval" => Domain::KnowledgeRetrieval,
            "qna" => Domain::Qna,
            "evaluation" => Domain::Evaluation,
            "message_delivery" => Domain::MessageDelivery,
            "tracking_execution" => Domain::ActionItemExtraction,
            "communication_collaboration" => Domain::Qna,
            "learning_improvement" => Domain::DecisionExtraction,
            _ => return None,
        };
        Some(domain)
    }

    /// Purpose used when a candidate task arrives without one
    pub fn default_purpose(&self) -> &'static str {
        match self {
            Domain::ActionItemExtraction => "Extract action items with owners and deadlines",
            Domain::RiskExtraction => "Identify risks and blockers",
            Domain::DecisionExtraction => "Identify decisions made or pending",
            Domain::KnowledgeRetrieval => "Retrieve project context",
            Domain::Qna => "Formulate a gap-aware response to the sender",
            Domain::Evaluation => "Evaluate the prepared response before delivery",
            Domain::MessageDelivery => "Deliver the approved response to the sender",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated unit of work inside a plan
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub domain: Domain,
    pub purpose: String,
    #[serde(default)]
    pub depends_on: Vec<TaskId>,
}

/// Ordered task list for one message. Task order is a valid topological
/// order when the plan comes out of the plan builder.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Plan {
    pub message_id: String,
    pub tasks: Vec<Task>,
    /// Repairs and dropped tasks recorded while building the plan
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Plan {
    pub fn new(message_id: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            message_id: message_id.into(),
            tasks,
            warnings: Vec::new(),
        }
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
