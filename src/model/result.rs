use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::message::Message;
use super::payload::{
    ActionItem, Decision, DeliveryRecord, Evaluation, KnowledgeSnapshot, QnaAnswer, Risk,
    TaskOutput,
};
use super::task::{Plan, Task, TaskId};

/// Why a task ended up FAILED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    DependencyFailed,
    UnknownDomain,
    ProviderError,
    EvaluationRejected,
    Timeout,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::DependencyFailed => write!(f, "DEPENDENCY_FAILED"),
            FailureReason::UnknownDomain => write!(f, "UNKNOWN_DOMAIN"),
            FailureReason::ProviderError => write!(f, "PROVIDER_ERROR"),
            FailureReason::EvaluationRejected => write!(f, "EVALUATION_REJECTED"),
            FailureReason::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Completed {
        output: TaskOutput,
    },
    Failed {
        reason: FailureReason,
        detail: String,
    },
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "PENDING"),
            TaskStatus::Completed { .. } => write!(f, "COMPLETED"),
            TaskStatus::Failed { .. } => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub status: TaskStatus,
}

impl TaskResult {
    pub fn pending(task_id: TaskId) -> Self {
        Self {
            task_id,
            status: TaskStatus::Pending,
        }
    }

    pub fn completed(task_id: TaskId, output: TaskOutput) -> Self {
        Self {
            task_id,
            status: TaskStatus::Completed { output },
        }
    }

    pub fn failed(task_id: TaskId, reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            task_id,
            status: TaskStatus::Failed {
                reason,
                detail: detail.into(),
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, TaskStatus::Pending)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, TaskStatus::Failed { .. })
    }

    pub fn output(&self) -> Option<&TaskOutput> {
        match &self.status {
            TaskStatus::Completed { output } => Some(output),
            _ => None,
        }
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match &self.status {
            TaskStatus::Failed { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// The finished artifact for one message: plan, per-task results and the
/// canonical rendered report
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrchestrationMap {
    pub message: Message,
    pub plan: Plan,
    pub results: BTreeMap<TaskId, TaskResult>,
    pub rendered_text: String,
}

impl OrchestrationMap {
    pub fn result(&self, id: &TaskId) -> Option<&TaskResult> {
        self.results.get(id)
    }

    /// Completed outputs in plan order
    pub fn outputs(&self) -> impl Iterator<Item = (&Task, &TaskOutput)> {
        self.plan
            .tasks
            .iter()
            .filter_map(|task| Some((task, self.results.get(&task.id)?.output()?)))
    }

    pub fn action_items(&self) -> Vec<&ActionItem> {
        self.outputs()
            .flat_map(|(_, output)| match output {
                TaskOutput::ActionItems { items } => items.iter().collect::<Vec<_>>(),
                _ => Vec::new(),
            })
            .collect()
    }

    pub fn risks(&self) -> Vec<&Risk> {
        self.outputs()
            .flat_map(|(_, output)| match output {
                TaskOutput::Risks { items } => items.iter().collect::<Vec<_>>(),
                _ => Vec::new(),
            })
            .collect()
    }

    pub fn decisions(&self) -> Vec<&Decision> {
        self.outputs()
            .flat_map(|(_, output)| match output {
                TaskOutput::Decisions { items } => items.iter().collect::<Vec<_>>(),
                _ => Vec::new(),
            })
            .collect()
    }

    pub fn knowledge(&self) -> Option<&KnowledgeSnapshot> {
        self.outputs().find_map(|(_, output)| match output {
            TaskOutput::Knowledge(snapshot) => Some(snapshot),
            _ => None,
        })
    }

    /// The last answer in plan order, which is the one delivery acts on
    pub fn answer(&self) -> Option<&QnaAnswer> {
        self.outputs()
            .filter_map(|(_, output)| match output {
                TaskOutput::Answer(answer) => Some(answer),
                _ => None,
            })
            .last()
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        self.outputs()
            .filter_map(|(_, output)| match output {
                TaskOutput::Evaluation(evaluation) => Some(evaluation),
                _ => None,
            })
            .last()
    }

    pub fn delivery(&self) -> Option<&DeliveryRecord> {
        self.outputs().find_map(|(_, output)| match output {
            TaskOutput::Delivery(record) => Some(record),
            _ => None,
        })
    }

    pub fn failed_count(&self) -> usize {
        self.results.values().filter(|r| r.is_failed()).count()
    }
}
