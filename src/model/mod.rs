//! Core data model: the inbound message, the task plan built from it, the
//! typed payloads agents produce, and the orchestration map that ties them
//! together.

mod message;
mod payload;
mod result;
mod task;

pub use message::{Message, Sender, Source};
pub use payload::{
    ActionItem, Check, DecisionStatus, Decision, DeliveryRecord, DeliveryStatus, Evaluation,
    GapFlag, KnowledgeSnapshot, KnowledgeSource, Level, QnaAnswer, Risk, TaskOutput, Verdict,
};
pub use result::{FailureReason, OrchestrationMap, TaskResult, TaskStatus};
pub use task::{Domain, Plan, Task, TaskId};

pub(crate) use payload::clean_text;
