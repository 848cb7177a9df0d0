//! Plan Builder: turns a message into a validated task DAG.
//!
//! The provider proposes a candidate task list. The candidate is parsed,
//! checked for structural problems (duplicates, self/forward/dangling
//! references, cycles) and then repaired: unknown domains are dropped along
//! with their dependents, ids are remapped onto a per-build sequence and
//! missing purposes are filled in. A structurally broken candidate gets one
//! corrective retry.

mod builder;
mod candidate;
mod validate;

pub use builder::{PlanBuilder, TaskIdSequence, MAX_PLAN_ATTEMPTS};
