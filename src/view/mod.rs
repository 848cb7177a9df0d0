//! Role-specific views over a finished orchestration map.
//!
//! What each role sees is decided by the rows of [`POLICY`], never by
//! matching on the role elsewhere. Projection reads the map and builds a
//! fresh [`View`]; the map itself is never touched.

mod policy;
mod projector;

pub use policy::{policy_for, PolicyRow, Redaction, Section, ViewerRole, POLICY};
pub use projector::{project, View};
