mod retry;
mod scheduler;

pub use retry::retry_with_backoff;
pub use scheduler::Scheduler;
