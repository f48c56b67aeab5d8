//! Check execution orchestration.

pub mod isolation;
pub mod scheduler;

pub use isolation::{Executor, IsolationMode, RunOutcome};
pub use scheduler::{DependencyRunner, RunProgress, RunReport};
