//! Flow orchestration

pub mod flow;
pub mod summary;
pub mod tasks;

pub use flow::{FlowContext, MigrationFlow};
pub use summary::FlowSummary;
