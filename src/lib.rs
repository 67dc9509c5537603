//! Legal-ops workflow engine: intakes, matters, agent drafts and the
//! approval gate every client-facing output passes through.

pub mod agents;
pub mod api;
pub mod approvals;
pub mod cadence;
pub mod config;
pub mod error;
pub mod llm;
pub mod messages;
pub mod model;
pub mod pipeline;
pub mod policy;
pub mod prepkit;
pub mod routing;
pub mod store;
pub mod templates;
