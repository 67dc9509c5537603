//! Agents: declarative definitions, output building, and gated runs.

pub mod builder;
pub mod definition;
pub mod runner;
pub mod urgency;

pub use builder::AgentOutputBuilder;
pub use definition::{AgentDefinition, AgentRegistry, AgentSummary, WorkflowStep};
pub use runner::{AgentRunner, RunOutcome};
pub use urgency::{KeywordUrgencyClassifier, UrgencyClassifier};
