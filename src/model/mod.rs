//! Data model: approvals, agent runs, drafts, intakes, matters, tasks, events.
//!
//! Every record carries its `tenant_id`; the store scopes all reads and
//! writes by it.

pub mod agent_run;
pub mod approval;
pub mod event;
pub mod matter;
pub mod message;
pub mod task;

pub use agent_run::{AgentRun, AgentRunStatus};
pub use approval::{Approval, ApprovalStatus, ObjectType, Verdict};
pub use event::AuditEvent;
pub use matter::{Document, DocumentStatus, Intake, IntakeStatus, Matter, MatterStatus};
pub use message::{Channel, DraftKind, DraftStatus, MessageDraft};
pub use task::{Task, TaskKind, TaskStatus};

/// Implements `as_str`, `Display` and `FromStr` for a snake_case enum that
/// is persisted as text.
macro_rules! text_enum {
    ($ty:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!("Unknown {}: {}", $label, s)),
                }
            }
        }
    };
}

pub(crate) use text_enum;
