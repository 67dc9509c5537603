//! Human approval gate for every client-facing output.

mod gate;

pub use gate::{ApprovalGate, ApprovalRequest, PendingApproval};
