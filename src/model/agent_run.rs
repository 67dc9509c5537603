//! Agent runs: one execution of an agent definition against a matter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::text_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRunStatus {
    Pending,
    Running,
    Completed,
    NeedsApproval,
    Blocked,
    Failed,
}

text_enum!(AgentRunStatus, "agent run status", {
    Pending => "pending",
    Running => "running",
    Completed => "completed",
    NeedsApproval => "needs_approval",
    Blocked => "blocked",
    Failed => "failed",
});

/// A persisted agent run with its opaque input and annotated output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRun {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub matter_id: Uuid,
    pub agent_name: String,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    pub status: AgentRunStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentRun {
    pub fn new(
        tenant_id: Uuid,
        matter_id: Uuid,
        agent_name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            matter_id,
            agent_name: agent_name.into(),
            input,
            output: serde_json::Value::Null,
            status: AgentRunStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: set the output and status together.
    pub fn with_output(mut self, output: serde_json::Value, status: AgentRunStatus) -> Self {
        self.output = output;
        self.status = status;
        self
    }
}
