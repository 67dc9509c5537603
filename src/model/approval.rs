//! Approval records: the human sign-off every client-facing output needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::text_enum;

/// Lifecycle of an approval. Only `Pending` can change; the other two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

text_enum!(ApprovalStatus, "approval status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

/// Kind of record an approval gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    AgentRun,
    MessageDraft,
}

text_enum!(ObjectType, "object type", {
    AgentRun => "agent_run",
    MessageDraft => "message_draft",
});

/// A reviewer's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approve,
    Reject,
}

impl Verdict {
    /// Terminal approval status this verdict produces.
    pub fn status(self) -> ApprovalStatus {
        match self {
            Self::Approve => ApprovalStatus::Approved,
            Self::Reject => ApprovalStatus::Rejected,
        }
    }
}

/// A pending or decided approval for one gated object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matter_id: Option<Uuid>,
    pub object_type: ObjectType,
    pub object_id: Uuid,
    pub status: ApprovalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Approval {
    /// Create a new pending approval.
    pub fn new(tenant_id: Uuid, object_type: ObjectType, object_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            matter_id: None,
            object_type,
            object_id,
            status: ApprovalStatus::Pending,
            requested_by: None,
            decided_by: None,
            decided_at: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    /// Builder: attach the matter.
    pub fn with_matter(mut self, matter_id: Option<Uuid>) -> Self {
        self.matter_id = matter_id;
        self
    }

    /// Builder: record who asked for the approval.
    pub fn with_requester(mut self, requested_by: Option<String>) -> Self {
        self.requested_by = requested_by;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    /// Hours this approval has been open as of `now`.
    pub fn hours_pending(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_milliseconds() as f64 / 3_600_000.0
    }

    /// First eight characters of the id, used in task titles.
    pub fn short_id(&self) -> String {
        self.id.to_string().chars().take(8).collect()
    }
}
