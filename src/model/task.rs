//! Work items for staff, including SLA nudges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::text_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    #[default]
    General,
    /// Reminder that an approval is past its SLA. At most one per approval.
    SlaNudge,
}

text_enum!(TaskKind, "task kind", {
    General => "general",
    SlaNudge => "sla_nudge",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Open,
    Done,
}

text_enum!(TaskStatus, "task status", {
    Open => "open",
    Done => "done",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matter_id: Option<Uuid>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub kind: TaskKind,
    /// Set on nudge tasks; the de-duplication key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<Uuid>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(tenant_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            matter_id: None,
            title: title.into(),
            description: None,
            kind: TaskKind::General,
            approval_id: None,
            status: TaskStatus::Open,
            created_at: Utc::now(),
        }
    }

    /// Builder: set description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_matter(mut self, matter_id: Option<Uuid>) -> Self {
        self.matter_id = matter_id;
        self
    }

    /// Builder: turn this into the nudge task for `approval_id`.
    pub fn nudging(mut self, approval_id: Uuid) -> Self {
        self.kind = TaskKind::SlaNudge;
        self.approval_id = Some(approval_id);
        self
    }
}
