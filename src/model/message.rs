//! Outbound message drafts.
//!
//! A draft reaches a client only after its approval is granted; `Sent` is
//! reachable from `Approved` alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::text_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
    Whatsapp,
    CallScript,
}

text_enum!(Channel, "channel", {
    Email => "email",
    Sms => "sms",
    Whatsapp => "whatsapp",
    CallScript => "call_script",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Draft,
    NeedsApproval,
    Approved,
    Sent,
}

text_enum!(DraftStatus, "draft status", {
    Draft => "draft",
    NeedsApproval => "needs_approval",
    Approved => "approved",
    Sent => "sent",
});

/// Who produced the draft. Reminder kinds drive cadence idempotence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftKind {
    #[default]
    Manual,
    DocReminder,
    WhatsappReminder,
}

text_enum!(DraftKind, "draft kind", {
    Manual => "manual",
    DocReminder => "doc_reminder",
    WhatsappReminder => "whatsapp_reminder",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDraft {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub matter_id: Uuid,
    pub channel: Channel,
    pub content: String,
    pub status: DraftStatus,
    pub kind: DraftKind,
    /// 1-based position within a reminder series.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_sequence: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessageDraft {
    /// New manual draft awaiting approval.
    pub fn new(tenant_id: Uuid, matter_id: Uuid, channel: Channel, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            matter_id,
            channel,
            content: content.into(),
            status: DraftStatus::NeedsApproval,
            kind: DraftKind::Manual,
            reminder_sequence: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: mark as the `sequence`-th reminder of `kind`.
    pub fn as_reminder(mut self, kind: DraftKind, sequence: u32) -> Self {
        self.kind = kind;
        self.reminder_sequence = Some(sequence);
        self
    }
}
