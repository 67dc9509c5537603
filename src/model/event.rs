//! Audit events: a name plus a property bag, appended by workflow operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const APPROVAL_OPENED: &str = "approval_opened";
pub const APPROVAL_DECIDED: &str = "approval_decided";
pub const AGENT_RUN_CREATED: &str = "agent_run_created";
pub const PIPELINE_STAGE_CHANGED: &str = "pipeline_stage_changed";
pub const APPROVAL_SLA_BREACHED: &str = "approval_sla_breached";
pub const APPROVAL_NUDGED: &str = "approval_nudged";
pub const DOC_REMINDER_DRAFT_CREATED: &str = "doc_reminder_draft_created";
pub const WHATSAPP_REMINDER_DRAFT_CREATED: &str = "whatsapp_reminder_draft_created";
pub const MESSAGE_SENT: &str = "message_sent";
pub const LEAD_ROUTED: &str = "lead_routed";

/// Actor recorded for events emitted by the cadence checks.
pub const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub actor: String,
    pub name: String,
    pub properties: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(tenant_id: Uuid, name: &str, properties: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            actor: SYSTEM_ACTOR.to_string(),
            name: name.to_string(),
            properties,
            created_at: Utc::now(),
        }
    }

    /// Builder: who caused the event. Empty or missing keeps `system`.
    pub fn by(mut self, actor: Option<&str>) -> Self {
        if let Some(actor) = actor.filter(|a| !a.is_empty()) {
            self.actor = actor.to_string();
        }
        self
    }
}
