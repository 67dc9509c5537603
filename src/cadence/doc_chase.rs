//! Email reminders for matters stuck waiting on documents.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use super::{CHASED_STAGE, cutoff, hours, in_cooldown, matter_intake, missing_documents};
use crate::approvals::{ApprovalGate, ApprovalRequest};
use crate::config::CadenceConfig;
use crate::error::GateError;
use crate::model::event::DOC_REMINDER_DRAFT_CREATED;
use crate::model::{AuditEvent, Channel, DraftKind, MessageDraft, ObjectType};
use crate::store::{Database, WriteOp};
use crate::templates::{TemplateDoc, TemplateRegistry};

/// A reminder draft created by this call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocReminder {
    pub matter_id: Uuid,
    /// Keys of the missing required documents.
    pub missing_docs: Vec<String>,
    pub draft_id: Uuid,
    pub approval_id: Uuid,
}

pub struct DocChaser {
    db: Arc<dyn Database>,
    templates: Arc<TemplateRegistry>,
    gate: Arc<ApprovalGate>,
    config: CadenceConfig,
}

fn reminder_content(client_name: &str, missing: &[TemplateDoc]) -> String {
    let list: Vec<String> = missing.iter().map(|d| format!("  - {}", d.label)).collect();
    format!(
        "[DOC REMINDER] Dear {client_name},\n\n\
         We are still missing the following documents for your case:\n\
         {}\n\n\
         Please upload these at your earliest convenience to avoid delays.\n\n\
         Thank you.",
        list.join("\n")
    )
}

impl DocChaser {
    pub fn new(
        db: Arc<dyn Database>,
        templates: Arc<TemplateRegistry>,
        gate: Arc<ApprovalGate>,
        config: CadenceConfig,
    ) -> Self {
        Self {
            db,
            templates,
            gate,
            config,
        }
    }

    pub async fn check(&self, tenant_id: Uuid) -> Result<Vec<DocReminder>, GateError> {
        self.check_at(tenant_id, Utc::now()).await
    }

    /// Draft a reminder for each matter past the threshold that still lacks
    /// required documents and was not reminded within the cooldown.
    ///
    /// Each reminder draft is stored together with its approval.
    pub async fn check_at(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<DocReminder>, GateError> {
        let threshold = hours(self.config.doc_reminder_hours)?;
        let cooldown = hours(self.config.doc_reminder_cooldown_hours)?;
        let matters = self
            .db
            .list_matters_in_stage(tenant_id, CHASED_STAGE.as_str(), cutoff(now, threshold)?)
            .await?;

        let mut created = Vec::new();
        for matter in matters {
            let missing = missing_documents(self.db.as_ref(), &self.templates, &matter).await?;
            if missing.is_empty() {
                continue;
            }
            let stats = self
                .db
                .reminder_stats(tenant_id, matter.id, DraftKind::DocReminder)
                .await?;
            if in_cooldown(stats.last_created_at, now, cooldown) {
                debug!(matter_id = %matter.id, "Doc reminder in cooldown");
                continue;
            }

            let intake = matter_intake(self.db.as_ref(), &matter).await?;
            let client_name = intake
                .as_ref()
                .and_then(|i| i.client_name())
                .unwrap_or("Client");

            let draft = MessageDraft::new(
                tenant_id,
                matter.id,
                Channel::Email,
                reminder_content(client_name, &missing),
            )
            .as_reminder(DraftKind::DocReminder, stats.count + 1);
            let pending = self.gate.prepare(ApprovalRequest {
                tenant_id,
                matter_id: Some(matter.id),
                object_type: ObjectType::MessageDraft,
                object_id: draft.id,
                requested_by: None,
            });
            let created_event = AuditEvent::new(
                tenant_id,
                DOC_REMINDER_DRAFT_CREATED,
                json!({
                    "matter_id": matter.id,
                    "draft_id": draft.id,
                    "missing_docs": missing.len(),
                }),
            );
            let [approval_write, opened_event] = pending.writes();
            self.db
                .commit(&[
                    WriteOp::Draft(&draft),
                    approval_write,
                    opened_event,
                    WriteOp::Event(&created_event),
                ])
                .await?;
            let approval = pending.into_opened();

            info!(matter_id = %matter.id, missing = missing.len(), "Doc reminder drafted");
            created.push(DocReminder {
                matter_id: matter.id,
                missing_docs: missing.into_iter().map(|d| d.key).collect(),
                draft_id: draft.id,
                approval_id: approval.id,
            });
        }
        Ok(created)
    }
}
