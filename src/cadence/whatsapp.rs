//! Two-step WhatsApp reminder cadence for missing documents.
//!
//! Reminder #1 once a matter is past the first threshold, reminder #2 once
//! it is past the second, never more than the configured maximum.

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
use crate::model::event::WHATSAPP_REMINDER_DRAFT_CREATED;
use crate::model::{AuditEvent, Channel, DraftKind, MessageDraft, ObjectType};
use crate::store::{Database, WriteOp};
use crate::templates::{TemplateDoc, TemplateRegistry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsappReminder {
    pub matter_id: Uuid,
    pub reminder_number: u32,
    pub missing_docs: Vec<String>,
    pub client_phone: Option<String>,
    pub draft_id: Uuid,
    pub approval_id: Uuid,
}

pub struct WhatsappReminders {
    db: Arc<dyn Database>,
    templates: Arc<TemplateRegistry>,
    gate: Arc<ApprovalGate>,
    config: CadenceConfig,
}

fn reminder_content(number: u32, client_name: &str, missing: &[TemplateDoc]) -> String {
    let list: Vec<String> = missing.iter().map(|d| format!("  - {}", d.label)).collect();
    format!(
        "[RECORDATORIO #{number}] Hola {client_name},\n\n\
         Le recordamos que aún necesitamos los siguientes documentos para avanzar con su caso:\n\
         {}\n\n\
         Por favor envíelos por este medio o súbalos a la plataforma.\n\n\
         Gracias por su confianza.",
        list.join("\n")
    )
}

impl WhatsappReminders {
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

    pub async fn check(&self, tenant_id: Uuid) -> Result<Vec<WhatsappReminder>, GateError> {
        self.check_at(tenant_id, Utc::now()).await
    }

    pub async fn check_at(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<WhatsappReminder>, GateError> {
        let first = hours(self.config.whatsapp_first_hours)?;
        let second = hours(self.config.whatsapp_second_hours)?;
        let cooldown = hours(self.config.whatsapp_cooldown_hours)?;
        let matters = self
            .db
            .list_matters_in_stage(tenant_id, CHASED_STAGE.as_str(), cutoff(now, first)?)
            .await?;

        let mut created = Vec::new();
        for matter in matters {
            let stats = self
                .db
                .reminder_stats(tenant_id, matter.id, DraftKind::WhatsappReminder)
                .await?;
            if stats.count >= self.config.whatsapp_max_reminders {
                continue;
            }
            let threshold = if stats.count == 0 { first } else { second };
            if now - matter.created_at < threshold {
                continue;
            }
            if in_cooldown(stats.last_created_at, now, cooldown) {
                debug!(matter_id = %matter.id, "WhatsApp reminder in cooldown");
                continue;
            }

            let missing = missing_documents(self.db.as_ref(), &self.templates, &matter).await?;
            if missing.is_empty() {
                continue;
            }

            let intake = matter_intake(self.db.as_ref(), &matter).await?;
            let client_name = intake
                .as_ref()
                .and_then(|i| i.client_name())
                .unwrap_or("Cliente");
            let client_phone = intake
                .as_ref()
                .and_then(|i| i.field("phone"))
                .map(str::to_string);

            let number = stats.count + 1;
            let draft = MessageDraft::new(
                tenant_id,
                matter.id,
                Channel::Whatsapp,
                reminder_content(number, client_name, &missing),
            )
            .as_reminder(DraftKind::WhatsappReminder, number);
            let pending = self.gate.prepare(ApprovalRequest {
                tenant_id,
                matter_id: Some(matter.id),
                object_type: ObjectType::MessageDraft,
                object_id: draft.id,
                requested_by: None,
            });
            let created_event = AuditEvent::new(
                tenant_id,
                WHATSAPP_REMINDER_DRAFT_CREATED,
                json!({
                    "matter_id": matter.id,
                    "draft_id": draft.id,
                    "reminder_number": number,
                    "missing_docs": missing.len(),
                    "channel": Channel::Whatsapp.as_str(),
                    "client_phone": client_phone,
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

            info!(matter_id = %matter.id, reminder = number, "WhatsApp reminder drafted");
            created.push(WhatsappReminder {
                matter_id: matter.id,
                reminder_number: number,
                missing_docs: missing.into_iter().map(|d| d.key).collect(),
                client_phone,
                draft_id: draft.id,
                approval_id: approval.id,
            });
        }
        Ok(created)
    }
}
