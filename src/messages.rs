//! Outbound message drafts. Nothing is sent without an approved draft.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::approvals::{ApprovalGate, ApprovalRequest};
use crate::error::GateError;
use crate::model::event::MESSAGE_SENT;
use crate::model::{Approval, AuditEvent, Channel, DraftStatus, MessageDraft, ObjectType};
use crate::store::{Database, WriteOp};

#[derive(Debug, Clone, Serialize)]
pub struct DraftOutcome {
    pub draft: MessageDraft,
    pub approval: Approval,
}

pub struct MessageService {
    db: Arc<dyn Database>,
    gate: Arc<ApprovalGate>,
}

impl MessageService {
    pub fn new(db: Arc<dyn Database>, gate: Arc<ApprovalGate>) -> Self {
        Self { db, gate }
    }

    /// Store a manual draft awaiting approval and open its approval.
    pub async fn create_draft(
        &self,
        tenant_id: Uuid,
        matter_id: Uuid,
        channel: Channel,
        content: &str,
        requested_by: Option<&str>,
    ) -> Result<DraftOutcome, GateError> {
        if content.trim().is_empty() {
            return Err(GateError::InvalidArgument("Draft content is empty".to_string()));
        }
        self.db
            .get_matter(tenant_id, matter_id)
            .await?
            .ok_or_else(|| GateError::not_found("Matter", matter_id))?;

        let draft = MessageDraft::new(tenant_id, matter_id, channel, content);
        let pending = self.gate.prepare(ApprovalRequest {
            tenant_id,
            matter_id: Some(matter_id),
            object_type: ObjectType::MessageDraft,
            object_id: draft.id,
            requested_by: requested_by.map(str::to_string),
        });
        let [approval_write, opened_event] = pending.writes();
        self.db
            .commit(&[WriteOp::Draft(&draft), approval_write, opened_event])
            .await?;
        let approval = pending.into_opened();

        info!(draft_id = %draft.id, channel = %channel, "Message draft created");
        Ok(DraftOutcome { draft, approval })
    }

    /// Newest first; every matter when `matter_id` is `None`.
    pub async fn list_drafts(
        &self,
        tenant_id: Uuid,
        matter_id: Option<Uuid>,
    ) -> Result<Vec<MessageDraft>, GateError> {
        Ok(self.db.list_drafts(tenant_id, matter_id).await?)
    }

    /// Mark an approved draft as sent. Delivery itself is simulated.
    pub async fn send_draft(
        &self,
        tenant_id: Uuid,
        draft_id: Uuid,
        actor: Option<&str>,
    ) -> Result<MessageDraft, GateError> {
        let mut draft = self
            .db
            .get_draft(tenant_id, draft_id)
            .await?
            .ok_or_else(|| GateError::not_found("MessageDraft", draft_id))?;
        if draft.status != DraftStatus::Approved {
            return Err(GateError::invalid_state(
                "MessageDraft",
                draft_id,
                draft.status,
                "send",
            ));
        }

        let sent = AuditEvent::new(
            tenant_id,
            MESSAGE_SENT,
            json!({
                "draft_id": draft_id,
                "matter_id": draft.matter_id,
                "channel": draft.channel.as_str(),
            }),
        )
        .by(actor);
        self.db
            .commit(&[
                WriteOp::DraftStatus {
                    tenant_id,
                    id: draft_id,
                    status: DraftStatus::Sent,
                },
                WriteOp::Event(&sent),
            ])
            .await?;
        draft.status = DraftStatus::Sent;

        info!(draft_id = %draft_id, channel = %draft.channel, "Message sent");
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::{Matter, Verdict};
    use crate::store::LibSqlBackend;

    async fn setup() -> (Arc<dyn Database>, Arc<ApprovalGate>, MessageService, Uuid, Matter) {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let gate = Arc::new(ApprovalGate::new(db.clone()));
        let tenant = Uuid::new_v4();
        let matter = Matter::new(tenant, "mx_labor");
        db.insert_matter(&matter).await.unwrap();
        let service = MessageService::new(db.clone(), gate.clone());
        (db, gate, service, tenant, matter)
    }

    #[tokio::test]
    async fn draft_goes_through_approval_before_send() {
        let (db, gate, service, tenant, matter) = setup().await;
        let outcome = service
            .create_draft(tenant, matter.id, Channel::Sms, "Su cita es el lunes", Some("ops"))
            .await
            .unwrap();
        assert_eq!(outcome.draft.status, DraftStatus::NeedsApproval);
        assert!(outcome.approval.is_pending());

        let err = service
            .send_draft(tenant, outcome.draft.id, Some("ops"))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidState { .. }));

        gate.decide(tenant, outcome.approval.id, Verdict::Approve, Some("attorney"), None)
            .await
            .unwrap();
        let sent = service
            .send_draft(tenant, outcome.draft.id, Some("ops"))
            .await
            .unwrap();
        assert_eq!(sent.status, DraftStatus::Sent);

        let stored = db.get_draft(tenant, sent.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DraftStatus::Sent);
        assert_eq!(db.list_events(tenant, Some(MESSAGE_SENT)).await.unwrap().len(), 1);

        // Sent is terminal for sending.
        let err = service.send_draft(tenant, sent.id, None).await.unwrap_err();
        assert!(matches!(err, GateError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn rejected_draft_cannot_be_sent() {
        let (_db, gate, service, tenant, matter) = setup().await;
        let outcome = service
            .create_draft(tenant, matter.id, Channel::Email, "Hello", None)
            .await
            .unwrap();
        gate.decide(tenant, outcome.approval.id, Verdict::Reject, None, None)
            .await
            .unwrap();
        let err = service
            .send_draft(tenant, outcome.draft.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn tenant_scoping() {
        let (_db, _gate, service, tenant, matter) = setup().await;
        let err = service
            .create_draft(Uuid::new_v4(), matter.id, Channel::Email, "Hi", None)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::NotFound { .. }));

        let outcome = service
            .create_draft(tenant, matter.id, Channel::Whatsapp, "Hola", None)
            .await
            .unwrap();
        let err = service
            .send_draft(Uuid::new_v4(), outcome.draft.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::NotFound { .. }));
        assert_eq!(service.list_drafts(tenant, Some(matter.id)).await.unwrap().len(), 1);
        assert!(service.list_drafts(Uuid::new_v4(), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn draft_is_dropped_when_its_approval_cannot_be_stored() {
        let backend = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let db: Arc<dyn Database> = backend.clone();
        let tenant = Uuid::new_v4();
        let matter = Matter::new(tenant, "mx_labor");
        db.insert_matter(&matter).await.unwrap();
        let service = MessageService::new(db.clone(), Arc::new(ApprovalGate::new(db.clone())));

        backend.fail_inserts_into("approvals").await;
        let err = service
            .create_draft(tenant, matter.id, Channel::Email, "Hello", None)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Database(_)));
        assert!(service.list_drafts(tenant, None).await.unwrap().is_empty());
        assert!(db.list_events(tenant, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_content_is_invalid() {
        let (_db, _gate, service, tenant, matter) = setup().await;
        let err = service
            .create_draft(tenant, matter.id, Channel::Email, "   ", None)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidArgument(_)));
    }
}
