//! Approval gate: opens approvals, records decisions, cascades them onto
//! the gated object.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::GateError;
use crate::model::event::{APPROVAL_DECIDED, APPROVAL_OPENED};
use crate::model::{
    AgentRunStatus, Approval, ApprovalStatus, AuditEvent, DraftStatus, ObjectType, Verdict,
};
use crate::store::{Database, Decision, WriteOp};

/// What a caller passes to [`ApprovalGate::open`] or [`ApprovalGate::prepare`].
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub tenant_id: Uuid,
    pub matter_id: Option<Uuid>,
    pub object_type: ObjectType,
    pub object_id: Uuid,
    pub requested_by: Option<String>,
}

/// A pending approval and its `approval_opened` event, not written yet.
///
/// Callers commit [`PendingApproval::writes`] in the same batch as the
/// object it gates.
#[derive(Debug, Clone)]
pub struct PendingApproval {
    pub approval: Approval,
    pub event: AuditEvent,
}

impl PendingApproval {
    pub fn writes(&self) -> [WriteOp<'_>; 2] {
        [WriteOp::Approval(&self.approval), WriteOp::Event(&self.event)]
    }

    /// Call once the writes are committed.
    pub fn into_opened(self) -> Approval {
        info!(
            approval_id = %self.approval.id,
            object_type = %self.approval.object_type,
            object_id = %self.approval.object_id,
            "Approval opened"
        );
        self.approval
    }
}

pub struct ApprovalGate {
    db: Arc<dyn Database>,
}

impl ApprovalGate {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Build a pending approval for `request` without writing anything.
    pub fn prepare(&self, request: ApprovalRequest) -> PendingApproval {
        let actor = request.requested_by.clone();
        let approval = Approval::new(request.tenant_id, request.object_type, request.object_id)
            .with_matter(request.matter_id)
            .with_requester(request.requested_by);
        let event = AuditEvent::new(
            approval.tenant_id,
            APPROVAL_OPENED,
            json!({
                "approval_id": approval.id,
                "object_type": approval.object_type.as_str(),
                "object_id": approval.object_id,
                "matter_id": approval.matter_id,
            }),
        )
        .by(actor.as_deref());
        PendingApproval { approval, event }
    }

    /// Create a pending approval for an object that is already stored.
    /// Several approvals may gate the same object.
    pub async fn open(&self, request: ApprovalRequest) -> Result<Approval, GateError> {
        let pending = self.prepare(request);
        self.db.commit(&pending.writes()).await?;
        Ok(pending.into_opened())
    }

    /// Record a verdict on a pending approval and cascade it.
    ///
    /// The approval must exist for the tenant and still be pending. The
    /// decision, the cascade and the `approval_decided` event are written in
    /// one transaction. A gated object that has gone missing is logged and
    /// otherwise ignored.
    pub async fn decide(
        &self,
        tenant_id: Uuid,
        approval_id: Uuid,
        verdict: Verdict,
        decided_by: Option<&str>,
        notes: Option<String>,
    ) -> Result<Approval, GateError> {
        let approval = self.get(tenant_id, approval_id).await?;
        let action = match verdict {
            Verdict::Approve => "approve",
            Verdict::Reject => "reject",
        };
        if !approval.is_pending() {
            warn!(approval_id = %approval_id, status = %approval.status, "Cannot decide non-pending approval");
            return Err(GateError::invalid_state(
                "Approval",
                approval_id,
                approval.status,
                action,
            ));
        }

        let decision = Decision {
            status: verdict.status(),
            decided_by: decided_by.map(str::to_string),
            decided_at: Utc::now(),
            notes,
        };
        let event = AuditEvent::new(
            tenant_id,
            APPROVAL_DECIDED,
            json!({
                "approval_id": approval_id,
                "decision": decision.status.as_str(),
                "object_type": approval.object_type.as_str(),
                "object_id": approval.object_id,
            }),
        )
        .by(decided_by);

        let mut then = Vec::with_capacity(2);
        if let Some(cascade) = self.cascade(&approval, verdict).await? {
            then.push(cascade);
        }
        then.push(WriteOp::Event(&event));

        if !self
            .db
            .decide_approval(tenant_id, approval_id, &decision, &then)
            .await?
        {
            // Someone else decided between our read and write.
            let current = self.get(tenant_id, approval_id).await?;
            return Err(GateError::invalid_state(
                "Approval",
                approval_id,
                current.status,
                action,
            ));
        }

        info!(approval_id = %approval_id, decision = %decision.status, "Approval decided");
        self.get(tenant_id, approval_id).await
    }

    /// Newest first, optionally filtered by status.
    pub async fn list(
        &self,
        tenant_id: Uuid,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<Approval>, GateError> {
        Ok(self.db.list_approvals(tenant_id, status).await?)
    }

    pub async fn get(&self, tenant_id: Uuid, approval_id: Uuid) -> Result<Approval, GateError> {
        self.db
            .get_approval(tenant_id, approval_id)
            .await?
            .ok_or_else(|| GateError::not_found("Approval", approval_id))
    }

    /// The status write a verdict implies for the gated object, or `None`
    /// when the object no longer exists.
    async fn cascade(
        &self,
        approval: &Approval,
        verdict: Verdict,
    ) -> Result<Option<WriteOp<'static>>, GateError> {
        let (tenant_id, id) = (approval.tenant_id, approval.object_id);
        let op = match approval.object_type {
            ObjectType::AgentRun => {
                let exists = self.db.get_agent_run(tenant_id, id).await?.is_some();
                exists.then(|| WriteOp::AgentRunStatus {
                    tenant_id,
                    id,
                    status: match verdict {
                        Verdict::Approve => AgentRunStatus::Completed,
                        Verdict::Reject => AgentRunStatus::Blocked,
                    },
                })
            }
            ObjectType::MessageDraft => {
                let exists = self.db.get_draft(tenant_id, id).await?.is_some();
                exists.then(|| WriteOp::DraftStatus {
                    tenant_id,
                    id,
                    status: match verdict {
                        Verdict::Approve => DraftStatus::Approved,
                        Verdict::Reject => DraftStatus::Draft,
                    },
                })
            }
        };
        if op.is_none() {
            warn!(
                approval_id = %approval.id,
                object_type = %approval.object_type,
                object_id = %approval.object_id,
                "Gated object missing, decision kept without cascade"
            );
        }
        Ok(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    use crate::model::{AgentRun, Channel, Matter, MessageDraft};
    use crate::store::LibSqlBackend;

    async fn setup() -> (Arc<dyn Database>, ApprovalGate, Uuid, Matter) {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let tenant = Uuid::new_v4();
        let matter = Matter::new(tenant, "immigration");
        db.insert_matter(&matter).await.unwrap();
        (db.clone(), ApprovalGate::new(db), tenant, matter)
    }

    fn request(tenant: Uuid, matter: Uuid, object_type: ObjectType, id: Uuid) -> ApprovalRequest {
        ApprovalRequest {
            tenant_id: tenant,
            matter_id: Some(matter),
            object_type,
            object_id: id,
            requested_by: Some("paralegal@firm".to_string()),
        }
    }

    async fn seeded_run(db: &Arc<dyn Database>, tenant: Uuid, matter: Uuid) -> AgentRun {
        let run = AgentRun::new(tenant, matter, "intake_specialist", Value::Null)
            .with_output(serde_json::json!({}), AgentRunStatus::NeedsApproval);
        db.insert_agent_run(&run).await.unwrap();
        run
    }

    #[tokio::test]
    async fn open_records_event() {
        let (db, gate, tenant, matter) = setup().await;
        let run = seeded_run(&db, tenant, matter.id).await;

        let approval = gate
            .open(request(tenant, matter.id, ObjectType::AgentRun, run.id))
            .await
            .unwrap();
        assert!(approval.is_pending());
        assert_eq!(approval.requested_by.as_deref(), Some("paralegal@firm"));

        let events = db.list_events(tenant, Some(APPROVAL_OPENED)).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor, "paralegal@firm");
    }

    #[tokio::test]
    async fn approve_completes_agent_run() {
        let (db, gate, tenant, matter) = setup().await;
        let run = seeded_run(&db, tenant, matter.id).await;
        let approval = gate
            .open(request(tenant, matter.id, ObjectType::AgentRun, run.id))
            .await
            .unwrap();

        let decided = gate
            .decide(tenant, approval.id, Verdict::Approve, Some("attorney"), Some("ok".into()))
            .await
            .unwrap();
        assert_eq!(decided.status, ApprovalStatus::Approved);
        assert_eq!(decided.decided_by.as_deref(), Some("attorney"));
        assert!(decided.decided_at.is_some());
        assert_eq!(decided.notes.as_deref(), Some("ok"));

        let run = db.get_agent_run(tenant, run.id).await.unwrap().unwrap();
        assert_eq!(run.status, AgentRunStatus::Completed);
        assert_eq!(db.list_events(tenant, Some(APPROVAL_DECIDED)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cascade_matrix() {
        let (db, gate, tenant, matter) = setup().await;

        let run = seeded_run(&db, tenant, matter.id).await;
        let a = gate
            .open(request(tenant, matter.id, ObjectType::AgentRun, run.id))
            .await
            .unwrap();
        gate.decide(tenant, a.id, Verdict::Reject, None, None).await.unwrap();
        let run = db.get_agent_run(tenant, run.id).await.unwrap().unwrap();
        assert_eq!(run.status, AgentRunStatus::Blocked);

        for (verdict, expected) in [
            (Verdict::Approve, DraftStatus::Approved),
            (Verdict::Reject, DraftStatus::Draft),
        ] {
            let draft = MessageDraft::new(tenant, matter.id, Channel::Email, "Hola");
            db.insert_draft(&draft).await.unwrap();
            let a = gate
                .open(request(tenant, matter.id, ObjectType::MessageDraft, draft.id))
                .await
                .unwrap();
            gate.decide(tenant, a.id, verdict, None, None).await.unwrap();
            let draft = db.get_draft(tenant, draft.id).await.unwrap().unwrap();
            assert_eq!(draft.status, expected);
        }
    }

    #[tokio::test]
    async fn second_decision_is_invalid_state_and_changes_nothing() {
        let (db, gate, tenant, matter) = setup().await;
        let run = seeded_run(&db, tenant, matter.id).await;
        let approval = gate
            .open(request(tenant, matter.id, ObjectType::AgentRun, run.id))
            .await
            .unwrap();
        let first = gate
            .decide(tenant, approval.id, Verdict::Approve, Some("a"), None)
            .await
            .unwrap();

        let err = gate
            .decide(tenant, approval.id, Verdict::Reject, Some("b"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidState { .. }));

        let after = gate.get(tenant, approval.id).await.unwrap();
        assert_eq!(after.status, ApprovalStatus::Approved);
        assert_eq!(after.decided_by.as_deref(), Some("a"));
        assert_eq!(after.decided_at, first.decided_at);
        let run = db.get_agent_run(tenant, run.id).await.unwrap().unwrap();
        assert_eq!(run.status, AgentRunStatus::Completed);
    }

    #[tokio::test]
    async fn foreign_tenant_sees_not_found() {
        let (db, gate, tenant, matter) = setup().await;
        let run = seeded_run(&db, tenant, matter.id).await;
        let approval = gate
            .open(request(tenant, matter.id, ObjectType::AgentRun, run.id))
            .await
            .unwrap();

        let err = gate
            .decide(Uuid::new_v4(), approval.id, Verdict::Approve, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::NotFound { .. }));
        assert!(gate.get(tenant, approval.id).await.unwrap().is_pending());
    }

    #[tokio::test]
    async fn missing_object_still_records_decision() {
        let (_db, gate, tenant, matter) = setup().await;
        let approval = gate
            .open(request(tenant, matter.id, ObjectType::MessageDraft, Uuid::new_v4()))
            .await
            .unwrap();
        let decided = gate
            .decide(tenant, approval.id, Verdict::Approve, None, None)
            .await
            .unwrap();
        assert_eq!(decided.status, ApprovalStatus::Approved);
    }

    #[tokio::test]
    async fn failed_decision_write_changes_nothing() {
        let backend = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let db: Arc<dyn Database> = backend.clone();
        let gate = ApprovalGate::new(db.clone());
        let tenant = Uuid::new_v4();
        let matter = Uuid::new_v4();
        let run = seeded_run(&db, tenant, matter).await;
        let approval = gate
            .open(request(tenant, matter, ObjectType::AgentRun, run.id))
            .await
            .unwrap();

        backend.fail_inserts_into("events").await;
        let err = gate
            .decide(tenant, approval.id, Verdict::Approve, Some("attorney"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Database(_)));

        let after = gate.get(tenant, approval.id).await.unwrap();
        assert!(after.is_pending());
        assert!(after.decided_by.is_none());
        let run = db.get_agent_run(tenant, run.id).await.unwrap().unwrap();
        assert_eq!(run.status, AgentRunStatus::NeedsApproval);
    }

    #[tokio::test]
    async fn prepared_approval_is_not_written_until_committed() {
        let (db, gate, tenant, matter) = setup().await;
        let pending = gate.prepare(request(tenant, matter.id, ObjectType::AgentRun, Uuid::new_v4()));
        assert!(db.list_approvals(tenant, None).await.unwrap().is_empty());
        assert_eq!(pending.event.name, APPROVAL_OPENED);
        assert_eq!(pending.event.properties["approval_id"], pending.approval.id.to_string());

        db.commit(&pending.writes()).await.unwrap();
        let approval = pending.into_opened();
        assert!(gate.get(tenant, approval.id).await.unwrap().is_pending());
        assert_eq!(db.list_events(tenant, Some(APPROVAL_OPENED)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let (db, gate, tenant, matter) = setup().await;
        let run = seeded_run(&db, tenant, matter.id).await;
        let first = gate
            .open(request(tenant, matter.id, ObjectType::AgentRun, run.id))
            .await
            .unwrap();
        gate.open(request(tenant, matter.id, ObjectType::AgentRun, run.id))
            .await
            .unwrap();
        gate.decide(tenant, first.id, Verdict::Reject, None, None)
            .await
            .unwrap();

        assert_eq!(gate.list(tenant, None).await.unwrap().len(), 2);
        let pending = gate.list(tenant, Some(ApprovalStatus::Pending)).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_ne!(pending[0].id, first.id);
        assert!(gate.list(Uuid::new_v4(), None).await.unwrap().is_empty());
    }
}
