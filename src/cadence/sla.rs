//! SLA breach nudges for approvals left pending too long.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::hours;
use crate::error::GateError;
use crate::model::event::{APPROVAL_NUDGED, APPROVAL_SLA_BREACHED};
use crate::model::{ApprovalStatus, AuditEvent, ObjectType, Task};
use crate::store::{Database, WriteOp};

/// One approval that was nudged by this call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaBreach {
    pub approval_id: Uuid,
    pub hours_pending: f64,
    pub object_type: ObjectType,
    pub matter_id: Option<Uuid>,
}

pub struct SlaChecker {
    db: Arc<dyn Database>,
    sla_hours: f64,
}

impl SlaChecker {
    pub fn new(db: Arc<dyn Database>, sla_hours: f64) -> Self {
        Self { db, sla_hours }
    }

    pub fn sla_hours(&self) -> f64 {
        self.sla_hours
    }

    pub async fn check(&self, tenant_id: Uuid) -> Result<Vec<SlaBreach>, GateError> {
        self.check_at(tenant_id, Utc::now()).await
    }

    /// Nudge every pending approval older than the SLA that has no nudge yet.
    ///
    /// The nudge task and its two events are written together.
    pub async fn check_at(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<SlaBreach>, GateError> {
        hours(self.sla_hours)?;
        let pending = self
            .db
            .list_approvals(tenant_id, Some(ApprovalStatus::Pending))
            .await?;

        let mut breaches = Vec::new();
        for approval in pending {
            let hours_pending = approval.hours_pending(now);
            if hours_pending <= self.sla_hours {
                continue;
            }
            if self.db.has_nudge_task(tenant_id, approval.id).await? {
                continue;
            }

            let task = Task::new(
                tenant_id,
                format!(
                    "[SLA Nudge] Approval {} pending {:.0}h",
                    approval.short_id(),
                    hours_pending
                ),
            )
            .with_description(format!(
                "Approval for {} has been pending for {:.1} hours (SLA: {}h). \
                 Please review and approve/reject.",
                approval.object_type, hours_pending, self.sla_hours
            ))
            .with_matter(approval.matter_id)
            .nudging(approval.id);

            let rounded = (hours_pending * 10.0).round() / 10.0;
            let breached = AuditEvent::new(
                tenant_id,
                APPROVAL_SLA_BREACHED,
                json!({
                    "approval_id": approval.id,
                    "hours_pending": rounded,
                    "sla_hours": self.sla_hours,
                    "object_type": approval.object_type.as_str(),
                }),
            );
            let nudged = AuditEvent::new(
                tenant_id,
                APPROVAL_NUDGED,
                json!({ "approval_id": approval.id, "task_id": task.id }),
            );
            self.db
                .commit(&[
                    WriteOp::Task(&task),
                    WriteOp::Event(&breached),
                    WriteOp::Event(&nudged),
                ])
                .await?;

            info!(approval_id = %approval.id, hours_pending = rounded, "Approval SLA breached, nudge task created");
            breaches.push(SlaBreach {
                approval_id: approval.id,
                hours_pending: rounded,
                object_type: approval.object_type,
                matter_id: approval.matter_id,
            });
        }
        Ok(breaches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::model::{Approval, TaskKind, Verdict};
    use crate::store::{Decision, LibSqlBackend};

    async fn setup() -> (Arc<dyn Database>, SlaChecker, Uuid) {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        (db.clone(), SlaChecker::new(db, 4.0), Uuid::new_v4())
    }

    #[tokio::test]
    async fn young_approvals_are_left_alone() {
        let (db, checker, tenant) = setup().await;
        let approval = Approval::new(tenant, ObjectType::AgentRun, Uuid::new_v4());
        db.insert_approval(&approval).await.unwrap();

        let breaches = checker
            .check_at(tenant, approval.created_at + Duration::hours(3))
            .await
            .unwrap();
        assert!(breaches.is_empty());
        assert!(db.list_tasks(tenant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn breach_creates_exactly_one_nudge() {
        let (db, checker, tenant) = setup().await;
        let approval = Approval::new(tenant, ObjectType::MessageDraft, Uuid::new_v4());
        db.insert_approval(&approval).await.unwrap();
        let later = approval.created_at + Duration::hours(5);

        let first = checker.check_at(tenant, later).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].approval_id, approval.id);
        assert_eq!(first[0].hours_pending, 5.0);

        let second = checker.check_at(tenant, later).await.unwrap();
        assert!(second.is_empty());

        let tasks = db.list_tasks(tenant).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].kind, TaskKind::SlaNudge);
        assert_eq!(tasks[0].approval_id, Some(approval.id));
        assert_eq!(
            tasks[0].title,
            format!("[SLA Nudge] Approval {} pending 5h", approval.short_id())
        );
        assert!(tasks[0]
            .description
            .as_deref()
            .unwrap()
            .starts_with("Approval for message_draft has been pending for 5.0 hours (SLA: 4h)."));

        assert_eq!(db.list_events(tenant, Some(APPROVAL_SLA_BREACHED)).await.unwrap().len(), 1);
        assert_eq!(db.list_events(tenant, Some(APPROVAL_NUDGED)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn decided_approvals_are_not_nudged() {
        let (db, checker, tenant) = setup().await;
        let approval = Approval::new(tenant, ObjectType::AgentRun, Uuid::new_v4());
        db.insert_approval(&approval).await.unwrap();
        db.decide_approval(
            tenant,
            approval.id,
            &Decision {
                status: Verdict::Approve.status(),
                decided_by: None,
                decided_at: Utc::now(),
                notes: None,
            },
            &[],
        )
        .await
        .unwrap();

        let breaches = checker
            .check_at(tenant, approval.created_at + Duration::hours(10))
            .await
            .unwrap();
        assert!(breaches.is_empty());
    }

    #[tokio::test]
    async fn other_tenants_are_untouched() {
        let (db, checker, tenant) = setup().await;
        let approval = Approval::new(tenant, ObjectType::AgentRun, Uuid::new_v4());
        db.insert_approval(&approval).await.unwrap();

        let breaches = checker
            .check_at(Uuid::new_v4(), approval.created_at + Duration::hours(10))
            .await
            .unwrap();
        assert!(breaches.is_empty());
    }

    #[tokio::test]
    async fn failed_nudge_leaves_no_task_behind() {
        let backend = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let db: Arc<dyn Database> = backend.clone();
        let checker = SlaChecker::new(db.clone(), 4.0);
        let tenant = Uuid::new_v4();
        let approval = Approval::new(tenant, ObjectType::AgentRun, Uuid::new_v4());
        db.insert_approval(&approval).await.unwrap();
        let later = approval.created_at + Duration::hours(6);

        backend.fail_inserts_into("events").await;
        assert!(checker.check_at(tenant, later).await.is_err());
        assert!(db.list_tasks(tenant).await.unwrap().is_empty());
        assert!(!db.has_nudge_task(tenant, approval.id).await.unwrap());
    }

    #[tokio::test]
    async fn unusable_sla_is_rejected() {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let tenant = Uuid::new_v4();
        db.insert_approval(&Approval::new(tenant, ObjectType::AgentRun, Uuid::new_v4()))
            .await
            .unwrap();
        for sla in [f64::NAN, -4.0, 1e13] {
            let err = SlaChecker::new(db.clone(), sla).check(tenant).await.unwrap_err();
            assert!(matches!(err, GateError::InvalidArgument(_)));
        }
        assert!(db.list_tasks(tenant).await.unwrap().is_empty());
    }
}
