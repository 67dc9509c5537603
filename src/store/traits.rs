//! `Database` trait: single async interface for all persistence.
//!
//! Every tenant-scoped read takes the tenant id; a record owned by another
//! tenant is indistinguishable from a missing one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::model::{
    AgentRun, AgentRunStatus, Approval, ApprovalStatus, AuditEvent, Document, DraftKind,
    DraftStatus, Intake, IntakeStatus, Matter, MessageDraft, Task,
};

/// How many reminder drafts of one kind a matter has, and when the last was made.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReminderStats {
    pub count: u32,
    pub last_created_at: Option<DateTime<Utc>>,
}

/// Fields written when an approval is decided.
#[derive(Debug, Clone)]
pub struct Decision {
    pub status: ApprovalStatus,
    pub decided_by: Option<String>,
    pub decided_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// One write in a batch handed to [`Database::commit`] or
/// [`Database::decide_approval`].
///
/// Status and stage updates that match no row are not errors.
#[derive(Debug, Clone, Copy)]
pub enum WriteOp<'a> {
    AgentRun(&'a AgentRun),
    Draft(&'a MessageDraft),
    Approval(&'a Approval),
    Task(&'a Task),
    Event(&'a AuditEvent),
    AgentRunStatus {
        tenant_id: Uuid,
        id: Uuid,
        status: AgentRunStatus,
    },
    DraftStatus {
        tenant_id: Uuid,
        id: Uuid,
        status: DraftStatus,
    },
    IntakeStage {
        tenant_id: Uuid,
        id: Uuid,
        stage: &'a str,
    },
    MatterStage {
        tenant_id: Uuid,
        id: Uuid,
        stage: &'a str,
    },
}

#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Apply every write in one transaction: all of them land or none do.
    async fn commit(&self, ops: &[WriteOp<'_>]) -> Result<(), DatabaseError>;

    // ── Approvals ───────────────────────────────────────────────────

    async fn insert_approval(&self, approval: &Approval) -> Result<(), DatabaseError>;

    async fn get_approval(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Approval>, DatabaseError>;

    /// Newest first, optionally filtered by status.
    async fn list_approvals(
        &self,
        tenant_id: Uuid,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<Approval>, DatabaseError>;

    /// Apply a decision only if the approval is still pending, together
    /// with the follow-up writes in `then`, in one transaction.
    ///
    /// Returns `false` and writes nothing when the approval is not pending.
    async fn decide_approval(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        decision: &Decision,
        then: &[WriteOp<'_>],
    ) -> Result<bool, DatabaseError>;

    // ── Agent runs ──────────────────────────────────────────────────

    async fn insert_agent_run(&self, run: &AgentRun) -> Result<(), DatabaseError>;

    async fn get_agent_run(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<AgentRun>, DatabaseError>;

    // ── Message drafts ──────────────────────────────────────────────

    async fn insert_draft(&self, draft: &MessageDraft) -> Result<(), DatabaseError>;

    async fn get_draft(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<MessageDraft>, DatabaseError>;

    /// Newest first; all matters when `matter_id` is `None`.
    async fn list_drafts(
        &self,
        tenant_id: Uuid,
        matter_id: Option<Uuid>,
    ) -> Result<Vec<MessageDraft>, DatabaseError>;

    /// Count and latest creation time of reminder drafts of `kind` for a matter.
    async fn reminder_stats(
        &self,
        tenant_id: Uuid,
        matter_id: Uuid,
        kind: DraftKind,
    ) -> Result<ReminderStats, DatabaseError>;

    // ── Tasks ───────────────────────────────────────────────────────

    async fn insert_task(&self, task: &Task) -> Result<(), DatabaseError>;

    /// Newest first.
    async fn list_tasks(&self, tenant_id: Uuid) -> Result<Vec<Task>, DatabaseError>;

    /// Whether an SLA nudge task already exists for the approval.
    async fn has_nudge_task(
        &self,
        tenant_id: Uuid,
        approval_id: Uuid,
    ) -> Result<bool, DatabaseError>;

    // ── Intakes ─────────────────────────────────────────────────────

    async fn insert_intake(&self, intake: &Intake) -> Result<(), DatabaseError>;

    async fn get_intake(&self, tenant_id: Uuid, id: Uuid)
    -> Result<Option<Intake>, DatabaseError>;

    /// Oldest first.
    async fn list_intakes(
        &self,
        tenant_id: Uuid,
        statuses: &[IntakeStatus],
    ) -> Result<Vec<Intake>, DatabaseError>;

    // ── Matters ─────────────────────────────────────────────────────

    async fn insert_matter(&self, matter: &Matter) -> Result<(), DatabaseError>;

    async fn get_matter(&self, tenant_id: Uuid, id: Uuid)
    -> Result<Option<Matter>, DatabaseError>;

    /// Most urgent first, then oldest first.
    async fn list_matters(&self, tenant_id: Uuid) -> Result<Vec<Matter>, DatabaseError>;

    /// Matters in `stage` created strictly before `created_before`, oldest first.
    async fn list_matters_in_stage(
        &self,
        tenant_id: Uuid,
        stage: &str,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Matter>, DatabaseError>;

    // ── Documents ───────────────────────────────────────────────────

    async fn insert_document(&self, document: &Document) -> Result<(), DatabaseError>;

    async fn list_documents(
        &self,
        tenant_id: Uuid,
        matter_id: Uuid,
    ) -> Result<Vec<Document>, DatabaseError>;

    // ── Events ──────────────────────────────────────────────────────

    async fn insert_event(&self, event: &AuditEvent) -> Result<(), DatabaseError>;

    /// Oldest first, optionally filtered by name.
    async fn list_events(
        &self,
        tenant_id: Uuid,
        name: Option<&str>,
    ) -> Result<Vec<AuditEvent>, DatabaseError>;
}
