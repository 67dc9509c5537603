//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Timestamps are written as
//! fixed-width RFC 3339 (microseconds, `Z`) so text comparison is
//! chronological.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::params::IntoParams;
use libsql::{Connection, Database as LibSqlDatabase, Transaction, params};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::model::{
    AgentRun, AgentRunStatus, Approval, ApprovalStatus, AuditEvent, Document, DocumentStatus,
    DraftKind, DraftStatus, Intake, IntakeStatus, Matter, MatterStatus, MessageDraft, ObjectType,
    Task, TaskKind, TaskStatus,
};
use crate::store::migrations;
use crate::store::traits::{Database, Decision, ReminderStats, WriteOp};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations. Statements
/// and transactions take `lock` in turn, so an open transaction never picks
/// up another caller's statements.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    lock: Mutex<()>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
            lock: Mutex::new(()),
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn execute(
        &self,
        ctx: &str,
        sql: &str,
        params: impl IntoParams,
    ) -> Result<u64, DatabaseError> {
        let _guard = self.lock.lock().await;
        self.conn()
            .execute(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{ctx}: {e}")))
    }

    /// A single write outside any batch.
    async fn write(&self, op: WriteOp<'_>) -> Result<u64, DatabaseError> {
        let _guard = self.lock.lock().await;
        apply(self.conn(), &op).await
    }

    async fn begin(&self) -> Result<Transaction, DatabaseError> {
        self.conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("begin transaction: {e}")))
    }

    async fn query_all<T>(
        &self,
        ctx: &str,
        sql: &str,
        params: impl IntoParams,
        map: fn(&libsql::Row) -> Result<T, DatabaseError>,
    ) -> Result<Vec<T>, DatabaseError> {
        let _guard = self.lock.lock().await;
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{ctx}: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("{ctx} row: {e}")))?
        {
            out.push(map(&row)?);
        }
        Ok(out)
    }

    async fn query_one<T>(
        &self,
        ctx: &str,
        sql: &str,
        params: impl IntoParams,
        map: fn(&libsql::Row) -> Result<T, DatabaseError>,
    ) -> Result<Option<T>, DatabaseError> {
        Ok(self.query_all(ctx, sql, params, map).await?.into_iter().next())
    }
}

#[cfg(test)]
impl LibSqlBackend {
    /// Make every insert into `table` fail from now on.
    pub(crate) async fn fail_inserts_into(&self, table: &str) {
        self.conn()
            .execute_batch(&format!(
                "CREATE TRIGGER fail_{table} BEFORE INSERT ON {table}
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;"
            ))
            .await
            .unwrap();
    }

    pub(crate) async fn count_rows(&self, table: &str) -> i64 {
        self.query_one(
            "count_rows",
            &format!("SELECT COUNT(*) FROM {table}"),
            (),
            |row| Ok(row.get::<i64>(0).unwrap_or(0)),
        )
        .await
        .unwrap()
        .unwrap_or(0)
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn fmt_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn text(row: &libsql::Row, idx: i32, ctx: &str) -> Result<String, DatabaseError> {
    row.get::<String>(idx)
        .map_err(|e| DatabaseError::Query(format!("{ctx}: {e}")))
}

/// Nullable text column; empty strings read as `None`.
fn opt_col(row: &libsql::Row, idx: i32) -> Option<String> {
    row.get::<String>(idx).ok().filter(|s| !s.is_empty())
}

fn uuid_col(row: &libsql::Row, idx: i32, ctx: &str) -> Result<Uuid, DatabaseError> {
    let raw = text(row, idx, ctx)?;
    Uuid::parse_str(&raw).map_err(|e| DatabaseError::Serialization(format!("{ctx} parse: {e}")))
}

fn opt_uuid_col(row: &libsql::Row, idx: i32) -> Option<Uuid> {
    opt_col(row, idx).and_then(|s| Uuid::parse_str(&s).ok())
}

fn ts_col(row: &libsql::Row, idx: i32) -> DateTime<Utc> {
    opt_col(row, idx)
        .map(|s| parse_datetime(&s))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn json_col(row: &libsql::Row, idx: i32) -> serde_json::Value {
    opt_col(row, idx)
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or(serde_json::Value::Null)
}

/// Parse a text enum column, falling back to `default` for unknown values.
fn enum_col<T: std::str::FromStr>(row: &libsql::Row, idx: i32, default: T) -> T {
    opt_col(row, idx)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn opt_uuid(id: Option<Uuid>) -> libsql::Value {
    match id {
        Some(id) => libsql::Value::Text(id.to_string()),
        None => libsql::Value::Null,
    }
}

fn to_json_text(value: &serde_json::Value) -> String {
    value.to_string()
}

// ── Writes ──────────────────────────────────────────────────────────

/// Run one write on `conn`, the shared connection or an open transaction.
/// Returns the number of rows changed.
async fn apply(conn: &Connection, op: &WriteOp<'_>) -> Result<u64, DatabaseError> {
    let (ctx, result) = match *op {
        WriteOp::Approval(approval) => (
            "insert_approval",
            conn.execute(
                &format!("INSERT INTO approvals ({APPROVAL_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
                params![
                    approval.id.to_string(),
                    approval.tenant_id.to_string(),
                    opt_uuid(approval.matter_id),
                    approval.object_type.as_str(),
                    approval.object_id.to_string(),
                    approval.status.as_str(),
                    opt_text(approval.requested_by.as_deref()),
                    opt_text(approval.decided_by.as_deref()),
                    opt_text(approval.decided_at.as_ref().map(fmt_ts).as_deref()),
                    opt_text(approval.notes.as_deref()),
                    fmt_ts(&approval.created_at),
                ],
            )
            .await,
        ),
        WriteOp::AgentRun(run) => (
            "insert_agent_run",
            conn.execute(
                &format!("INSERT INTO agent_runs ({AGENT_RUN_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
                params![
                    run.id.to_string(),
                    run.tenant_id.to_string(),
                    run.matter_id.to_string(),
                    run.agent_name.as_str(),
                    to_json_text(&run.input),
                    to_json_text(&run.output),
                    run.status.as_str(),
                    fmt_ts(&run.created_at),
                    fmt_ts(&run.updated_at),
                ],
            )
            .await,
        ),
        WriteOp::Draft(draft) => (
            "insert_draft",
            conn.execute(
                &format!("INSERT INTO message_drafts ({DRAFT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
                params![
                    draft.id.to_string(),
                    draft.tenant_id.to_string(),
                    draft.matter_id.to_string(),
                    draft.channel.as_str(),
                    draft.content.as_str(),
                    draft.status.as_str(),
                    draft.kind.as_str(),
                    match draft.reminder_sequence {
                        Some(seq) => libsql::Value::Integer(seq as i64),
                        None => libsql::Value::Null,
                    },
                    fmt_ts(&draft.created_at),
                    fmt_ts(&draft.updated_at),
                ],
            )
            .await,
        ),
        WriteOp::Task(task) => (
            "insert_task",
            conn.execute(
                &format!("INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
                params![
                    task.id.to_string(),
                    task.tenant_id.to_string(),
                    opt_uuid(task.matter_id),
                    task.title.as_str(),
                    opt_text(task.description.as_deref()),
                    task.kind.as_str(),
                    opt_uuid(task.approval_id),
                    task.status.as_str(),
                    fmt_ts(&task.created_at),
                ],
            )
            .await,
        ),
        WriteOp::Event(event) => (
            "insert_event",
            conn.execute(
                &format!("INSERT INTO events ({EVENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![
                    event.id.to_string(),
                    event.tenant_id.to_string(),
                    event.actor.as_str(),
                    event.name.as_str(),
                    to_json_text(&event.properties),
                    fmt_ts(&event.created_at),
                ],
            )
            .await,
        ),
        WriteOp::AgentRunStatus {
            tenant_id,
            id,
            status,
        } => (
            "update_agent_run_status",
            conn.execute(
                "UPDATE agent_runs SET status = ?1, updated_at = ?2 WHERE id = ?3 AND tenant_id = ?4",
                params![
                    status.as_str(),
                    fmt_ts(&Utc::now()),
                    id.to_string(),
                    tenant_id.to_string(),
                ],
            )
            .await,
        ),
        WriteOp::DraftStatus {
            tenant_id,
            id,
            status,
        } => (
            "update_draft_status",
            conn.execute(
                "UPDATE message_drafts SET status = ?1, updated_at = ?2 WHERE id = ?3 AND tenant_id = ?4",
                params![
                    status.as_str(),
                    fmt_ts(&Utc::now()),
                    id.to_string(),
                    tenant_id.to_string(),
                ],
            )
            .await,
        ),
        WriteOp::IntakeStage {
            tenant_id,
            id,
            stage,
        } => (
            "update_intake_stage",
            conn.execute(
                "UPDATE intakes SET pipeline_stage = ?1 WHERE id = ?2 AND tenant_id = ?3",
                params![stage, id.to_string(), tenant_id.to_string()],
            )
            .await,
        ),
        WriteOp::MatterStage {
            tenant_id,
            id,
            stage,
        } => (
            "update_matter_stage",
            conn.execute(
                "UPDATE matters SET pipeline_stage = ?1, updated_at = ?2 WHERE id = ?3 AND tenant_id = ?4",
                params![stage, fmt_ts(&Utc::now()), id.to_string(), tenant_id.to_string()],
            )
            .await,
        ),
    };
    let changed = result.map_err(|e| DatabaseError::Query(format!("{ctx}: {e}")))?;
    debug!(op = ctx, changed, "Write applied");
    Ok(changed)
}

/// Commit on success, roll back on error.
async fn finish<T>(tx: Transaction, result: Result<T, DatabaseError>) -> Result<T, DatabaseError> {
    match result {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| DatabaseError::Query(format!("commit: {e}")))?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "Rollback failed");
            }
            Err(e)
        }
    }
}

// ── Row mappers ─────────────────────────────────────────────────────

const APPROVAL_COLUMNS: &str = "id, tenant_id, matter_id, object_type, object_id, status, requested_by, decided_by, decided_at, notes, created_at";

fn row_to_approval(row: &libsql::Row) -> Result<Approval, DatabaseError> {
    let object_type: ObjectType = text(row, 3, "approval.object_type")?
        .parse()
        .map_err(DatabaseError::Serialization)?;
    Ok(Approval {
        id: uuid_col(row, 0, "approval.id")?,
        tenant_id: uuid_col(row, 1, "approval.tenant_id")?,
        matter_id: opt_uuid_col(row, 2),
        object_type,
        object_id: uuid_col(row, 4, "approval.object_id")?,
        status: enum_col(row, 5, ApprovalStatus::Pending),
        requested_by: opt_col(row, 6),
        decided_by: opt_col(row, 7),
        decided_at: opt_col(row, 8).map(|s| parse_datetime(&s)),
        notes: opt_col(row, 9),
        created_at: ts_col(row, 10),
    })
}

const AGENT_RUN_COLUMNS: &str =
    "id, tenant_id, matter_id, agent_name, input, output, status, created_at, updated_at";

fn row_to_agent_run(row: &libsql::Row) -> Result<AgentRun, DatabaseError> {
    Ok(AgentRun {
        id: uuid_col(row, 0, "agent_run.id")?,
        tenant_id: uuid_col(row, 1, "agent_run.tenant_id")?,
        matter_id: uuid_col(row, 2, "agent_run.matter_id")?,
        agent_name: text(row, 3, "agent_run.agent_name")?,
        input: json_col(row, 4),
        output: json_col(row, 5),
        status: enum_col(row, 6, AgentRunStatus::Pending),
        created_at: ts_col(row, 7),
        updated_at: ts_col(row, 8),
    })
}

const DRAFT_COLUMNS: &str = "id, tenant_id, matter_id, channel, content, status, kind, reminder_sequence, created_at, updated_at";

fn row_to_draft(row: &libsql::Row) -> Result<MessageDraft, DatabaseError> {
    let channel = text(row, 3, "draft.channel")?
        .parse()
        .map_err(DatabaseError::Serialization)?;
    let sequence: Option<i64> = row.get::<i64>(7).ok();
    Ok(MessageDraft {
        id: uuid_col(row, 0, "draft.id")?,
        tenant_id: uuid_col(row, 1, "draft.tenant_id")?,
        matter_id: uuid_col(row, 2, "draft.matter_id")?,
        channel,
        content: text(row, 4, "draft.content")?,
        status: enum_col(row, 5, DraftStatus::Draft),
        kind: enum_col(row, 6, DraftKind::Manual),
        reminder_sequence: sequence.map(|s| s.max(0) as u32),
        created_at: ts_col(row, 8),
        updated_at: ts_col(row, 9),
    })
}

const TASK_COLUMNS: &str =
    "id, tenant_id, matter_id, title, description, kind, approval_id, status, created_at";

fn row_to_task(row: &libsql::Row) -> Result<Task, DatabaseError> {
    Ok(Task {
        id: uuid_col(row, 0, "task.id")?,
        tenant_id: uuid_col(row, 1, "task.tenant_id")?,
        matter_id: opt_uuid_col(row, 2),
        title: text(row, 3, "task.title")?,
        description: opt_col(row, 4),
        kind: enum_col(row, 5, TaskKind::General),
        approval_id: opt_uuid_col(row, 6),
        status: enum_col(row, 7, TaskStatus::Open),
        created_at: ts_col(row, 8),
    })
}

const INTAKE_COLUMNS: &str = "id, tenant_id, payload, status, pipeline_stage, created_at";

fn row_to_intake(row: &libsql::Row) -> Result<Intake, DatabaseError> {
    Ok(Intake {
        id: uuid_col(row, 0, "intake.id")?,
        tenant_id: uuid_col(row, 1, "intake.tenant_id")?,
        payload: json_col(row, 2),
        status: enum_col(row, 3, IntakeStatus::New),
        pipeline_stage: opt_col(row, 4),
        created_at: ts_col(row, 5),
    })
}

const MATTER_COLUMNS: &str = "id, tenant_id, matter_type, jurisdiction, urgency_score, status, pipeline_stage, intake_id, created_at, updated_at";

fn row_to_matter(row: &libsql::Row) -> Result<Matter, DatabaseError> {
    let urgency: i64 = row.get::<i64>(4).unwrap_or(0);
    Ok(Matter {
        id: uuid_col(row, 0, "matter.id")?,
        tenant_id: uuid_col(row, 1, "matter.tenant_id")?,
        matter_type: text(row, 2, "matter.matter_type")?,
        jurisdiction: opt_col(row, 3),
        urgency_score: urgency.clamp(0, 100) as u8,
        status: enum_col(row, 5, MatterStatus::Open),
        pipeline_stage: opt_col(row, 6),
        intake_id: opt_uuid_col(row, 7),
        created_at: ts_col(row, 8),
        updated_at: ts_col(row, 9),
    })
}

const DOCUMENT_COLUMNS: &str = "id, tenant_id, matter_id, kind, filename, status, created_at";

fn row_to_document(row: &libsql::Row) -> Result<Document, DatabaseError> {
    Ok(Document {
        id: uuid_col(row, 0, "document.id")?,
        tenant_id: uuid_col(row, 1, "document.tenant_id")?,
        matter_id: uuid_col(row, 2, "document.matter_id")?,
        kind: text(row, 3, "document.kind")?,
        filename: text(row, 4, "document.filename")?,
        status: enum_col(row, 5, DocumentStatus::Uploaded),
        created_at: ts_col(row, 6),
    })
}

const EVENT_COLUMNS: &str = "id, tenant_id, actor, name, properties, created_at";

fn row_to_event(row: &libsql::Row) -> Result<AuditEvent, DatabaseError> {
    Ok(AuditEvent {
        id: uuid_col(row, 0, "event.id")?,
        tenant_id: uuid_col(row, 1, "event.tenant_id")?,
        actor: text(row, 2, "event.actor")?,
        name: text(row, 3, "event.name")?,
        properties: json_col(row, 4),
        created_at: ts_col(row, 5),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn commit(&self, ops: &[WriteOp<'_>]) -> Result<(), DatabaseError> {
        let _guard = self.lock.lock().await;
        let tx = self.begin().await?;
        let result = async {
            for op in ops {
                apply(&tx, op).await?;
            }
            Ok::<_, DatabaseError>(())
        }
        .await;
        finish(tx, result).await
    }

    // ── Approvals ───────────────────────────────────────────────────

    async fn insert_approval(&self, approval: &Approval) -> Result<(), DatabaseError> {
        self.write(WriteOp::Approval(approval)).await.map(|_| ())
    }

    async fn get_approval(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Approval>, DatabaseError> {
        self.query_one(
            "get_approval",
            &format!("SELECT {APPROVAL_COLUMNS} FROM approvals WHERE id = ?1 AND tenant_id = ?2"),
            params![id.to_string(), tenant_id.to_string()],
            row_to_approval,
        )
        .await
    }

    async fn list_approvals(
        &self,
        tenant_id: Uuid,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<Approval>, DatabaseError> {
        match status {
            Some(status) => {
                self.query_all(
                    "list_approvals",
                    &format!("SELECT {APPROVAL_COLUMNS} FROM approvals WHERE tenant_id = ?1 AND status = ?2 ORDER BY created_at DESC"),
                    params![tenant_id.to_string(), status.as_str()],
                    row_to_approval,
                )
                .await
            }
            None => {
                self.query_all(
                    "list_approvals",
                    &format!("SELECT {APPROVAL_COLUMNS} FROM approvals WHERE tenant_id = ?1 ORDER BY created_at DESC"),
                    params![tenant_id.to_string()],
                    row_to_approval,
                )
                .await
            }
        }
    }

    async fn decide_approval(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        decision: &Decision,
        then: &[WriteOp<'_>],
    ) -> Result<bool, DatabaseError> {
        let _guard = self.lock.lock().await;
        let tx = self.begin().await?;
        let result = async {
            let changed = tx
                .execute(
                    "UPDATE approvals SET status = ?1, decided_by = ?2, decided_at = ?3, notes = ?4
                     WHERE id = ?5 AND tenant_id = ?6 AND status = 'pending'",
                    params![
                        decision.status.as_str(),
                        opt_text(decision.decided_by.as_deref()),
                        fmt_ts(&decision.decided_at),
                        opt_text(decision.notes.as_deref()),
                        id.to_string(),
                        tenant_id.to_string(),
                    ],
                )
                .await
                .map_err(|e| DatabaseError::Query(format!("decide_approval: {e}")))?;
            if changed == 0 {
                return Ok(false);
            }
            for op in then {
                apply(&tx, op).await?;
            }
            Ok::<_, DatabaseError>(true)
        }
        .await;
        finish(tx, result).await
    }

    // ── Agent runs ──────────────────────────────────────────────────

    async fn insert_agent_run(&self, run: &AgentRun) -> Result<(), DatabaseError> {
        self.write(WriteOp::AgentRun(run)).await.map(|_| ())
    }

    async fn get_agent_run(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<AgentRun>, DatabaseError> {
        self.query_one(
            "get_agent_run",
            &format!("SELECT {AGENT_RUN_COLUMNS} FROM agent_runs WHERE id = ?1 AND tenant_id = ?2"),
            params![id.to_string(), tenant_id.to_string()],
            row_to_agent_run,
        )
        .await
    }

    // ── Message drafts ──────────────────────────────────────────────

    async fn insert_draft(&self, draft: &MessageDraft) -> Result<(), DatabaseError> {
        self.write(WriteOp::Draft(draft)).await.map(|_| ())
    }

    async fn get_draft(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<MessageDraft>, DatabaseError> {
        self.query_one(
            "get_draft",
            &format!("SELECT {DRAFT_COLUMNS} FROM message_drafts WHERE id = ?1 AND tenant_id = ?2"),
            params![id.to_string(), tenant_id.to_string()],
            row_to_draft,
        )
        .await
    }

    async fn list_drafts(
        &self,
        tenant_id: Uuid,
        matter_id: Option<Uuid>,
    ) -> Result<Vec<MessageDraft>, DatabaseError> {
        match matter_id {
            Some(matter_id) => {
                self.query_all(
                    "list_drafts",
                    &format!("SELECT {DRAFT_COLUMNS} FROM message_drafts WHERE tenant_id = ?1 AND matter_id = ?2 ORDER BY created_at DESC"),
                    params![tenant_id.to_string(), matter_id.to_string()],
                    row_to_draft,
                )
                .await
            }
            None => {
                self.query_all(
                    "list_drafts",
                    &format!("SELECT {DRAFT_COLUMNS} FROM message_drafts WHERE tenant_id = ?1 ORDER BY created_at DESC"),
                    params![tenant_id.to_string()],
                    row_to_draft,
                )
                .await
            }
        }
    }

    async fn reminder_stats(
        &self,
        tenant_id: Uuid,
        matter_id: Uuid,
        kind: DraftKind,
    ) -> Result<ReminderStats, DatabaseError> {
        let stats = self
            .query_one(
                "reminder_stats",
                "SELECT COUNT(*), MAX(created_at) FROM message_drafts
                 WHERE tenant_id = ?1 AND matter_id = ?2 AND kind = ?3",
                params![tenant_id.to_string(), matter_id.to_string(), kind.as_str()],
                |row| {
                    let count: i64 = row.get::<i64>(0).unwrap_or(0);
                    Ok(ReminderStats {
                        count: count.max(0) as u32,
                        last_created_at: opt_col(row, 1).map(|s| parse_datetime(&s)),
                    })
                },
            )
            .await?;
        Ok(stats.unwrap_or_default())
    }

    // ── Tasks ───────────────────────────────────────────────────────

    async fn insert_task(&self, task: &Task) -> Result<(), DatabaseError> {
        self.write(WriteOp::Task(task)).await.map(|_| ())
    }

    async fn list_tasks(&self, tenant_id: Uuid) -> Result<Vec<Task>, DatabaseError> {
        self.query_all(
            "list_tasks",
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE tenant_id = ?1 ORDER BY created_at DESC"),
            params![tenant_id.to_string()],
            row_to_task,
        )
        .await
    }

    async fn has_nudge_task(
        &self,
        tenant_id: Uuid,
        approval_id: Uuid,
    ) -> Result<bool, DatabaseError> {
        let count = self
            .query_one(
                "has_nudge_task",
                "SELECT COUNT(*) FROM tasks WHERE tenant_id = ?1 AND kind = ?2 AND approval_id = ?3",
                params![
                    tenant_id.to_string(),
                    TaskKind::SlaNudge.as_str(),
                    approval_id.to_string(),
                ],
                |row| Ok(row.get::<i64>(0).unwrap_or(0)),
            )
            .await?;
        Ok(count.unwrap_or(0) > 0)
    }

    // ── Intakes ─────────────────────────────────────────────────────

    async fn insert_intake(&self, intake: &Intake) -> Result<(), DatabaseError> {
        self.execute(
            "insert_intake",
            &format!("INSERT INTO intakes ({INTAKE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
            params![
                intake.id.to_string(),
                intake.tenant_id.to_string(),
                to_json_text(&intake.payload),
                intake.status.as_str(),
                opt_text(intake.pipeline_stage.as_deref()),
                fmt_ts(&intake.created_at),
            ],
        )
        .await?;
        Ok(())
    }

    async fn get_intake(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Intake>, DatabaseError> {
        self.query_one(
            "get_intake",
            &format!("SELECT {INTAKE_COLUMNS} FROM intakes WHERE id = ?1 AND tenant_id = ?2"),
            params![id.to_string(), tenant_id.to_string()],
            row_to_intake,
        )
        .await
    }

    async fn list_intakes(
        &self,
        tenant_id: Uuid,
        statuses: &[IntakeStatus],
    ) -> Result<Vec<Intake>, DatabaseError> {
        let intakes = self
            .query_all(
                "list_intakes",
                &format!("SELECT {INTAKE_COLUMNS} FROM intakes WHERE tenant_id = ?1 ORDER BY created_at ASC"),
                params![tenant_id.to_string()],
                row_to_intake,
            )
            .await?;
        Ok(intakes
            .into_iter()
            .filter(|i| statuses.contains(&i.status))
            .collect())
    }

    // ── Matters ─────────────────────────────────────────────────────

    async fn insert_matter(&self, matter: &Matter) -> Result<(), DatabaseError> {
        self.execute(
            "insert_matter",
            &format!("INSERT INTO matters ({MATTER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
            params![
                matter.id.to_string(),
                matter.tenant_id.to_string(),
                matter.matter_type.as_str(),
                opt_text(matter.jurisdiction.as_deref()),
                matter.urgency_score as i64,
                matter.status.as_str(),
                opt_text(matter.pipeline_stage.as_deref()),
                opt_uuid(matter.intake_id),
                fmt_ts(&matter.created_at),
                fmt_ts(&matter.updated_at),
            ],
        )
        .await?;
        Ok(())
    }

    async fn get_matter(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Matter>, DatabaseError> {
        self.query_one(
            "get_matter",
            &format!("SELECT {MATTER_COLUMNS} FROM matters WHERE id = ?1 AND tenant_id = ?2"),
            params![id.to_string(), tenant_id.to_string()],
            row_to_matter,
        )
        .await
    }

    async fn list_matters(&self, tenant_id: Uuid) -> Result<Vec<Matter>, DatabaseError> {
        self.query_all(
            "list_matters",
            &format!("SELECT {MATTER_COLUMNS} FROM matters WHERE tenant_id = ?1 ORDER BY urgency_score DESC, created_at ASC"),
            params![tenant_id.to_string()],
            row_to_matter,
        )
        .await
    }

    async fn list_matters_in_stage(
        &self,
        tenant_id: Uuid,
        stage: &str,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Matter>, DatabaseError> {
        self.query_all(
            "list_matters_in_stage",
            &format!("SELECT {MATTER_COLUMNS} FROM matters WHERE tenant_id = ?1 AND pipeline_stage = ?2 AND created_at < ?3 ORDER BY created_at ASC"),
            params![tenant_id.to_string(), stage, fmt_ts(&created_before)],
            row_to_matter,
        )
        .await
    }

    // ── Documents ───────────────────────────────────────────────────

    async fn insert_document(&self, document: &Document) -> Result<(), DatabaseError> {
        self.execute(
            "insert_document",
            &format!("INSERT INTO documents ({DOCUMENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                document.id.to_string(),
                document.tenant_id.to_string(),
                document.matter_id.to_string(),
                document.kind.as_str(),
                document.filename.as_str(),
                document.status.as_str(),
                fmt_ts(&document.created_at),
            ],
        )
        .await?;
        Ok(())
    }

    async fn list_documents(
        &self,
        tenant_id: Uuid,
        matter_id: Uuid,
    ) -> Result<Vec<Document>, DatabaseError> {
        self.query_all(
            "list_documents",
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE tenant_id = ?1 AND matter_id = ?2 ORDER BY created_at ASC"),
            params![tenant_id.to_string(), matter_id.to_string()],
            row_to_document,
        )
        .await
    }

    // ── Events ──────────────────────────────────────────────────────

    async fn insert_event(&self, event: &AuditEvent) -> Result<(), DatabaseError> {
        self.write(WriteOp::Event(event)).await.map(|_| ())
    }

    async fn list_events(
        &self,
        tenant_id: Uuid,
        name: Option<&str>,
    ) -> Result<Vec<AuditEvent>, DatabaseError> {
        match name {
            Some(name) => {
                self.query_all(
                    "list_events",
                    &format!("SELECT {EVENT_COLUMNS} FROM events WHERE tenant_id = ?1 AND name = ?2 ORDER BY created_at ASC"),
                    params![tenant_id.to_string(), name],
                    row_to_event,
                )
                .await
            }
            None => {
                self.query_all(
                    "list_events",
                    &format!("SELECT {EVENT_COLUMNS} FROM events WHERE tenant_id = ?1 ORDER BY created_at ASC"),
                    params![tenant_id.to_string()],
                    row_to_event,
                )
                .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    use crate::model::{Channel, ObjectType};

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    // ── Approval tests ──────────────────────────────────────────────

    #[tokio::test]
    async fn approval_insert_and_get() {
        let db = test_db().await;
        let tenant = Uuid::new_v4();
        let approval = Approval::new(tenant, ObjectType::AgentRun, Uuid::new_v4())
            .with_requester(Some("paralegal".into()));
        db.insert_approval(&approval).await.unwrap();

        let fetched = db.get_approval(tenant, approval.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, approval.id);
        assert_eq!(fetched.object_type, ObjectType::AgentRun);
        assert_eq!(fetched.status, ApprovalStatus::Pending);
        assert_eq!(fetched.requested_by.as_deref(), Some("paralegal"));
        assert!(fetched.decided_at.is_none());
    }

    #[tokio::test]
    async fn approval_is_invisible_to_other_tenants() {
        let db = test_db().await;
        let approval = Approval::new(Uuid::new_v4(), ObjectType::AgentRun, Uuid::new_v4());
        db.insert_approval(&approval).await.unwrap();

        let other = Uuid::new_v4();
        assert!(db.get_approval(other, approval.id).await.unwrap().is_none());
        assert!(db.list_approvals(other, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_approvals_newest_first_with_filter() {
        let db = test_db().await;
        let tenant = Uuid::new_v4();
        let mut older = Approval::new(tenant, ObjectType::AgentRun, Uuid::new_v4());
        older.created_at = Utc::now() - Duration::hours(2);
        let newer = Approval::new(tenant, ObjectType::MessageDraft, Uuid::new_v4());
        db.insert_approval(&older).await.unwrap();
        db.insert_approval(&newer).await.unwrap();

        let all = db.list_approvals(tenant, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, newer.id);
        assert_eq!(all[1].id, older.id);

        let rejected = db
            .list_approvals(tenant, Some(ApprovalStatus::Rejected))
            .await
            .unwrap();
        assert!(rejected.is_empty());
    }

    #[tokio::test]
    async fn decide_only_applies_once() {
        let db = test_db().await;
        let tenant = Uuid::new_v4();
        let approval = Approval::new(tenant, ObjectType::AgentRun, Uuid::new_v4());
        db.insert_approval(&approval).await.unwrap();

        let decision = Decision {
            status: ApprovalStatus::Approved,
            decided_by: Some("attorney".into()),
            decided_at: Utc::now(),
            notes: Some("ok".into()),
        };
        assert!(db.decide_approval(tenant, approval.id, &decision, &[]).await.unwrap());

        let second = Decision {
            status: ApprovalStatus::Rejected,
            ..decision
        };
        assert!(!db.decide_approval(tenant, approval.id, &second, &[]).await.unwrap());

        let fetched = db.get_approval(tenant, approval.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, ApprovalStatus::Approved);
        assert_eq!(fetched.decided_by.as_deref(), Some("attorney"));
        assert_eq!(fetched.notes.as_deref(), Some("ok"));
        assert!(fetched.decided_at.is_some());
    }

    #[tokio::test]
    async fn decide_writes_follow_ups_in_same_transaction() {
        let db = test_db().await;
        let tenant = Uuid::new_v4();
        let run = AgentRun::new(tenant, Uuid::new_v4(), "intake_specialist", json!({}))
            .with_output(json!({}), AgentRunStatus::NeedsApproval);
        let approval = Approval::new(tenant, ObjectType::AgentRun, run.id);
        db.commit(&[WriteOp::AgentRun(&run), WriteOp::Approval(&approval)])
            .await
            .unwrap();

        let decision = Decision {
            status: ApprovalStatus::Approved,
            decided_by: None,
            decided_at: Utc::now(),
            notes: None,
        };
        let cascade = WriteOp::AgentRunStatus {
            tenant_id: tenant,
            id: run.id,
            status: AgentRunStatus::Completed,
        };
        let event = AuditEvent::new(tenant, "approval_decided", json!({}));

        db.fail_inserts_into("events").await;
        let err = db
            .decide_approval(tenant, approval.id, &decision, &[cascade, WriteOp::Event(&event)])
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Query(_)));

        let stored = db.get_approval(tenant, approval.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ApprovalStatus::Pending);
        assert!(stored.decided_at.is_none());
        let run = db.get_agent_run(tenant, run.id).await.unwrap().unwrap();
        assert_eq!(run.status, AgentRunStatus::NeedsApproval);
    }

    // ── Batch tests ─────────────────────────────────────────────────

    #[tokio::test]
    async fn commit_is_all_or_nothing() {
        let db = test_db().await;
        let tenant = Uuid::new_v4();
        let draft = MessageDraft::new(tenant, Uuid::new_v4(), Channel::Email, "Hola");
        let approval = Approval::new(tenant, ObjectType::MessageDraft, draft.id);
        let event = AuditEvent::new(tenant, "approval_opened", json!({}));

        db.fail_inserts_into("approvals").await;
        let err = db
            .commit(&[
                WriteOp::Draft(&draft),
                WriteOp::Approval(&approval),
                WriteOp::Event(&event),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Query(_)));

        assert!(db.get_draft(tenant, draft.id).await.unwrap().is_none());
        assert_eq!(db.count_rows("message_drafts").await, 0);
        assert_eq!(db.count_rows("events").await, 0);

        // The connection is usable again once the batch is rolled back.
        db.insert_draft(&draft).await.unwrap();
        assert_eq!(db.count_rows("message_drafts").await, 1);
    }

    #[tokio::test]
    async fn status_updates_in_a_batch_tolerate_missing_rows() {
        let db = test_db().await;
        let tenant = Uuid::new_v4();
        let event = AuditEvent::new(tenant, "message_sent", json!({}));
        db.commit(&[
            WriteOp::DraftStatus {
                tenant_id: tenant,
                id: Uuid::new_v4(),
                status: DraftStatus::Sent,
            },
            WriteOp::Event(&event),
        ])
        .await
        .unwrap();
        assert_eq!(db.list_events(tenant, None).await.unwrap().len(), 1);
    }

    // ── Draft tests ─────────────────────────────────────────────────

    #[tokio::test]
    async fn reminder_stats_counts_by_kind() {
        let db = test_db().await;
        let tenant = Uuid::new_v4();
        let matter = Uuid::new_v4();

        let empty = db
            .reminder_stats(tenant, matter, DraftKind::WhatsappReminder)
            .await
            .unwrap();
        assert_eq!(empty, ReminderStats::default());

        let mut first = MessageDraft::new(tenant, matter, Channel::Whatsapp, "uno")
            .as_reminder(DraftKind::WhatsappReminder, 1);
        first.created_at = Utc::now() - Duration::hours(30);
        let second = MessageDraft::new(tenant, matter, Channel::Whatsapp, "dos")
            .as_reminder(DraftKind::WhatsappReminder, 2);
        let manual = MessageDraft::new(tenant, matter, Channel::Email, "hello");
        for draft in [&first, &second, &manual] {
            db.insert_draft(draft).await.unwrap();
        }

        let stats = db
            .reminder_stats(tenant, matter, DraftKind::WhatsappReminder)
            .await
            .unwrap();
        assert_eq!(stats.count, 2);
        let last = stats.last_created_at.unwrap();
        assert!((last - second.created_at).num_milliseconds().abs() < 1);

        let fetched = db.get_draft(tenant, second.id).await.unwrap().unwrap();
        assert_eq!(fetched.reminder_sequence, Some(2));
        assert_eq!(fetched.kind, DraftKind::WhatsappReminder);
    }

    #[tokio::test]
    async fn update_draft_status_scoped_by_tenant() {
        let db = test_db().await;
        let tenant = Uuid::new_v4();
        let draft = MessageDraft::new(tenant, Uuid::new_v4(), Channel::Sms, "hi");
        db.insert_draft(&draft).await.unwrap();

        let approve = |tenant_id| WriteOp::DraftStatus {
            tenant_id,
            id: draft.id,
            status: DraftStatus::Approved,
        };
        assert_eq!(db.write(approve(Uuid::new_v4())).await.unwrap(), 0);
        assert_eq!(db.write(approve(tenant)).await.unwrap(), 1);
        let fetched = db.get_draft(tenant, draft.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, DraftStatus::Approved);
    }

    // ── Task tests ──────────────────────────────────────────────────

    #[tokio::test]
    async fn nudge_task_lookup() {
        let db = test_db().await;
        let tenant = Uuid::new_v4();
        let approval_id = Uuid::new_v4();
        assert!(!db.has_nudge_task(tenant, approval_id).await.unwrap());

        db.insert_task(&Task::new(tenant, "[SLA Nudge]").nudging(approval_id))
            .await
            .unwrap();
        assert!(db.has_nudge_task(tenant, approval_id).await.unwrap());
        assert!(!db.has_nudge_task(tenant, Uuid::new_v4()).await.unwrap());
        assert_eq!(db.list_tasks(tenant).await.unwrap().len(), 1);
    }

    // ── Intake / matter tests ───────────────────────────────────────

    #[tokio::test]
    async fn intakes_filtered_by_status_oldest_first() {
        let db = test_db().await;
        let tenant = Uuid::new_v4();
        let mut first = Intake::new(tenant, json!({"full_name": "A"}));
        first.created_at = Utc::now() - Duration::hours(5);
        let second = Intake::new(tenant, json!({"full_name": "B"}));
        let mut converted = Intake::new(tenant, json!({}));
        converted.status = IntakeStatus::Converted;
        for intake in [&second, &first, &converted] {
            db.insert_intake(intake).await.unwrap();
        }

        let open = db
            .list_intakes(tenant, &[IntakeStatus::New, IntakeStatus::Processing])
            .await
            .unwrap();
        assert_eq!(open.len(), 2);
        assert_eq!(open[0].id, first.id);
        assert_eq!(open[0].payload["full_name"], "A");
    }

    #[tokio::test]
    async fn matters_in_stage_respects_cutoff() {
        let db = test_db().await;
        let tenant = Uuid::new_v4();
        let now = Utc::now();
        let mut old = Matter::new(tenant, "mx_divorce").with_stage("docs_pending");
        old.created_at = now - Duration::hours(30);
        let fresh = Matter::new(tenant, "mx_divorce").with_stage("docs_pending");
        let mut other_stage = Matter::new(tenant, "mx_divorce").with_stage("approved");
        other_stage.created_at = now - Duration::hours(30);
        for matter in [&old, &fresh, &other_stage] {
            db.insert_matter(matter).await.unwrap();
        }

        let due = db
            .list_matters_in_stage(tenant, "docs_pending", now - Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, old.id);
    }

    #[tokio::test]
    async fn matters_ordered_by_urgency_then_age() {
        let db = test_db().await;
        let tenant = Uuid::new_v4();
        let calm = Matter::new(tenant, "immigration").with_urgency(10);
        let urgent = Matter::new(tenant, "immigration").with_urgency(90);
        db.insert_matter(&calm).await.unwrap();
        db.insert_matter(&urgent).await.unwrap();

        let matters = db.list_matters(tenant).await.unwrap();
        assert_eq!(matters[0].id, urgent.id);
        assert_eq!(matters[1].id, calm.id);
    }

    #[tokio::test]
    async fn stage_update_requires_matching_tenant() {
        let db = test_db().await;
        let tenant = Uuid::new_v4();
        let matter = Matter::new(tenant, "mx_labor");
        db.insert_matter(&matter).await.unwrap();

        let approve = |tenant_id| WriteOp::MatterStage {
            tenant_id,
            id: matter.id,
            stage: "approved",
        };
        assert_eq!(db.write(approve(Uuid::new_v4())).await.unwrap(), 0);
        assert_eq!(db.write(approve(tenant)).await.unwrap(), 1);
        let fetched = db.get_matter(tenant, matter.id).await.unwrap().unwrap();
        assert_eq!(fetched.pipeline_stage.as_deref(), Some("approved"));
    }

    // ── Event tests ─────────────────────────────────────────────────

    #[tokio::test]
    async fn events_filter_by_name() {
        let db = test_db().await;
        let tenant = Uuid::new_v4();
        db.insert_event(&AuditEvent::new(tenant, "a", json!({"n": 1})))
            .await
            .unwrap();
        db.insert_event(&AuditEvent::new(tenant, "b", json!({})).by(Some("user-1")))
            .await
            .unwrap();

        let only_b = db.list_events(tenant, Some("b")).await.unwrap();
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].actor, "user-1");
        assert_eq!(db.list_events(tenant, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn new_local_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("legalops.db");
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        assert!(path.exists());
        drop(db);
    }
}
