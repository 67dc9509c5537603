//! Agent runs end to end: generate, build, persist, gate.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use super::builder::{AgentOutputBuilder, run_status};
use crate::approvals::{ApprovalGate, ApprovalRequest};
use crate::error::GateError;
use crate::llm::FallbackGenerator;
use crate::model::event::AGENT_RUN_CREATED;
use crate::model::{AgentRun, Approval, AuditEvent, ObjectType};
use crate::store::{Database, WriteOp};

/// A persisted run together with the approval that gates it.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run: AgentRun,
    pub approval: Approval,
}

pub struct AgentRunner {
    db: Arc<dyn Database>,
    builder: Arc<AgentOutputBuilder>,
    generator: Arc<FallbackGenerator>,
    gate: Arc<ApprovalGate>,
}

impl AgentRunner {
    pub fn new(
        db: Arc<dyn Database>,
        builder: Arc<AgentOutputBuilder>,
        generator: Arc<FallbackGenerator>,
        gate: Arc<ApprovalGate>,
    ) -> Self {
        Self {
            db,
            builder,
            generator,
            gate,
        }
    }

    /// Run `agent` on `input` for a matter and open its approval.
    ///
    /// Every run gets exactly one pending approval, blocked or not. The run,
    /// its approval and their events are stored together or not at all.
    pub async fn run(
        &self,
        tenant_id: Uuid,
        matter_id: Uuid,
        agent: &str,
        input: Value,
        requested_by: Option<&str>,
    ) -> Result<RunOutcome, GateError> {
        let def = self.builder.definition(agent)?;
        self.db
            .get_matter(tenant_id, matter_id)
            .await?
            .ok_or_else(|| GateError::not_found("Matter", matter_id))?;

        let prompt = def.build_prompt(&input);
        let raw = self.generator.generate(agent, &prompt, &input).await;
        let output = self.builder.build(agent, &input, &raw)?;
        let status = run_status(&output);

        let run = AgentRun::new(tenant_id, matter_id, agent, input).with_output(output, status);
        let pending = self.gate.prepare(ApprovalRequest {
            tenant_id,
            matter_id: Some(matter_id),
            object_type: ObjectType::AgentRun,
            object_id: run.id,
            requested_by: requested_by.map(str::to_string),
        });
        let created = AuditEvent::new(
            tenant_id,
            AGENT_RUN_CREATED,
            json!({
                "agent_run_id": run.id,
                "agent_name": agent,
                "matter_id": matter_id,
                "status": run.status.as_str(),
            }),
        )
        .by(requested_by);

        let [approval_write, opened_event] = pending.writes();
        self.db
            .commit(&[
                WriteOp::AgentRun(&run),
                approval_write,
                opened_event,
                WriteOp::Event(&created),
            ])
            .await?;
        let approval = pending.into_opened();

        info!(run_id = %run.id, agent, status = %run.status, "Agent run created");
        Ok(RunOutcome { run, approval })
    }
}
