//! Stage tracker: the board view and the only sanctioned stage mutation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::stages::{MX_STAGES, PipelineStage};
use crate::error::GateError;
use crate::model::event::PIPELINE_STAGE_CHANGED;
use crate::model::{AuditEvent, Intake, IntakeStatus, Matter};
use crate::store::{Database, WriteOp};

const ALL_INTAKE_STATUSES: [IntakeStatus; 4] = [
    IntakeStatus::New,
    IntakeStatus::Processing,
    IntakeStatus::Converted,
    IntakeStatus::Archived,
];

/// Intakes still moving through the funnel.
const OPEN_INTAKE_STATUSES: [IntakeStatus; 2] = [IntakeStatus::New, IntakeStatus::Processing];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Intake,
    Matter,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::Matter => "matter",
        }
    }

    /// Stage shown when the stored stage is empty or off the board.
    pub fn default_stage(&self) -> PipelineStage {
        match self {
            Self::Intake => PipelineStage::NewLead,
            Self::Matter => PipelineStage::DocsPending,
        }
    }

    fn entity_name(&self) -> &'static str {
        match self {
            Self::Intake => "Intake",
            Self::Matter => "Matter",
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "intake" => Ok(Self::Intake),
            "matter" => Ok(Self::Matter),
            _ => Err(format!("Unknown entity type: {s}")),
        }
    }
}

/// One card on the board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardItem {
    pub id: Uuid,
    pub entity_type: EntityKind,
    pub pipeline_stage: PipelineStage,
    #[serde(rename = "type")]
    pub case_type: Option<String>,
    pub client_name: Option<String>,
    pub urgency_score: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub intake_id: Option<Uuid>,
    pub matter_id: Option<Uuid>,
    /// Whole days since creation.
    pub days_in_stage: i64,
    pub next_action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardColumn {
    pub stage: PipelineStage,
    pub items: Vec<BoardItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    /// One column per stage of the Mexican flow, in order.
    pub columns: Vec<BoardColumn>,
    pub stage_counts: BTreeMap<String, usize>,
}

impl Board {
    pub fn column(&self, stage: PipelineStage) -> Option<&BoardColumn> {
        self.columns.iter().find(|c| c.stage == stage)
    }

    pub fn total(&self) -> usize {
        self.columns.iter().map(|c| c.items.len()).sum()
    }
}

/// Board stage for a stored value: itself when on the board, else the kind default.
fn display_stage(kind: EntityKind, stored: Option<&str>) -> PipelineStage {
    stored
        .and_then(|s| s.parse::<PipelineStage>().ok())
        .filter(PipelineStage::on_board)
        .unwrap_or_else(|| kind.default_stage())
}

fn intake_item(intake: &Intake, now: DateTime<Utc>) -> BoardItem {
    let stage = display_stage(EntityKind::Intake, intake.pipeline_stage.as_deref());
    BoardItem {
        id: intake.id,
        entity_type: EntityKind::Intake,
        pipeline_stage: stage,
        case_type: intake.case_type().map(str::to_string),
        client_name: intake.client_name().map(str::to_string),
        urgency_score: None,
        created_at: intake.created_at,
        intake_id: Some(intake.id),
        matter_id: None,
        days_in_stage: (now - intake.created_at).num_days(),
        next_action: stage.next_action().to_string(),
    }
}

fn matter_item(matter: &Matter, intake: Option<&Intake>, now: DateTime<Utc>) -> BoardItem {
    let stage = display_stage(EntityKind::Matter, matter.pipeline_stage.as_deref());
    BoardItem {
        id: matter.id,
        entity_type: EntityKind::Matter,
        pipeline_stage: stage,
        case_type: Some(matter.matter_type.clone()),
        client_name: intake.and_then(Intake::client_name).map(str::to_string),
        urgency_score: Some(matter.urgency_score),
        created_at: matter.created_at,
        intake_id: matter.intake_id,
        matter_id: Some(matter.id),
        days_in_stage: (now - matter.created_at).num_days(),
        next_action: stage.next_action().to_string(),
    }
}

pub struct StageTracker {
    db: Arc<dyn Database>,
}

impl StageTracker {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub async fn get_board(&self, tenant_id: Uuid) -> Result<Board, GateError> {
        self.get_board_at(tenant_id, Utc::now()).await
    }

    /// Board as of `now`. Stored stages are never rewritten here.
    pub async fn get_board_at(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Board, GateError> {
        let intakes = self.db.list_intakes(tenant_id, &ALL_INTAKE_STATUSES).await?;
        let matters = self.db.list_matters(tenant_id).await?;
        let by_id: HashMap<Uuid, &Intake> = intakes.iter().map(|i| (i.id, i)).collect();

        let mut columns: Vec<BoardColumn> = MX_STAGES
            .iter()
            .map(|&stage| BoardColumn {
                stage,
                items: Vec::new(),
            })
            .collect();
        let mut place = |item: BoardItem| {
            if let Some(col) = columns.iter_mut().find(|c| c.stage == item.pipeline_stage) {
                col.items.push(item);
            }
        };

        for intake in intakes
            .iter()
            .filter(|i| OPEN_INTAKE_STATUSES.contains(&i.status))
        {
            place(intake_item(intake, now));
        }
        for matter in &matters {
            let intake = matter.intake_id.and_then(|id| by_id.get(&id).copied());
            place(matter_item(matter, intake, now));
        }

        let stage_counts = columns
            .iter()
            .map(|c| (c.stage.as_str().to_string(), c.items.len()))
            .collect();
        Ok(Board {
            columns,
            stage_counts,
        })
    }

    /// Move an intake or matter to `new_stage` and record the move.
    ///
    /// Any stage of either flow is accepted.
    pub async fn change_stage(
        &self,
        tenant_id: Uuid,
        kind: EntityKind,
        entity_id: Uuid,
        new_stage: &str,
        actor: Option<&str>,
    ) -> Result<BoardItem, GateError> {
        let stage: PipelineStage = new_stage.parse().map_err(GateError::InvalidArgument)?;
        let now = Utc::now();

        let (from_stage, item) = match kind {
            EntityKind::Intake => {
                let mut intake = self
                    .db
                    .get_intake(tenant_id, entity_id)
                    .await?
                    .ok_or_else(|| GateError::not_found(kind.entity_name(), entity_id))?;
                let from = intake.pipeline_stage.clone();
                intake.pipeline_stage = Some(stage.as_str().to_string());
                let mut item = intake_item(&intake, now);
                item.pipeline_stage = stage;
                item.next_action = stage.next_action().to_string();
                (from, item)
            }
            EntityKind::Matter => {
                let mut matter = self
                    .db
                    .get_matter(tenant_id, entity_id)
                    .await?
                    .ok_or_else(|| GateError::not_found(kind.entity_name(), entity_id))?;
                let from = matter.pipeline_stage.clone();
                matter.pipeline_stage = Some(stage.as_str().to_string());
                let intake = match matter.intake_id {
                    Some(id) => self.db.get_intake(tenant_id, id).await?,
                    None => None,
                };
                let mut item = matter_item(&matter, intake.as_ref(), now);
                item.pipeline_stage = stage;
                item.next_action = stage.next_action().to_string();
                (from, item)
            }
        };

        let from_stage = from_stage.unwrap_or_else(|| kind.default_stage().as_str().to_string());
        let changed = AuditEvent::new(
            tenant_id,
            PIPELINE_STAGE_CHANGED,
            json!({
                "entity_type": kind.as_str(),
                "entity_id": entity_id,
                "from_stage": from_stage,
                "to_stage": stage.as_str(),
            }),
        )
        .by(actor);
        let update = match kind {
            EntityKind::Intake => WriteOp::IntakeStage {
                tenant_id,
                id: entity_id,
                stage: stage.as_str(),
            },
            EntityKind::Matter => WriteOp::MatterStage {
                tenant_id,
                id: entity_id,
                stage: stage.as_str(),
            },
        };
        self.db.commit(&[update, WriteOp::Event(&changed)]).await?;

        info!(
            entity_type = kind.as_str(),
            entity_id = %entity_id,
            from = %from_stage,
            to = %stage,
            "Pipeline stage changed"
        );
        Ok(item)
    }
}
