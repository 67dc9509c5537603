//! Intake, matter and document endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::caller::{Caller, parse_id};
use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::error::GateError;
use crate::model::{Document, Intake, Matter};
use crate::pipeline::PipelineStage;
use crate::templates::matter_completeness;

/// Initial stages are checked against the same vocabulary the tracker uses.
fn initial_stage(stage: Option<String>) -> ApiResult<Option<String>> {
    match stage {
        Some(s) => {
            let parsed: PipelineStage = s.parse().map_err(GateError::InvalidArgument)?;
            Ok(Some(parsed.as_str().to_string()))
        }
        None => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateIntake {
    #[serde(default)]
    pub payload: Value,
    pub pipeline_stage: Option<String>,
}

pub async fn create_intake(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<CreateIntake>,
) -> ApiResult<impl IntoResponse> {
    if !body.payload.is_object() {
        return Err(ApiError::bad_request("payload must be a JSON object"));
    }
    let mut intake = Intake::new(caller.tenant_id, body.payload);
    intake.pipeline_stage = initial_stage(body.pipeline_stage)?;
    state.db.insert_intake(&intake).await?;
    info!(intake_id = %intake.id, "Intake created");
    Ok((StatusCode::CREATED, Json(intake)))
}

#[derive(Debug, Deserialize)]
pub struct CreateMatter {
    pub matter_type: String,
    pub intake_id: Option<Uuid>,
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub urgency_score: u8,
    pub pipeline_stage: Option<String>,
}

pub async fn create_matter(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<CreateMatter>,
) -> ApiResult<impl IntoResponse> {
    if body.matter_type.trim().is_empty() {
        return Err(ApiError::bad_request("matter_type is required"));
    }
    let mut matter = Matter::new(caller.tenant_id, body.matter_type.trim())
        .with_urgency(body.urgency_score);
    matter.pipeline_stage = initial_stage(body.pipeline_stage)?;
    if let Some(intake_id) = body.intake_id {
        state
            .db
            .get_intake(caller.tenant_id, intake_id)
            .await?
            .ok_or_else(|| GateError::not_found("Intake", intake_id))?;
        matter = matter.with_intake(intake_id);
    }
    if let Some(jurisdiction) = body.jurisdiction {
        matter = matter.with_jurisdiction(jurisdiction);
    }
    state.db.insert_matter(&matter).await?;
    info!(matter_id = %matter.id, matter_type = %matter.matter_type, "Matter created");
    Ok((StatusCode::CREATED, Json(matter)))
}

#[derive(Debug, Deserialize)]
pub struct AddDocument {
    pub kind: String,
    pub filename: String,
}

pub async fn add_document(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(body): Json<AddDocument>,
) -> ApiResult<impl IntoResponse> {
    let matter_id = parse_id(&id, "matter")?;
    state
        .db
        .get_matter(caller.tenant_id, matter_id)
        .await?
        .ok_or_else(|| GateError::not_found("Matter", matter_id))?;
    if body.kind.trim().is_empty() {
        return Err(ApiError::bad_request("kind is required"));
    }
    let document = Document::new(caller.tenant_id, matter_id, body.kind.trim(), body.filename);
    state.db.insert_document(&document).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn completeness(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let matter_id = parse_id(&id, "matter")?;
    let report =
        matter_completeness(state.db.as_ref(), &state.templates, caller.tenant_id, matter_id)
            .await?;
    Ok(Json(report))
}
