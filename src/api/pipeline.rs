use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;

use super::caller::{Caller, parse_id};
use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::pipeline::EntityKind;

pub async fn board(State(state): State<AppState>, caller: Caller) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.tracker.get_board(caller.tenant_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct StageChange {
    pub stage: String,
}

pub async fn change_stage(
    State(state): State<AppState>,
    caller: Caller,
    Path((entity, id)): Path<(String, String)>,
    Json(body): Json<StageChange>,
) -> ApiResult<impl IntoResponse> {
    let kind: EntityKind = entity.parse().map_err(ApiError::BadRequest)?;
    let entity_id = parse_id(&id, kind.as_str())?;
    let item = state
        .tracker
        .change_stage(caller.tenant_id, kind, entity_id, &body.stage, caller.actor())
        .await?;
    Ok(Json(item))
}
