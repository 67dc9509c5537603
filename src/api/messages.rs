use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use super::caller::{Caller, parse_id};
use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::model::Channel;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub matter_id: Option<Uuid>,
}

pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let drafts = state
        .messages
        .list_drafts(caller.tenant_id, query.matter_id)
        .await?;
    Ok(Json(drafts))
}

#[derive(Debug, Deserialize)]
pub struct CreateDraft {
    pub matter_id: Uuid,
    pub channel: String,
    pub content: String,
}

pub async fn create_draft(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<CreateDraft>,
) -> ApiResult<impl IntoResponse> {
    let channel: Channel = body.channel.parse().map_err(ApiError::BadRequest)?;
    let outcome = state
        .messages
        .create_draft(
            caller.tenant_id,
            body.matter_id,
            channel,
            &body.content,
            caller.actor(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn send(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let draft_id = parse_id(&id, "draft")?;
    let draft = state
        .messages
        .send_draft(caller.tenant_id, draft_id, caller.actor())
        .await?;
    Ok(Json(draft))
}
