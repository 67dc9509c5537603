//! Approval queue endpoints.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use super::caller::{Caller, parse_id};
use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::model::{ApprovalStatus, Verdict};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let status = match query.status.as_deref() {
        Some(s) => Some(s.parse::<ApprovalStatus>().map_err(ApiError::BadRequest)?),
        None => None,
    };
    let approvals = state.gate.list(caller.tenant_id, status).await?;
    Ok(Json(approvals))
}

#[derive(Debug, Default, Deserialize)]
struct DecideBody {
    notes: Option<String>,
}

/// The body is optional; an empty one means no notes.
fn decide_body(body: &Bytes) -> ApiResult<DecideBody> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(DecideBody::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid body: {e}")))
}

async fn decide(
    state: AppState,
    caller: Caller,
    id: String,
    verdict: Verdict,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let approval_id = parse_id(&id, "approval")?;
    let body = decide_body(&body)?;
    let approval = state
        .gate
        .decide(caller.tenant_id, approval_id, verdict, caller.actor(), body.notes)
        .await?;
    Ok(Json(approval))
}

pub async fn approve(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    decide(state, caller, id, Verdict::Approve, body).await
}

pub async fn reject(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    decide(state, caller, id, Verdict::Reject, body).await
}
