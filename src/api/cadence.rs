//! Task list and the on-demand cadence checks.

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use super::caller::Caller;
use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::cadence::SlaChecker;

pub async fn list_tasks(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.db.list_tasks(caller.tenant_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SlaQuery {
    pub sla_hours: Option<f64>,
}

pub async fn sla(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<SlaQuery>,
) -> ApiResult<impl IntoResponse> {
    let breaches = match query.sla_hours {
        Some(hours) if !hours.is_finite() || hours < 0.0 => {
            return Err(ApiError::bad_request("sla_hours must be a non-negative number"));
        }
        Some(hours) => {
            SlaChecker::new(state.db.clone(), hours)
                .check(caller.tenant_id)
                .await?
        }
        None => state.sla.check(caller.tenant_id).await?,
    };
    Ok(Json(json!({ "count": breaches.len(), "breaches": breaches })))
}

pub async fn doc_reminders(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<impl IntoResponse> {
    let reminders = state.doc_chaser.check(caller.tenant_id).await?;
    Ok(Json(json!({ "count": reminders.len(), "reminders": reminders })))
}

pub async fn whatsapp_reminders(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<impl IntoResponse> {
    let reminders = state.whatsapp.check(caller.tenant_id).await?;
    Ok(Json(json!({ "count": reminders.len(), "reminders": reminders })))
}
