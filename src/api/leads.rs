use axum::{Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::routing::Lead;

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    /// Generated when absent.
    pub lead_id: Option<Uuid>,
    pub vertical: String,
    #[serde(default)]
    pub contact: Value,
}

/// Leads arrive before any tenant owns them, so no caller header is read.
pub async fn route(
    State(state): State<AppState>,
    Json(body): Json<RouteRequest>,
) -> ApiResult<impl IntoResponse> {
    if body.vertical.trim().is_empty() {
        return Err(ApiError::bad_request("vertical is required"));
    }
    let lead = Lead {
        id: body.lead_id.unwrap_or_else(Uuid::new_v4),
        vertical: body.vertical.trim().to_string(),
        contact: body.contact,
    };
    let decision = state.leads.route(&lead).await?;
    Ok(Json(json!({
        "lead_id": lead.id,
        "routed": decision.is_some(),
        "decision": decision,
    })))
}
