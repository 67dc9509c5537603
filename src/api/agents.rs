//! Agent runs and prep kits.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use super::caller::Caller;
use super::error::{ApiError, ApiResult};
use super::AppState;

pub async fn list(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.agents.summaries())
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub matter_id: Uuid,
    pub agent_name: String,
    #[serde(default = "empty_object")]
    pub input: Value,
}

fn empty_object() -> Value {
    json!({})
}

pub async fn run(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<RunRequest>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state
        .runner
        .run(
            caller.tenant_id,
            body.matter_id,
            &body.agent_name,
            body.input,
            caller.actor(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[derive(Debug, Deserialize)]
pub struct PrepKitRequest {
    pub case_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "es".to_string()
}

/// Prep kits are not tenant data, so no caller is required.
pub async fn prepkit(
    State(state): State<AppState>,
    Json(body): Json<PrepKitRequest>,
) -> ApiResult<impl IntoResponse> {
    if body.case_type.trim().is_empty() {
        return Err(ApiError::bad_request("case_type is required"));
    }
    let kit = state
        .prepkit
        .build(body.case_type.trim(), &body.description, &body.language)
        .await;
    Ok(Json(kit))
}
