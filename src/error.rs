//! Error types for legalops.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Text-generation provider errors.
///
/// These never leave the generation layer: callers fall back to the
/// deterministic template generator instead.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} is not configured")]
    NotConfigured { provider: String },

    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by the workflow operations (gate, tracker, runner, drafts).
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The entity does not exist, or belongs to another tenant.
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    /// The entity exists but is not in a state that allows the action.
    #[error("{entity} {id} is {state}, cannot {action}")]
    InvalidState {
        entity: String,
        id: String,
        state: String,
        action: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl GateError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn invalid_state(
        entity: &str,
        id: impl ToString,
        state: impl ToString,
        action: &str,
    ) -> Self {
        Self::InvalidState {
            entity: entity.to_string(),
            id: id.to_string(),
            state: state.to_string(),
            action: action.to_string(),
        }
    }
}
