//! HTTP surface: a thin axum layer over the workflow services.
//!
//! Every `/api` handler reads the tenant from `x-tenant-id`; see [`Caller`].

mod agents;
mod approvals;
mod caller;
mod cadence;
mod error;
mod leads;
mod messages;
mod pipeline;
mod records;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::agents::{AgentOutputBuilder, AgentRegistry, AgentRunner, KeywordUrgencyClassifier};
use crate::approvals::ApprovalGate;
use crate::cadence::{DocChaser, SlaChecker, WhatsappReminders};
use crate::config::CadenceConfig;
use crate::llm::FallbackGenerator;
use crate::messages::MessageService;
use crate::pipeline::StageTracker;
use crate::policy::PolicyEngine;
use crate::prepkit::PrepKitBuilder;
use crate::routing::{LeadRouter, RuleStore};
use crate::store::Database;
use crate::templates::TemplateRegistry;

pub use caller::{Caller, TENANT_HEADER, USER_HEADER};
pub use error::{ApiError, ApiResult};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub templates: Arc<TemplateRegistry>,
    pub agents: Arc<AgentRegistry>,
    pub gate: Arc<ApprovalGate>,
    pub tracker: Arc<StageTracker>,
    pub runner: Arc<AgentRunner>,
    pub messages: Arc<MessageService>,
    pub sla: Arc<SlaChecker>,
    pub doc_chaser: Arc<DocChaser>,
    pub whatsapp: Arc<WhatsappReminders>,
    pub prepkit: Arc<PrepKitBuilder>,
    pub leads: Arc<LeadRouter>,
}

impl AppState {
    /// Wire every service around one database and generator stack.
    pub fn new(
        db: Arc<dyn Database>,
        templates: Arc<TemplateRegistry>,
        agents: Arc<AgentRegistry>,
        rules: Arc<RuleStore>,
        generator: FallbackGenerator,
        cadence: CadenceConfig,
    ) -> Self {
        let policy = Arc::new(PolicyEngine::new());
        let generator = Arc::new(generator);
        let gate = Arc::new(ApprovalGate::new(db.clone()));
        let builder = Arc::new(AgentOutputBuilder::new(
            agents.clone(),
            policy.clone(),
            Arc::new(KeywordUrgencyClassifier::default()),
        ));

        Self {
            tracker: Arc::new(StageTracker::new(db.clone())),
            runner: Arc::new(AgentRunner::new(
                db.clone(),
                builder,
                generator.clone(),
                gate.clone(),
            )),
            messages: Arc::new(MessageService::new(db.clone(), gate.clone())),
            sla: Arc::new(SlaChecker::new(db.clone(), cadence.sla_hours)),
            doc_chaser: Arc::new(DocChaser::new(
                db.clone(),
                templates.clone(),
                gate.clone(),
                cadence.clone(),
            )),
            whatsapp: Arc::new(WhatsappReminders::new(
                db.clone(),
                templates.clone(),
                gate.clone(),
                cadence,
            )),
            prepkit: Arc::new(PrepKitBuilder::new(generator, policy, templates.clone())),
            leads: Arc::new(LeadRouter::new(rules, db.clone())),
            gate,
            agents,
            templates,
            db,
        }
    }
}

/// Build the full router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // ── Intakes, matters, documents ──
        .route("/api/intakes", post(records::create_intake))
        .route("/api/matters", post(records::create_matter))
        .route("/api/matters/{id}/documents", post(records::add_document))
        .route("/api/matters/{id}/completeness", get(records::completeness))
        // ── Approvals ──
        .route("/api/approvals", get(approvals::list))
        .route("/api/approvals/{id}/approve", post(approvals::approve))
        .route("/api/approvals/{id}/reject", post(approvals::reject))
        // ── Pipeline ──
        .route("/api/pipeline", get(pipeline::board))
        .route("/api/pipeline/{entity}/{id}/stage", patch(pipeline::change_stage))
        // ── Agents ──
        .route("/api/agents", get(agents::list))
        .route("/api/agents/run", post(agents::run))
        .route("/api/prepkit", post(agents::prepkit))
        // ── Messages ──
        .route("/api/messages", get(messages::list))
        .route("/api/messages/draft", post(messages::create_draft))
        .route("/api/messages/{id}/send", post(messages::send))
        // ── Tasks and cadence ──
        .route("/api/tasks", get(cadence::list_tasks))
        .route("/api/cadence/sla", post(cadence::sla))
        .route("/api/cadence/doc-reminders", post(cadence::doc_reminders))
        .route("/api/cadence/whatsapp-reminders", post(cadence::whatsapp_reminders))
        // ── Leads ──
        .route("/api/leads/route", post(leads::route))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
