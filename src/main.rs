use std::sync::Arc;

use anyhow::Context;

use legalops::agents::AgentRegistry;
use legalops::api::{self, AppState};
use legalops::config::AppConfig;
use legalops::llm::create_generator;
use legalops::routing::RuleStore;
use legalops::store::{Database, LibSqlBackend};
use legalops::templates::TemplateRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;

    eprintln!("⚖️  legalops v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api", config.port);

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("opening database at {}", config.db_path.display()))?,
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Templates, agents, routing rules ─────────────────────────────────
    let templates = Arc::new(TemplateRegistry::builtin()?);
    let agents = match &config.agent_definitions_dir {
        Some(dir) => AgentRegistry::with_dir(dir)?,
        None => AgentRegistry::builtin()?,
    };
    eprintln!("   Agents: {}", agents.names().join(", "));
    let rules = match &config.routing_rules_path {
        Some(path) => RuleStore::from_json_file(path)?,
        None => RuleStore::default(),
    };
    eprintln!("   Routing rules: {}", rules.len());

    // ── Text generation ──────────────────────────────────────────────────
    let generator = create_generator(&config.llm, templates.clone());
    eprintln!("   Generator: {}", generator.primary_name().unwrap_or("templates"));

    // ── HTTP ─────────────────────────────────────────────────────────────
    let state = AppState::new(
        db,
        templates,
        Arc::new(agents),
        Arc::new(rules),
        generator,
        config.cadence.clone(),
    );
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("binding port {}", config.port))?;
    tracing::info!(port = config.port, "legalops API server started");
    axum::serve(listener, app).await?;

    Ok(())
}
