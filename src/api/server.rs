use axum::{
    routing::{get, post},
    Router,
};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::api::handlers::{
    create_question_handler, get_question_handler, get_results_handler, leaderboard_handler,
    list_questions_handler, participant_total_handler, submit_estimate_handler,
};
use crate::engine::{Engine, StoppingRule};
use crate::store::memory::MemoryStore;
use crate::store::postgres::PgStore;
use crate::store::QuestionStore;

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().json().with_target(false))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn,tower=warn")),
        )
        .init();
}

/// Runtime configuration, environment-driven.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: Option<String>,
    pub port: u16,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").ok(),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(3000),
        }
    }
}

/// Assemble the router around an engine. Kept separate from the env wiring
/// so tests can drive the exact production routes over a memory store.
pub fn build_router(engine: Engine) -> Router {
    Router::new()
        .route(
            "/questions",
            post(create_question_handler).get(list_questions_handler),
        )
        .route("/questions/{question_id}", get(get_question_handler))
        .route(
            "/questions/{question_id}/estimates",
            post(submit_estimate_handler),
        )
        .route("/questions/{question_id}/results", get(get_results_handler))
        .route(
            "/participants/{participant_id}/total",
            get(participant_total_handler),
        )
        .route("/leaderboard", get(leaderboard_handler))
        .route("/health", get(health_check))
        .with_state(engine)
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> &'static str {
    "OK"
}

pub async fn create_app(config: &EngineConfig) -> anyhow::Result<Router> {
    let store: Arc<dyn QuestionStore> = match &config.database_url {
        Some(url) => {
            info!("Using Postgres store");
            Arc::new(PgStore::connect(url).await?)
        }
        None => {
            info!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let engine = Engine::new(store, Arc::new(StoppingRule::new()));
    Ok(build_router(engine))
}

pub async fn run_server() -> anyhow::Result<()> {
    init_tracing();

    // Load .env if present; real deployments set the environment directly.
    dotenv::dotenv().ok();

    info!("Starting crowdcast engine server");

    let config = EngineConfig::from_env();
    let app = create_app(&config).await?;

    let shutdown = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C signal handler");
        info!("Shutting down gracefully...");
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
