mod handlers;
mod llm;
mod mentor;
mod metrics;
mod pair;
mod review;
mod routes;

use anyhow::Context;
use aura_common::config::Config;
use aura_resilience::{CooldownGuard, ResponseCache, RetryPolicy};
use aura_sandbox::{CodeExecutor, LanguageRegistry};
use axum::Router;
use llm::{GeminiClient, LlmGateway, TextGenerator};
use mentor::MentorAgent;
use pair::PairProgrammer;
use review::Reviewer;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub struct AppState {
    pub config: Config,
    pub executor: CodeExecutor,
    pub mentor: MentorAgent,
    pub reviewer: Reviewer,
    pub pair: PairProgrammer,
    pub cooldown: CooldownGuard,
}

impl AppState {
    /// One cache and one retry policy shared by every AI route
    pub fn new(config: Config, registry: LanguageRegistry, generator: Arc<dyn TextGenerator>) -> Self {
        let llm = LlmGateway::new(
            generator,
            Arc::new(ResponseCache::new()),
            RetryPolicy::default(),
            config.gemini_model.clone(),
        );

        Self {
            executor: CodeExecutor::new(Arc::new(registry)),
            mentor: MentorAgent::new(llm.clone()),
            reviewer: Reviewer::new(llm.clone()),
            pair: PairProgrammer::new(llm),
            cooldown: CooldownGuard::new(),
            config,
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Aura API booting...");

    let config = Config::from_env();
    let registry = LanguageRegistry::load_or_builtin(&config.languages_path)
        .context("Failed to load language configuration")?;

    if config.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; AI routes will return fallback responses");
    }
    info!(model = %config.gemini_model, "LLM configured");

    let generator: Arc<dyn TextGenerator> = Arc::new(GeminiClient::new(config.gemini_api_key.clone()));
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, registry, generator));

    info!(languages = ?state.executor.supported_languages(), "Sandbox ready");

    // Build router
    let app = Router::new().merge(routes::routes()).with_state(state);

    // Start server
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    info!("HTTP server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Aura API shut down");
    Ok(())
}
