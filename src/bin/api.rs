use std::sync::Arc;

use farm_advisory_orchestrator::api::{start_server, ApiState};
use farm_advisory_orchestrator::config::Settings;
use farm_advisory_orchestrator::context::{ContextStore, PgContextStore, StaticContextStore};
use farm_advisory_orchestrator::db::{ConversationSink, Database, MemoryConversationSink};
use farm_advisory_orchestrator::fallback::LlmFallback;
use farm_advisory_orchestrator::orchestrator::Orchestrator;
use farm_advisory_orchestrator::voice::VoiceService;
use farm_advisory_orchestrator::ws::{ConnectionRegistry, WsState};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    dotenv::dotenv().ok();
    let settings = Settings::from_env();

    info!("🚀 Farm Advisory Orchestrator - API Server");
    info!("📍 Port: {}", settings.port);
    if !settings.has_openai_key() {
        warn!("OPENAI_API_KEY not set; conversational fallback and voice are degraded");
    }

    // The database is optional: schema bootstrap failure keeps the chat
    // path alive on the static profile and an in-memory sink.
    let database = match Database::connect_lazy(&settings.database_url) {
        Ok(db) => {
            let db = Arc::new(db);
            match db.ensure_schema().await {
                Ok(()) => Some(db),
                Err(error) => {
                    warn!(%error, "database unreachable, continuing without persistence");
                    None
                }
            }
        }
        Err(error) => {
            warn!(%error, "invalid database configuration, continuing without persistence");
            None
        }
    };

    let context_store: Arc<dyn ContextStore> = match &database {
        Some(db) => Arc::new(PgContextStore::new(db.clone())),
        None => Arc::new(StaticContextStore::new()),
    };
    let sink: Arc<dyn ConversationSink> = match &database {
        Some(db) => db.clone(),
        None => Arc::new(MemoryConversationSink::new()),
    };

    let orchestrator = Arc::new(Orchestrator::new(
        LlmFallback::new(&settings),
        context_store,
        sink,
    ));

    // Advisor tables must load; serving with a partial roster is not an
    // option.
    orchestrator.initialize().await?;
    info!("✅ All advisors initialized");

    let state = ApiState {
        orchestrator: orchestrator.clone(),
        voice: Arc::new(VoiceService::new(&settings)),
        db: database,
    };

    let ws_state = WsState {
        orchestrator,
        registry: Arc::new(ConnectionRegistry::new()),
    };

    start_server(state, ws_state, settings.port).await?;

    Ok(())
}
