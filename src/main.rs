use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use chat_stream::agent::{AnswerProducer, OllamaAgentService};
use chat_stream::config::AppConfig;
use chat_stream::service::chat_service::ChatService;
use chat_stream::store::{MemoryThreadStore, PgThreadStore, ThreadStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Initialise tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_stream=debug,tower_http=debug".into()),
        )
        .init();

    let config = AppConfig::from_env();

    // ── Thread store ──────────────────────────────────────────────────────────
    let store: Arc<dyn ThreadStore> = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            info!("Database connection established and migrations applied");
            Arc::new(PgThreadStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set; threads are kept in memory and lost on restart");
            Arc::new(MemoryThreadStore::new())
        }
    };

    // ── Answer producer ───────────────────────────────────────────────────────
    let agent: Option<Arc<dyn AnswerProducer>> = match &config.agent {
        Some(agent_config) => {
            info!("Using Ollama at {} with model {}", agent_config.base_url, agent_config.model);
            Some(Arc::new(OllamaAgentService::new(agent_config)?))
        }
        None => None,
    };

    let chat_service =
        ChatService::new(store, agent).with_max_message_length(config.max_message_length);

    // ── Listen ────────────────────────────────────────────────────────────────
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}/");

    axum::serve(listener, chat_stream::app(chat_service)).await?;
    Ok(())
}
