use tracing::warn;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MODEL: &str = "llama3.2";
/// Longest accepted user message, in bytes.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 8000;

/// Settings for the answer producer. Absent when no endpoint is configured.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub base_url: String,
    pub model: String,
    pub agent_id: String,
}

/// Process configuration, read once at start-up.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub agent: Option<AgentConfig>,
    pub max_message_length: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = non_empty("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let agent = match non_empty("OLLAMA_API_BASE_URL") {
            Some(base_url) => {
                let model = non_empty("OLLAMA_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
                let agent_id = non_empty("CHAT_AGENT_ID").unwrap_or_else(|| model.clone());
                Some(AgentConfig { base_url, model, agent_id })
            }
            None => {
                warn!("OLLAMA_API_BASE_URL not configured; /api/chat will answer 503");
                None
            }
        };

        Self {
            bind_address: non_empty("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            database_url: non_empty("DATABASE_URL"),
            agent,
            max_message_length: non_empty("MAX_MESSAGE_LENGTH")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_MESSAGE_LENGTH),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
