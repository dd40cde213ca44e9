use std::time::Duration;

use crate::scheduler::DEFAULT_PACING_DELAY;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the chat server. `None` is a configuration error surfaced
    /// on the first send.
    pub endpoint: Option<String>,
    pub pacing_delay: Duration,
    /// Ask the server for the streaming protocol.
    pub stream: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { endpoint: None, pacing_delay: DEFAULT_PACING_DELAY, stream: true }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            endpoint: non_empty("CHAT_API_URL"),
            pacing_delay: non_empty("CHAT_PACING_MS")
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.pacing_delay),
            stream: non_empty("CHAT_STREAM")
                .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(defaults.stream),
        }
    }
}
