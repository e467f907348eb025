use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_MODEL: &str = "black-forest-labs/FLUX.1-dev";

#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer token for the inference host. Absence is not fatal: requests just fail.
    pub api_token: Option<String>,
    pub api_base: String,
    pub model_id: String,
    pub request_timeout: Duration,
    pub port: u16,
    /// Sessions untouched this long (and not busy) are dropped.
    pub session_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            api_token: non_empty("HF_API_TOKEN"),
            api_base: non_empty("INFERENCE_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model_id: non_empty("INFERENCE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            request_timeout: Duration::from_secs(
                non_empty("INFERENCE_TIMEOUT_SECS").and_then(|v| v.parse().ok()).unwrap_or(120),
            ),
            port: non_empty("PORT").and_then(|v| v.parse().ok()).unwrap_or(8080),
            session_ttl: Duration::from_secs(
                non_empty("SESSION_TTL_SECS").and_then(|v| v.parse().ok()).unwrap_or(1800),
            ),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/models/{}", self.api_base, self.model_id)
    }

    /// Token prefix safe to log.
    pub fn masked_token(&self) -> String {
        match &self.api_token {
            Some(token) => format!("{}...", &token[..token.char_indices().nth(6).map(|(i, _)| i).unwrap_or(token.len())]),
            None => "<unset>".to_string(),
        }
    }
}
