use std::env;
use std::error::Error;
use std::fmt;

const DEFAULT_SERVER_URL: &str = "http://localhost:8080";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_OPENROUTER_MODEL: &str = "anthropic/claude-3.5-sonnet";
const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MAX_TOKENS: u32 = 4000;
const DEFAULT_TEMPERATURE: f32 = 0.3;
const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Keep answers short and to the point.";

/// Startup validation failure naming the setting that must be fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationError {
    setting: &'static str,
    reason: String,
}

impl ConfigurationError {
    fn new(setting: &'static str, reason: impl Into<String>) -> Self {
        Self {
            setting,
            reason: reason.into(),
        }
    }

    pub fn setting(&self) -> &'static str {
        self.setting
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid configuration for {}: {}",
            self.setting, self.reason
        )
    }
}

impl Error for ConfigurationError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_url: String,
    pub request_timeout_secs: u64,
    pub host: String,
    pub port: u16,
    pub openrouter_api_key: String,
    pub openrouter_model: String,
    pub openrouter_base_url: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system_prompt: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_env_with(|key| env::var(key).ok())
    }

    fn from_env_with(mut get_var: impl FnMut(&str) -> Option<String>) -> Self {
        Self {
            server_url: get_var("SERVER_URL").unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            request_timeout_secs: parse_positive_u64(
                get_var("REQUEST_TIMEOUT_SECS").as_deref(),
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
            host: get_var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_port(get_var("PORT").as_deref()),
            openrouter_api_key: get_var("OPENROUTER_API_KEY").unwrap_or_default(),
            openrouter_model: get_var("OPENROUTER_MODEL")
                .unwrap_or_else(|| DEFAULT_OPENROUTER_MODEL.to_string()),
            openrouter_base_url: get_var("OPENROUTER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENROUTER_BASE_URL.to_string()),
            openai_api_key: get_var("OPENAI_API_KEY").unwrap_or_default(),
            openai_model: get_var("OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_base_url: get_var("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            max_tokens: parse_positive_u32(get_var("MAX_TOKENS").as_deref(), DEFAULT_MAX_TOKENS),
            temperature: parse_temperature(get_var("TEMPERATURE").as_deref()),
            system_prompt: get_var("SYSTEM_PROMPT")
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }

    /// Required before running the chat client or one-shot mode.
    pub fn validate_client(&self) -> Result<(), ConfigurationError> {
        let url = self.server_url.trim();
        if url.is_empty() {
            return Err(ConfigurationError::new(
                "SERVER_URL",
                "must not be empty; point it at the chat server",
            ));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigurationError::new(
                "SERVER_URL",
                format!("'{url}' is not an http(s) URL"),
            ));
        }
        Ok(())
    }

    /// Required before running `serve` mode.
    pub fn validate_server(&self) -> Result<(), ConfigurationError> {
        if self.host.trim().is_empty() {
            return Err(ConfigurationError::new("HOST", "must not be empty"));
        }
        if self.openrouter_api_key.is_empty() && self.openai_api_key.is_empty() {
            return Err(ConfigurationError::new(
                "OPENROUTER_API_KEY",
                "no AI provider configured; set OPENROUTER_API_KEY or OPENAI_API_KEY",
            ));
        }
        Ok(())
    }
}

/// Keys appear in startup logs only in this form.
pub fn mask_key(key: &str) -> String {
    if key.is_empty() {
        return "unset".to_string();
    }
    if key.len() <= 8 {
        return "***".to_string();
    }
    format!("{}...{}", &key[..4], &key[key.len() - 4..])
}

fn parse_positive_u64(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn parse_positive_u32(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn parse_port(raw: Option<&str>) -> u16 {
    raw.and_then(|value| value.trim().parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_PORT)
}

fn parse_temperature(raw: Option<&str>) -> f32 {
    raw.and_then(|value| value.trim().parse::<f32>().ok())
        .filter(|value| value.is_finite() && *value >= 0.0)
        .unwrap_or(DEFAULT_TEMPERATURE)
}
