mod openai_compat;

pub use openai_compat::Endpoint;

use anyhow::{Result, anyhow};
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

impl PromptRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message of the upstream prompt, system turns included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: content.into(),
        }
    }
}

pub fn is_configured(cfg: &Config) -> bool {
    !cfg.openrouter_api_key.is_empty() || !cfg.openai_api_key.is_empty()
}

pub fn label(cfg: &Config) -> String {
    if !cfg.openrouter_api_key.is_empty() {
        format!("OpenRouter ({})", cfg.openrouter_model)
    } else if !cfg.openai_api_key.is_empty() {
        format!("OpenAI ({})", cfg.openai_model)
    } else {
        "not configured".to_string()
    }
}

fn openrouter_endpoint(cfg: &Config) -> Endpoint<'_> {
    Endpoint {
        base_url: &cfg.openrouter_base_url,
        api_key: &cfg.openrouter_api_key,
        model: &cfg.openrouter_model,
        referer: Some("https://murmur.local"),
    }
}

fn openai_endpoint(cfg: &Config) -> Endpoint<'_> {
    Endpoint {
        base_url: &cfg.openai_base_url,
        api_key: &cfg.openai_api_key,
        model: &cfg.openai_model,
        referer: None,
    }
}

/// Runs the prompt against OpenRouter when its key is set, falling back to
/// OpenAI on failure if that key exists too. The fallback swallows the first
/// error only when a second attempt is possible.
pub async fn chat(client: &Client, cfg: &Config, messages: &[PromptMessage]) -> Result<String> {
    if !cfg.openrouter_api_key.is_empty() {
        debug!(
            provider = "openrouter",
            model = %cfg.openrouter_model,
            message_count = messages.len(),
            "dispatching chat completion request"
        );
        match openai_compat::chat_completions(client, cfg, &openrouter_endpoint(cfg), messages)
            .await
        {
            Ok(content) => return Ok(content),
            Err(err) if !cfg.openai_api_key.is_empty() => {
                warn!(error = %format!("{err:#}"), "openrouter request failed, falling back to openai");
            }
            Err(err) => return Err(err),
        }
    }

    if !cfg.openai_api_key.is_empty() {
        debug!(
            provider = "openai",
            model = %cfg.openai_model,
            message_count = messages.len(),
            "dispatching chat completion request"
        );
        return openai_compat::chat_completions(client, cfg, &openai_endpoint(cfg), messages)
            .await;
    }

    warn!("no AI provider configured");
    Err(anyhow!(
        "no AI provider configured; set OPENROUTER_API_KEY or OPENAI_API_KEY"
    ))
}

#[cfg(test)]
mod tests {
    use super::{PromptMessage, PromptRole, is_configured, label};
    use crate::config::Config;

    fn test_config() -> Config {
        Config {
            server_url: "http://localhost:8080".to_string(),
            request_timeout_secs: 1,
            host: "127.0.0.1".to_string(),
            port: 8080,
            openrouter_api_key: String::new(),
            openrouter_model: "anthropic/claude-3.5-sonnet".to_string(),
            openrouter_base_url: "https://openrouter.ai/api/v1".to_string(),
            openai_api_key: String::new(),
            openai_model: "gpt-4o".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            max_tokens: 100,
            temperature: 0.3,
            system_prompt: "You are a helpful assistant.".to_string(),
        }
    }

    #[test]
    fn label_prefers_openrouter_when_both_keys_are_set() {
        let mut cfg = test_config();
        cfg.openrouter_api_key = "or-key".to_string();
        cfg.openai_api_key = "oa-key".to_string();
        assert!(is_configured(&cfg));
        assert_eq!(label(&cfg), "OpenRouter (anthropic/claude-3.5-sonnet)");
    }

    #[test]
    fn label_reports_openai_or_nothing() {
        let mut cfg = test_config();
        cfg.openai_api_key = "oa-key".to_string();
        cfg.openai_model = "gpt-4o-mini".to_string();
        assert_eq!(label(&cfg), "OpenAI (gpt-4o-mini)");

        let cfg = test_config();
        assert!(!is_configured(&cfg));
        assert_eq!(label(&cfg), "not configured");
    }

    #[test]
    fn prompt_message_constructors_set_roles() {
        assert_eq!(PromptMessage::system("s").role, PromptRole::System);
        assert_eq!(PromptMessage::user("u").role, PromptRole::User);
        assert_eq!(PromptMessage::assistant("a").role, PromptRole::Assistant);
        assert_eq!(PromptRole::System.as_str(), "system");
    }
}
