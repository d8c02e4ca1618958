use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::PromptMessage;
use crate::config::Config;

const CLIENT_TITLE: &str = "murmur";

/// One OpenAI-compatible `chat/completions` endpoint. OpenRouter and OpenAI
/// differ only in base URL, credentials, and the attribution headers
/// OpenRouter wants.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint<'a> {
    pub base_url: &'a str,
    pub api_key: &'a str,
    pub model: &'a str,
    pub referer: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CompletionsRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn to_wire_messages(messages: &[PromptMessage]) -> Vec<WireMessage> {
    messages
        .iter()
        .map(|msg| WireMessage {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        })
        .collect()
}

pub(super) async fn chat_completions(
    client: &Client,
    cfg: &Config,
    endpoint: &Endpoint<'_>,
    messages: &[PromptMessage],
) -> Result<String> {
    let api_url = completions_url(endpoint.base_url);
    let body = CompletionsRequest {
        model: endpoint.model.to_string(),
        messages: to_wire_messages(messages),
        max_tokens: cfg.max_tokens,
        temperature: cfg.temperature,
    };
    debug!(
        api_url = %api_url,
        model = %endpoint.model,
        message_count = messages.len(),
        "sending chat completions request"
    );

    let mut request = client
        .post(&api_url)
        .bearer_auth(endpoint.api_key)
        .json(&body)
        .timeout(Duration::from_secs(cfg.request_timeout_secs));
    if let Some(referer) = endpoint.referer {
        request = request
            .header("HTTP-Referer", referer)
            .header("X-Title", CLIENT_TITLE);
    }

    let response = request
        .send()
        .await
        .with_context(|| format!("Failed to call chat completions API at '{api_url}'"))?;

    let status = response.status();
    let raw = response
        .text()
        .await
        .context("Failed to read chat completions response body")?;

    let parsed: CompletionsResponse = match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(_) if !status.is_success() => {
            warn!(api_url = %api_url, status = %status, "chat completions returned non-success status");
            return Err(anyhow!(
                "Chat completions request failed with status {}: {}",
                status,
                raw
            ));
        }
        Err(err) => {
            return Err(err).context("Failed to parse chat completions response");
        }
    };

    if let Some(error) = parsed.error {
        warn!(api_url = %api_url, "chat completions API reported an error");
        return Err(anyhow!("chat completions API error: {}", error.message));
    }

    let content = parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("no choices in chat completions response"))?;
    debug!(response_len = content.len(), "received chat completions response");
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::{CompletionsRequest, CompletionsResponse, WireMessage, completions_url};

    #[test]
    fn completions_url_trims_trailing_slash() {
        assert_eq!(
            completions_url("https://openrouter.ai/api/v1/"),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn request_serializes_sampling_parameters() {
        let body = CompletionsRequest {
            model: "gpt-4o".to_string(),
            messages: vec![WireMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            max_tokens: 64,
            temperature: 0.5,
        };
        let json = serde_json::to_string(&body).expect("request should serialize");
        assert!(json.contains(r#""model":"gpt-4o""#));
        assert!(json.contains(r#""max_tokens":64"#));
        assert!(json.contains(r#""temperature":0.5"#));
        assert!(json.contains(r#""role":"user""#));
    }

    #[test]
    fn response_parses_first_choice_content() {
        let raw = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"pong"},"finish_reason":"stop"}]}"#;
        let parsed: CompletionsResponse =
            serde_json::from_str(raw).expect("response should parse");
        assert!(parsed.error.is_none());
        assert_eq!(parsed.choices[0].message.content, "pong");
    }

    #[test]
    fn response_parses_error_envelope_without_choices() {
        let raw = r#"{"error":{"message":"invalid api key","type":"auth","code":"401"}}"#;
        let parsed: CompletionsResponse =
            serde_json::from_str(raw).expect("response should parse");
        assert!(parsed.choices.is_empty());
        assert_eq!(parsed.error.expect("error should be set").message, "invalid api key");
    }
}
