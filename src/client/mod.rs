mod http_errors;

pub use http_errors::HttpError;

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::conversation::{ConnectivityStatus, Turn};
use http_errors::chat_server_request_error;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    history: &'a [Turn],
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    response: String,
}

fn status_url(base_url: &str) -> String {
    format!("{}/api/status", base_url.trim_end_matches('/'))
}

fn chat_url(base_url: &str) -> String {
    format!("{}/api/chat", base_url.trim_end_matches('/'))
}

/// Any non-success status or decode failure is an error; the caller turns
/// every failure into the same generic indicator.
pub async fn fetch_status(client: &Client, cfg: &Config) -> Result<ConnectivityStatus> {
    let api_url = status_url(&cfg.server_url);
    debug!(api_url = %api_url, "probing chat server status");

    let response = client
        .get(&api_url)
        .timeout(Duration::from_secs(cfg.request_timeout_secs))
        .send()
        .await
        .map_err(|err| {
            warn!(api_url = %api_url, error = %err, "status probe failed");
            chat_server_request_error(err, &api_url, cfg.request_timeout_secs)
        })?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Status probe failed with status {}",
            response.status()
        ));
    }

    let parsed: ConnectivityStatus = response
        .json()
        .await
        .context("Failed to parse status response")?;
    debug!(
        available = parsed.available,
        provider = parsed.provider.as_deref().unwrap_or(""),
        "received status response"
    );
    Ok(parsed)
}

/// Posts one message plus the prior history. The turn being sent is absent
/// from `history`; the server appends it upstream (both halves rely on this).
pub async fn send_chat(
    client: &Client,
    cfg: &Config,
    message: &str,
    history: &[Turn],
) -> Result<String> {
    let api_url = chat_url(&cfg.server_url);
    let body = ChatRequest { message, history };
    debug!(
        api_url = %api_url,
        history_len = history.len(),
        "sending chat request"
    );

    let response = client
        .post(&api_url)
        .json(&body)
        .timeout(Duration::from_secs(cfg.request_timeout_secs))
        .send()
        .await
        .map_err(|err| {
            warn!(api_url = %api_url, error = %err, "chat request failed");
            chat_server_request_error(err, &api_url, cfg.request_timeout_secs)
        })?;

    let status = response.status();
    if !status.is_success() {
        warn!(api_url = %api_url, status = %status, "chat server returned non-success status");
        return Err(HttpError::new(status.as_u16()).into());
    }

    let parsed: ChatReply = response
        .json()
        .await
        .context("Failed to parse chat response")?;
    debug!(response_len = parsed.response.len(), "received chat reply");
    Ok(parsed.response)
}
