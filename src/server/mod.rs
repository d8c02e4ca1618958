use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::conversation::{Role, Turn};
use crate::provider::{self, PromptMessage};

const STATUS_PROBE_TIMEOUT_SECS: u64 = 5;
const STATUS_PROBE_MESSAGE: &str = "test";

pub struct AppState {
    pub http: Client,
    pub cfg: Config,
}

#[derive(Debug, Deserialize)]
struct ChatApiRequest {
    message: String,
    #[serde(default)]
    history: Vec<Turn>,
    #[serde(default, rename = "systemPrompt")]
    system_prompt: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatApiReply {
    response: String,
}

#[derive(Debug, Serialize)]
struct StatusApiReply {
    configured: bool,
    available: bool,
    provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/api/status", get(handle_status))
        .with_state(state)
}

pub async fn run(client: Client, cfg: Config) -> Result<()> {
    let addr = format!("{}:{}", cfg.host, cfg.port);
    let provider_label = provider::label(&cfg);
    let state = Arc::new(AppState { http: client, cfg });

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind chat server to {addr}"))?;
    info!(
        addr = %listener.local_addr().context("Failed to read bound address")?,
        provider = %provider_label,
        "chat server listening"
    );

    axum::serve(listener, router(state))
        .await
        .context("chat server terminated unexpectedly")
}

/// The server, not the client, appends the in-flight message: request
/// bodies carry only the turns of completed exchanges.
fn build_prompt(cfg: &Config, request: &ChatApiRequest) -> Vec<PromptMessage> {
    let system_prompt = request
        .system_prompt
        .as_deref()
        .map(str::trim)
        .filter(|prompt| !prompt.is_empty())
        .unwrap_or(&cfg.system_prompt);

    let mut messages = Vec::with_capacity(request.history.len() + 2);
    messages.push(PromptMessage::system(system_prompt));
    messages.extend(request.history.iter().map(|turn| match turn.role {
        Role::User => PromptMessage::user(turn.content.clone()),
        Role::Assistant => PromptMessage::assistant(turn.content.clone()),
    }));
    messages.push(PromptMessage::user(request.message.clone()));
    messages
}

async fn handle_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatApiRequest>,
) -> Result<Json<ChatApiReply>, (StatusCode, String)> {
    debug!(history_len = request.history.len(), "handling chat request");
    let prompt = build_prompt(&state.cfg, &request);

    match provider::chat(&state.http, &state.cfg, &prompt).await {
        Ok(response) => Ok(Json(ChatApiReply { response })),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "provider call failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("AI error: {err:#}"),
            ))
        }
    }
}

async fn handle_status(State(state): State<Arc<AppState>>) -> Json<StatusApiReply> {
    let configured = provider::is_configured(&state.cfg);
    let provider_label = provider::label(&state.cfg);

    if !configured {
        return Json(StatusApiReply {
            configured: false,
            available: false,
            provider: provider_label,
            error: Some("no AI provider configured".to_string()),
        });
    }

    let probe = [PromptMessage::user(STATUS_PROBE_MESSAGE)];
    let outcome = timeout(
        Duration::from_secs(STATUS_PROBE_TIMEOUT_SECS),
        provider::chat(&state.http, &state.cfg, &probe),
    )
    .await;

    let reply = match outcome {
        Ok(Ok(_)) => StatusApiReply {
            configured: true,
            available: true,
            provider: provider_label,
            error: None,
        },
        Ok(Err(err)) => {
            warn!(error = %format!("{err:#}"), "status probe failed");
            StatusApiReply {
                configured: true,
                available: false,
                provider: provider_label,
                error: Some(format!("{err:#}")),
            }
        }
        Err(_) => {
            warn!(
                probe_timeout_secs = STATUS_PROBE_TIMEOUT_SECS,
                "status probe timed out"
            );
            StatusApiReply {
                configured: true,
                available: false,
                provider: provider_label,
                error: Some(format!(
                    "status probe timed out after {STATUS_PROBE_TIMEOUT_SECS}s"
                )),
            }
        }
    };
    Json(reply)
}
