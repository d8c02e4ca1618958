use anyhow::anyhow;
use std::error::Error as StdError;
use std::fmt;
use std::io::ErrorKind;

/// Non-success HTTP status from the chat endpoint. Carries the numeric code
/// so the rendered error bubble can surface it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpError {
    status: u16,
}

impl HttpError {
    pub fn new(status: u16) -> Self {
        Self { status }
    }

    pub fn status(&self) -> u16 {
        self.status
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP error: status {}", self.status)
    }
}

impl StdError for HttpError {}

fn error_chain_has_io_kind(err: &(dyn StdError + 'static), kind: ErrorKind, needle: &str) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == kind
        {
            return true;
        }

        if source.to_string().to_ascii_lowercase().contains(needle) {
            return true;
        }

        current = source.source();
    }

    false
}

pub(crate) fn chat_server_request_error(
    err: reqwest::Error,
    api_url: &str,
    timeout_secs: u64,
) -> anyhow::Error {
    if err.is_timeout() || error_chain_has_io_kind(&err, ErrorKind::TimedOut, "timed out") {
        return anyhow!(
            "Request timed out after {}s while calling '{}'. \
             Increase REQUEST_TIMEOUT_SECS or check server responsiveness.",
            timeout_secs,
            api_url
        );
    }

    if err.is_connect() {
        if error_chain_has_io_kind(&err, ErrorKind::ConnectionRefused, "connection refused") {
            return anyhow!(
                "Connection refused by the chat server at '{}'. \
                 Ensure the server is running and SERVER_URL is correct.",
                api_url
            );
        }

        return anyhow!(
            "Failed to connect to the chat server at '{}'. \
             Check SERVER_URL and network connectivity.",
            api_url
        );
    }

    anyhow!("Failed to call the chat server at '{}': {}", api_url, err)
}
