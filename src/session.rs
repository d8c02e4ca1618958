use anyhow::Result;
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

use crate::client;
use crate::config::Config;
use crate::conversation::{ConnectivityStatus, Role, Turn};

pub type StatusFuture<'a> = Pin<Box<dyn Future<Output = Result<ConnectivityStatus>> + 'a>>;
pub type ReplyFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + 'a>>;

/// The two remote calls the session depends on.
pub trait ChatTransport {
    fn status<'a>(&'a self) -> StatusFuture<'a>;
    fn send<'a>(&'a self, message: &'a str, history: &'a [Turn]) -> ReplyFuture<'a>;
}

pub struct HttpChatTransport<'a> {
    client: &'a Client,
    cfg: &'a Config,
}

impl<'a> HttpChatTransport<'a> {
    pub fn new(client: &'a Client, cfg: &'a Config) -> Self {
        Self { client, cfg }
    }
}

impl ChatTransport for HttpChatTransport<'_> {
    fn status<'a>(&'a self) -> StatusFuture<'a> {
        Box::pin(async move { client::fetch_status(self.client, self.cfg).await })
    }

    fn send<'a>(&'a self, message: &'a str, history: &'a [Turn]) -> ReplyFuture<'a> {
        Box::pin(async move { client::send_chat(self.client, self.cfg, message, history).await })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    Connected { provider: String },
    Unavailable { reason: String },
    Unreachable,
}

pub trait Frontend {
    fn show_message(&mut self, role: Role, content: &str);
    fn show_status(&mut self, status: &StatusLine);
    fn set_loading(&mut self, loading: bool);
}

/// One conversation: the append-only history plus the mediation between
/// frontend events and the two remote calls.
pub struct ChatSession<T, F> {
    transport: T,
    frontend: F,
    history: Vec<Turn>,
}

impl<T, F> ChatSession<T, F>
where
    T: ChatTransport,
    F: Frontend,
{
    pub fn new(transport: T, frontend: F) -> Self {
        Self {
            transport,
            frontend,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub async fn initialize(&mut self) {
        self.check_status().await;
    }

    /// Failures here only affect the status display, never the caller.
    pub async fn check_status(&mut self) {
        let line = match self.transport.status().await {
            Ok(ConnectivityStatus {
                available: true,
                provider,
                ..
            }) => StatusLine::Connected {
                provider: provider.unwrap_or_else(|| "unknown".to_string()),
            },
            Ok(ConnectivityStatus { error, .. }) => StatusLine::Unavailable {
                reason: error.unwrap_or_else(|| "unknown error".to_string()),
            },
            Err(err) => {
                debug!(error = %err, "status probe failed, rendering generic indicator");
                StatusLine::Unreachable
            }
        };
        self.frontend.show_status(&line);
    }

    /// The request body's `history` excludes the message being sent; both
    /// turns join the history only once a reply arrives, so a failed
    /// exchange leaves it untouched and the user may resend.
    pub async fn send_message(&mut self, input: &str) {
        let message = input.trim();
        if message.is_empty() {
            return;
        }

        self.frontend.show_message(Role::User, message);
        self.frontend.set_loading(true);

        match self.transport.send(message, &self.history).await {
            Ok(reply) => {
                self.history.push(Turn::user(message));
                self.history.push(Turn::assistant(reply.clone()));
                self.frontend.show_message(Role::Assistant, &reply);
            }
            Err(err) => {
                let bubble =
                    format!("Error: {err:#}. Check the API key configuration on the server.");
                self.frontend.show_message(Role::Assistant, &bubble);
            }
        }

        self.frontend.set_loading(false);
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::{ChatSession, ChatTransport, Frontend, ReplyFuture, StatusFuture, StatusLine};
    use crate::conversation::{ConnectivityStatus, Role, Turn};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Message(Role, String),
        Status(StatusLine),
        Loading(bool),
    }

    #[derive(Default)]
    struct RecordingFrontend {
        events: Vec<Event>,
    }

    impl Frontend for RecordingFrontend {
        fn show_message(&mut self, role: Role, content: &str) {
            self.events.push(Event::Message(role, content.to_string()));
        }

        fn show_status(&mut self, status: &StatusLine) {
            self.events.push(Event::Status(status.clone()));
        }

        fn set_loading(&mut self, loading: bool) {
            self.events.push(Event::Loading(loading));
        }
    }

    struct StubTransport {
        status_outcome: Result<ConnectivityStatus, String>,
        replies: RefCell<VecDeque<Result<String, String>>>,
        sends: RefCell<Vec<(String, Vec<Turn>)>>,
        status_calls: RefCell<usize>,
    }

    impl StubTransport {
        fn with_replies(replies: Vec<Result<String, String>>) -> Self {
            Self {
                status_outcome: Err("status unused".to_string()),
                replies: RefCell::new(replies.into()),
                sends: RefCell::new(Vec::new()),
                status_calls: RefCell::new(0),
            }
        }

        fn with_status(outcome: Result<ConnectivityStatus, String>) -> Self {
            Self {
                status_outcome: outcome,
                replies: RefCell::new(VecDeque::new()),
                sends: RefCell::new(Vec::new()),
                status_calls: RefCell::new(0),
            }
        }
    }

    impl ChatTransport for StubTransport {
        fn status<'a>(&'a self) -> StatusFuture<'a> {
            *self.status_calls.borrow_mut() += 1;
            let outcome = self.status_outcome.clone();
            Box::pin(async move { outcome.map_err(|msg| anyhow!(msg)) })
        }

        fn send<'a>(&'a self, message: &'a str, history: &'a [Turn]) -> ReplyFuture<'a> {
            self.sends
                .borrow_mut()
                .push((message.to_string(), history.to_vec()));
            let outcome = self
                .replies
                .borrow_mut()
                .pop_front()
                .expect("unexpected send");
            Box::pin(async move { outcome.map_err(|msg| anyhow!(msg)) })
        }
    }

    fn session_with_replies(
        replies: Vec<Result<String, String>>,
    ) -> ChatSession<StubTransport, RecordingFrontend> {
        ChatSession::new(StubTransport::with_replies(replies), RecordingFrontend::default())
    }

    #[tokio::test]
    async fn empty_or_whitespace_input_never_calls_the_endpoint() {
        let mut session = session_with_replies(vec![]);

        session.send_message("").await;
        session.send_message("   \t ").await;

        assert!(session.history().is_empty());
        assert!(session.transport.sends.borrow().is_empty());
        assert!(session.frontend.events.is_empty());
    }

    #[tokio::test]
    async fn successful_send_appends_user_then_assistant_turns() {
        let mut session = session_with_replies(vec![Ok("hello there".to_string())]);

        session.send_message("  hi  ").await;

        assert_eq!(
            session.history(),
            &[Turn::user("hi"), Turn::assistant("hello there")]
        );
        assert_eq!(
            session.frontend.events,
            vec![
                Event::Message(Role::User, "hi".to_string()),
                Event::Loading(true),
                Event::Message(Role::Assistant, "hello there".to_string()),
                Event::Loading(false),
            ]
        );
    }

    #[tokio::test]
    async fn request_history_excludes_the_message_in_flight() {
        let mut session = session_with_replies(vec![
            Ok("first reply".to_string()),
            Ok("second reply".to_string()),
        ]);

        session.send_message("first").await;
        session.send_message("second").await;

        let sends = session.transport.sends.borrow();
        assert_eq!(sends.len(), 2);
        assert_eq!(sends[0].0, "first");
        assert!(sends[0].1.is_empty());
        assert_eq!(sends[1].0, "second");
        assert_eq!(
            sends[1].1,
            vec![Turn::user("first"), Turn::assistant("first reply")]
        );
        assert_eq!(session.history().len(), 4);
    }

    #[tokio::test]
    async fn failed_send_leaves_history_untouched_and_renders_error_bubble() {
        let mut session =
            session_with_replies(vec![Err("HTTP error: status 500".to_string())]);

        session.send_message("hi").await;

        assert!(session.history().is_empty());
        let bubble = session
            .frontend
            .events
            .iter()
            .find_map(|event| match event {
                Event::Message(Role::Assistant, content) => Some(content.clone()),
                _ => None,
            })
            .expect("an error bubble should be rendered");
        assert!(bubble.contains("500"), "unexpected bubble: {bubble}");
        assert!(
            bubble.contains("API key configuration"),
            "unexpected bubble: {bubble}"
        );
    }

    #[tokio::test]
    async fn loading_resolves_exactly_once_per_send_regardless_of_outcome() {
        let mut session = session_with_replies(vec![
            Ok("reply".to_string()),
            Err("connection reset".to_string()),
        ]);

        session.send_message("one").await;
        session.send_message("two").await;

        let loading: Vec<bool> = session
            .frontend
            .events
            .iter()
            .filter_map(|event| match event {
                Event::Loading(value) => Some(*value),
                _ => None,
            })
            .collect();
        assert_eq!(loading, vec![true, false, true, false]);
    }

    #[tokio::test]
    async fn initialize_probes_status_once() {
        let mut session = ChatSession::new(
            StubTransport::with_status(Ok(ConnectivityStatus {
                available: true,
                provider: Some("OpenRouter (gpt-4o)".to_string()),
                error: None,
            })),
            RecordingFrontend::default(),
        );

        session.initialize().await;

        assert_eq!(*session.transport.status_calls.borrow(), 1);
        assert_eq!(
            session.frontend.events,
            vec![Event::Status(StatusLine::Connected {
                provider: "OpenRouter (gpt-4o)".to_string()
            })]
        );
    }

    #[tokio::test]
    async fn unavailable_status_uses_the_reported_error_or_a_fallback() {
        let mut session = ChatSession::new(
            StubTransport::with_status(Ok(ConnectivityStatus {
                available: false,
                provider: None,
                error: Some("no key".to_string()),
            })),
            RecordingFrontend::default(),
        );
        session.check_status().await;
        assert_eq!(
            session.frontend.events,
            vec![Event::Status(StatusLine::Unavailable {
                reason: "no key".to_string()
            })]
        );

        let mut session = ChatSession::new(
            StubTransport::with_status(Ok(ConnectivityStatus {
                available: false,
                provider: None,
                error: None,
            })),
            RecordingFrontend::default(),
        );
        session.check_status().await;
        assert_eq!(
            session.frontend.events,
            vec![Event::Status(StatusLine::Unavailable {
                reason: "unknown error".to_string()
            })]
        );
    }

    #[tokio::test]
    async fn transport_failure_renders_the_generic_indicator() {
        let mut session = ChatSession::new(
            StubTransport::with_status(Err("connection refused".to_string())),
            RecordingFrontend::default(),
        );

        session.check_status().await;

        assert_eq!(
            session.frontend.events,
            vec![Event::Status(StatusLine::Unreachable)]
        );
    }
}
