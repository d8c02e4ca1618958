use anyhow::{Context, Result};
use chrono::Local;
use reqwest::Client;
use std::io::{self, Write};

use crate::config::Config;
use crate::conversation::{Role, Turn};
use crate::session::{ChatSession, Frontend, HttpChatTransport, StatusLine};

pub struct TerminalFrontend;

impl Frontend for TerminalFrontend {
    fn show_message(&mut self, role: Role, content: &str) {
        let stamp = Local::now().format("%H:%M");
        match role {
            Role::User => println!("[{stamp}] you: {content}"),
            Role::Assistant => println!("[{stamp}] bot: {content}\n"),
        }
    }

    fn show_status(&mut self, status: &StatusLine) {
        println!("{}\n", render_status(status));
    }

    fn set_loading(&mut self, loading: bool) {
        if loading {
            println!("· sending…");
        }
    }
}

fn render_status(status: &StatusLine) -> String {
    match status {
        StatusLine::Connected { provider } => format!("✓ connected ({provider})"),
        StatusLine::Unavailable { reason } => format!("✗ error: {reason}"),
        StatusLine::Unreachable => "✗ connection error".to_string(),
    }
}

pub async fn run_repl(client: &Client, cfg: &Config) -> Result<()> {
    let transport = HttpChatTransport::new(client, cfg);
    let mut session = ChatSession::new(transport, TerminalFrontend);

    println!("murmur chat client");
    println!("server: {}", cfg.server_url);
    println!("type a message, '/history' to inspect the transcript, or 'exit' to quit");

    session.initialize().await;

    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush stdout")?;

        let mut input = String::new();
        let read = io::stdin()
            .read_line(&mut input)
            .context("Failed to read stdin")?;
        if read == 0 {
            break;
        }

        let line = input.trim();
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        if line.eq_ignore_ascii_case("/history") {
            print_history(session.history());
            continue;
        }

        session.send_message(line).await;
    }

    Ok(())
}

fn print_history(history: &[Turn]) {
    if history.is_empty() {
        println!("(history is empty)\n");
        return;
    }

    for (idx, turn) in history.iter().enumerate() {
        println!("[{}] {}: {}", idx, turn.role.as_str(), turn.content);
    }
    println!();
}
