pub mod client;
pub mod config;
pub mod conversation;
pub mod logging;
pub mod provider;
pub mod repl;
pub mod server;
pub mod session;

use anyhow::{Context, Result};
use reqwest::Client;
use std::env;
use tracing::info;

use config::{Config, mask_key};
use repl::run_repl;

pub async fn run() -> Result<()> {
    let cfg = Config::from_env();
    info!(
        server_url = %cfg.server_url,
        openrouter_key = %mask_key(&cfg.openrouter_api_key),
        openai_key = %mask_key(&cfg.openai_api_key),
        "loaded runtime configuration"
    );

    let client = Client::builder()
        .build()
        .context("Failed to initialize HTTP client")?;

    let args: Vec<String> = env::args().skip(1).collect();
    match args.split_first() {
        Some((command, _)) if command == "serve" => {
            cfg.validate_server()?;
            server::run(client, cfg).await
        }
        Some(_) => {
            cfg.validate_client()?;
            let message = args.join(" ");
            let answer = client::send_chat(&client, &cfg, &message, &[]).await?;
            println!("{}", answer.trim());
            Ok(())
        }
        None => {
            cfg.validate_client()?;
            run_repl(&client, &cfg).await
        }
    }
}
