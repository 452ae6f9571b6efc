//! Sumdays CLI - journal from the terminal and sync with the Sumdays server
//!
//! Memos and diary entries are written to the local store first and pushed
//! to the server by `sumdays sync push` or a running `sumdays sync watch`.

mod cli;
mod commands;
mod error;
mod session;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::common::CommandContext;
use crate::commands::config::run_config;
use crate::commands::diary::run_diary;
use crate::commands::memo::run_memo;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "sumdays=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let Cli {
        command,
        db_path,
        json,
    } = Cli::parse();

    match command {
        // Config commands never open the store
        Commands::Config { command } => run_config(command, json),
        Commands::Memo { command } => {
            run_memo(command, &CommandContext::load(db_path, json)?).await
        }
        Commands::Diary { command } => {
            run_diary(command, &CommandContext::load(db_path, json)?).await
        }
        Commands::Status => run_status(&CommandContext::load(db_path, json)?).await,
        Commands::Sync { command } => {
            run_sync(command, &CommandContext::load(db_path, json)?).await
        }
        Commands::Auth { command } => run_auth(command, &CommandContext::load(db_path, json)?),
    }
}
