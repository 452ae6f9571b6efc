use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sumdays")]
#[command(about = "Offline-first journaling with Sumdays server sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture and manage memos
    Memo {
        #[command(subcommand)]
        command: MemoCommands,
    },
    /// Write and read daily diary entries
    Diary {
        #[command(subcommand)]
        command: DiaryCommands,
    },
    /// Show pending changes and sync state
    Status,
    /// Push local changes or bootstrap from the server
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Manage the stored session token
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Manage CLI configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum MemoCommands {
    /// Add a memo (reads stdin or opens $EDITOR when no text is given)
    #[command(alias = "new")]
    Add {
        /// Memo text
        content: Vec<String>,
        /// Day the memo belongs to (yyyy-MM-dd, default today)
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
    },
    /// List memos of one day
    List {
        /// Day to list (yyyy-MM-dd, default today)
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
        /// List every day instead of one
        #[arg(long, conflicts_with = "date")]
        all: bool,
    },
    /// Replace a memo's text (opens $EDITOR when no text is given)
    Edit {
        /// Memo id
        id: i64,
        /// New memo text
        content: Vec<String>,
    },
    /// Delete a memo
    Delete {
        /// Memo id
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum DiaryCommands {
    /// Write or replace the diary text of a day
    Write {
        /// Diary text
        text: Vec<String>,
        /// Day of the entry (yyyy-MM-dd, default today)
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
        /// Keywords, separated by `;`
        #[arg(long, value_name = "LIST")]
        keywords: Option<String>,
        /// Emotion score between -1.0 and 1.0
        #[arg(long, value_name = "SCORE", allow_hyphen_values = true)]
        emotion_score: Option<f64>,
        /// Photo URL to attach (repeatable)
        #[arg(long = "photo-url", value_name = "URL")]
        photo_urls: Vec<String>,
    },
    /// Show the entry of a day
    Show {
        /// Day of the entry (yyyy-MM-dd, default today)
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
    },
    /// Delete the entry of a day
    Delete {
        /// Day of the entry (yyyy-MM-dd)
        date: String,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Send pending local changes to the server
    Push,
    /// Replace all local records with the server snapshot
    Pull {
        /// Discard unpushed local changes
        #[arg(long)]
        force: bool,
    },
    /// Keep pushing on a schedule until interrupted
    Watch {
        /// Push interval in seconds (defaults to the configured interval)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
        /// Replace an existing schedule instead of keeping it
        #[arg(long)]
        reschedule: bool,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Store a session token in the OS keychain
    SetToken {
        /// Bearer token issued by the Sumdays server
        token: String,
        /// Optional user id shown by `auth status`
        #[arg(long, value_name = "ID")]
        user_id: Option<String>,
    },
    /// Show whether a session token is stored
    Status,
    /// Remove the stored session token
    Logout,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or update the config file
    Init {
        /// Sumdays server base URL
        #[arg(long, value_name = "URL")]
        api_base_url: Option<String>,
        /// Local database file
        #[arg(long, value_name = "PATH")]
        database_path: Option<PathBuf>,
        /// Periodic push interval in seconds
        #[arg(long, value_name = "SECS")]
        push_interval_secs: Option<u64>,
        /// HTTP request timeout in seconds
        #[arg(long, value_name = "SECS")]
        request_timeout_secs: Option<u64>,
    },
    /// Print the effective configuration
    Show,
}
