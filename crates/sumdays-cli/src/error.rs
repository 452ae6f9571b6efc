use std::io;

use sumdays_core::auth::AuthError;
use sumdays_core::sync::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] sumdays_core::Error),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No memo content provided")]
    EmptyContent,
    #[error("Edited memo content cannot be empty")]
    EmptyEditedContent,
    #[error("Invalid date '{0}', expected yyyy-MM-dd")]
    InvalidDate(String),
    #[error("Emotion score {0} is outside -1.0..=1.0")]
    InvalidEmotionScore(f64),
    #[error("Memo not found: {0}")]
    MemoNotFound(i64),
    #[error("No diary entry for {0}")]
    EntryNotFound(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error(
        "{0} local change(s) would be lost. Run `sumdays sync push` first or pass --force."
    )]
    UnpushedChanges(usize),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Sync is not configured. Run `sumdays config init --api-base-url <URL>` or set SUMDAYS_API_URL."
    )]
    SyncNotConfigured,
}
