use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use sumdays_core::config::AppConfig;
use sumdays_core::sync::HttpSyncGateway;
use sumdays_core::util::{is_iso_date, today_iso};
use sumdays_core::{Memo, Store};

use crate::error::CliError;
use crate::session::KeychainSessionStore;

/// Everything a command needs besides its own arguments
pub struct CommandContext {
    pub config: AppConfig,
    pub db_path: PathBuf,
    pub json: bool,
}

impl CommandContext {
    pub fn load(db_path_override: Option<PathBuf>, json: bool) -> Result<Self, CliError> {
        let mut config = AppConfig::load()?;
        if let Some(path) = db_path_override {
            config.database_path = Some(path);
        }
        let db_path = config.database_path()?;

        Ok(Self {
            config,
            db_path,
            json,
        })
    }

    pub async fn open_store(&self) -> Result<Store, CliError> {
        Ok(Store::open(self.db_path.clone()).await?)
    }

    pub fn sessions(&self) -> KeychainSessionStore {
        KeychainSessionStore::for_database(&self.db_path)
    }

    pub fn build_gateway(&self) -> Result<HttpSyncGateway<KeychainSessionStore>, CliError> {
        let base_url = self
            .config
            .api_base_url()
            .ok_or(CliError::SyncNotConfigured)?;
        Ok(HttpSyncGateway::new(
            base_url,
            self.config.request_timeout(),
            self.sessions(),
        )?)
    }
}

/// Today when no date is given, otherwise a validated `yyyy-MM-dd`
pub fn resolve_date(date: Option<String>) -> Result<String, CliError> {
    match date.map(|value| value.trim().to_string()) {
        None => Ok(today_iso()),
        Some(value) if is_iso_date(&value) => Ok(value),
        Some(value) => Err(CliError::InvalidDate(value)),
    }
}

pub fn format_memo_lines(memos: &[Memo]) -> Vec<String> {
    memos
        .iter()
        .map(|memo| {
            format!(
                "{:>5}  {}  {}  {}",
                memo.id,
                memo.date,
                memo.timestamp,
                memo.preview(60)
            )
        })
        .collect()
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn resolve_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    if let Some(content) = capture_editor_input_with_initial("")? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(CliError::EditorFailed(format!(
            "`{editor}` exited with status {status}"
        ))),
        // EDITOR may carry arguments, e.g. `code --wait`
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let status = Command::new(program).args(parts).arg(file_path).status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn create_temp_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("sumdays-{}-{now}.md", std::process::id()))
}
