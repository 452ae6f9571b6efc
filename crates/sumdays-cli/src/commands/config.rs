use std::path::PathBuf;

use sumdays_core::config::AppConfig;
use sumdays_core::util::normalize_text_option;

use crate::cli::ConfigCommands;
use crate::commands::common::print_json;
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, json: bool) -> Result<(), CliError> {
    let path = AppConfig::default_path()
        .ok_or_else(|| CliError::Config("could not determine a config directory".to_string()))?;

    match command {
        ConfigCommands::Init {
            api_base_url,
            database_path,
            push_interval_secs,
            request_timeout_secs,
        } => {
            let config = apply_init(
                AppConfig::load_from(&path)?,
                api_base_url,
                database_path,
                push_interval_secs,
                request_timeout_secs,
            );
            config.save_to(&path)?;
            println!("Saved configuration to {}", path.display());
            Ok(())
        }
        ConfigCommands::Show => {
            let config = AppConfig::load()?;
            if json {
                return print_json(&config);
            }
            println!("Config file:      {}", path.display());
            println!(
                "API base URL:     {}",
                config.api_base_url().as_deref().unwrap_or("(not set)")
            );
            println!("Database:         {}", config.database_path()?.display());
            println!("Push interval:    {}s", config.push_interval_secs);
            println!("Request timeout:  {}s", config.request_timeout_secs);
            Ok(())
        }
    }
}

/// Overlay explicit `config init` flags on an existing config
pub fn apply_init(
    mut config: AppConfig,
    api_base_url: Option<String>,
    database_path: Option<PathBuf>,
    push_interval_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
) -> AppConfig {
    if let Some(url) = normalize_text_option(api_base_url) {
        config.api_base_url = Some(url);
    }
    if let Some(path) = database_path {
        config.database_path = Some(path);
    }
    if let Some(secs) = push_interval_secs {
        config.push_interval_secs = secs;
    }
    if let Some(secs) = request_timeout_secs {
        config.request_timeout_secs = secs;
    }
    config
}
