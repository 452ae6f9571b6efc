use serde::Serialize;
use sumdays_core::auth::SessionStore;
use sumdays_core::db::{JobDescriptor, PerKind};
use sumdays_core::sync::AUTO_BACKUP_JOB;

use crate::commands::common::{print_json, CommandContext};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct StatusReport {
    database: String,
    api_base_url: Option<String>,
    signed_in: bool,
    pending: PerKind<usize>,
    pending_total: usize,
    scheduled_push: Option<JobDescriptor>,
}

pub async fn run_status(ctx: &CommandContext) -> Result<(), CliError> {
    let store = ctx.open_store().await?;
    let pending = store.dirty_counts().await?;
    let report = StatusReport {
        database: ctx.db_path.display().to_string(),
        api_base_url: ctx.config.api_base_url(),
        signed_in: ctx.sessions().load_session()?.is_some(),
        pending_total: pending.total(),
        pending,
        scheduled_push: store.load_job(AUTO_BACKUP_JOB).await?,
    };

    if ctx.json {
        return print_json(&report);
    }

    println!("Database:  {}", report.database);
    println!(
        "Server:    {}",
        report.api_base_url.as_deref().unwrap_or("(not configured)")
    );
    println!(
        "Session:   {}",
        if report.signed_in { "stored" } else { "none" }
    );
    match &report.scheduled_push {
        Some(job) => println!("Schedule:  every {}s", job.interval_ms / 1000),
        None => println!("Schedule:  none"),
    }
    if report.pending_total == 0 {
        println!("Pending:   nothing to push");
        return Ok(());
    }
    println!("Pending:   {} change(s)", report.pending_total);
    for (kind, count) in report.pending.iter().filter(|(_, count)| **count > 0) {
        println!("  {:<12} {count}", kind.wire_name());
    }
    Ok(())
}
