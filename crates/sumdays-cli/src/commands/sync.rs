use std::sync::Arc;
use std::time::Duration;

use sumdays_core::sync::{
    PullSyncJob, PushScheduler, PushSyncJob, Registration, SyncError, SyncGateway,
};
use sumdays_core::{Store, SyncState, SyncStatus};

use crate::cli::SyncCommands;
use crate::commands::common::{print_json, CommandContext};
use crate::error::CliError;

pub async fn run_sync(command: SyncCommands, ctx: &CommandContext) -> Result<(), CliError> {
    let store = ctx.open_store().await?;
    let gateway: Arc<dyn SyncGateway> = Arc::new(ctx.build_gateway()?);

    match command {
        SyncCommands::Push => run_push(store, gateway, ctx).await,
        SyncCommands::Pull { force } => run_pull(store, gateway, force, ctx).await,
        SyncCommands::Watch {
            interval,
            reschedule,
        } => {
            let interval = interval.map_or_else(|| ctx.config.push_interval(), Duration::from_secs);
            run_watch(store, gateway, interval, reschedule).await
        }
    }
}

async fn run_push(
    store: Store,
    gateway: Arc<dyn SyncGateway>,
    ctx: &CommandContext,
) -> Result<(), CliError> {
    let report = PushSyncJob::new(store, gateway)
        .skip_when_clean(true)
        .run()
        .await?;

    if ctx.json {
        return print_json(&report);
    }
    if report.skipped {
        println!("Nothing to push");
    } else {
        println!(
            "Pushed {} change(s): {} updated, {} deleted",
            report.sent.total(),
            report.cleaned(),
            report.purged()
        );
    }
    Ok(())
}

async fn run_pull(
    store: Store,
    gateway: Arc<dyn SyncGateway>,
    force: bool,
    ctx: &CommandContext,
) -> Result<(), CliError> {
    let result = PullSyncJob::new(store, gateway)
        .guard_dirty(!force)
        .run()
        .await;
    let report = match result {
        Ok(report) => report,
        Err(SyncError::DirtyStatePending(count)) => return Err(CliError::UnpushedChanges(count)),
        Err(error) => return Err(error.into()),
    };

    if ctx.json {
        return print_json(&report);
    }
    println!("Pulled {} record(s) from the server", report.installed.total());
    Ok(())
}

async fn run_watch(
    store: Store,
    gateway: Arc<dyn SyncGateway>,
    interval: Duration,
    reschedule: bool,
) -> Result<(), CliError> {
    let push = PushSyncJob::new(store.clone(), Arc::clone(&gateway));
    let pull = PullSyncJob::new(store.clone(), gateway);
    let scheduler = PushScheduler::start(push, pull, store);

    if reschedule {
        scheduler.disable_periodic().await?;
    } else if let Some(restored) = scheduler.restore().await? {
        tracing::debug!("Restored schedule registered at {}", restored.registered_at);
    }
    match scheduler.enable_periodic(interval).await? {
        Registration::Scheduled(job) => {
            println!("Pushing every {}s (Ctrl-C to stop)", job.interval_ms / 1000);
        }
        Registration::AlreadyScheduled(job) => println!(
            "Keeping existing schedule of {}s (pass --reschedule to change it)",
            job.interval_ms / 1000
        ),
    }
    if !scheduler.trigger_manual_sync() {
        tracing::debug!("Initial push not queued, a run is already pending");
    }

    let mut status = scheduler.status();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                println!("{}", format_status_line(&current));
            }
        }
    }

    println!("Stopping sync");
    scheduler.shutdown().await;
    Ok(())
}

pub fn format_status_line(status: &SyncStatus) -> String {
    match status.state {
        SyncState::Syncing => "syncing...".to_string(),
        SyncState::Synced => "synced".to_string(),
        SyncState::Offline => format!(
            "offline: {}",
            status.last_error.as_deref().unwrap_or("no session")
        ),
        SyncState::Error => format!(
            "error ({} in a row): {}",
            status.consecutive_failures,
            status.last_error.as_deref().unwrap_or("unknown")
        ),
    }
}
