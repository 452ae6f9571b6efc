//! Background scheduling of the sync jobs.
//!
//! One worker task owns the job slot. Periodic ticks, manual triggers and
//! awaited runs all go through its queue, so push and pull never overlap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::pull::{PullReport, PullSyncJob};
use super::push::{PushReport, PushSyncJob};
use super::{SyncError, SyncResult};
use crate::db::{JobDescriptor, Store};
use crate::error::{Error, Result};
use crate::state::{SyncState, SyncStatus};
use crate::util::unix_timestamp_now;

/// Name of the periodic push registration
pub const AUTO_BACKUP_JOB: &str = "auto_backup";

/// Interval used when none is configured
pub const DEFAULT_PUSH_INTERVAL: Duration = Duration::from_secs(3 * 60 * 60);

const COMMAND_QUEUE_DEPTH: usize = 16;

enum Command {
    Push {
        reply: Option<oneshot::Sender<SyncResult<PushReport>>>,
    },
    Pull {
        reply: oneshot::Sender<SyncResult<PullReport>>,
    },
    Shutdown,
}

/// Result of [`PushScheduler::enable_periodic`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// Newly registered with the requested interval
    Scheduled(JobDescriptor),
    /// A registration already existed and was kept as is
    AlreadyScheduled(JobDescriptor),
}

impl Registration {
    pub const fn descriptor(&self) -> &JobDescriptor {
        match self {
            Self::Scheduled(descriptor) | Self::AlreadyScheduled(descriptor) => descriptor,
        }
    }
}

pub struct PushScheduler {
    store: Store,
    commands: mpsc::Sender<Command>,
    push_pending: Arc<AtomicBool>,
    status: watch::Receiver<SyncStatus>,
    worker: Option<JoinHandle<()>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl PushScheduler {
    /// Spawn the worker. Must be called from within a tokio runtime.
    pub fn start(push: PushSyncJob, pull: PullSyncJob, store: Store) -> Self {
        let (commands, receiver) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (status_tx, status) = watch::channel(SyncStatus::default());
        let push_pending = Arc::new(AtomicBool::new(false));

        let worker = tokio::spawn(run_worker(
            receiver,
            push,
            pull,
            Arc::clone(&push_pending),
            status_tx,
        ));

        Self {
            store,
            commands,
            push_pending,
            status,
            worker: Some(worker),
            ticker: Mutex::new(None),
        }
    }

    /// Register the periodic push under [`AUTO_BACKUP_JOB`].
    ///
    /// An existing registration keeps its interval; it is only re-armed if
    /// this process has not armed it yet.
    pub async fn enable_periodic(&self, interval: Duration) -> Result<Registration> {
        if interval.is_zero() {
            return Err(Error::InvalidInput(
                "sync interval must be greater than zero".to_string(),
            ));
        }

        let descriptor = JobDescriptor {
            name: AUTO_BACKUP_JOB.to_string(),
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            registered_at: unix_timestamp_now(),
        };

        let mut ticker = self.ticker.lock().await;
        let (stored, inserted) = self.store.register_job(&descriptor).await?;
        if !is_running(ticker.as_ref()) {
            *ticker = Some(self.spawn_ticker(&stored));
        }

        if inserted {
            tracing::info!(
                "Scheduled periodic push every {:?}",
                Duration::from_millis(stored.interval_ms)
            );
            Ok(Registration::Scheduled(stored))
        } else {
            tracing::debug!("Periodic push already scheduled");
            Ok(Registration::AlreadyScheduled(stored))
        }
    }

    /// Re-arm a registration persisted by an earlier process
    pub async fn restore(&self) -> Result<Option<JobDescriptor>> {
        let mut ticker = self.ticker.lock().await;
        let Some(stored) = self.store.load_job(AUTO_BACKUP_JOB).await? else {
            return Ok(None);
        };
        if !is_running(ticker.as_ref()) {
            *ticker = Some(self.spawn_ticker(&stored));
            tracing::info!(
                "Restored periodic push every {:?}",
                Duration::from_millis(stored.interval_ms)
            );
        }
        Ok(Some(stored))
    }

    /// Stop the periodic push and forget its registration
    pub async fn disable_periodic(&self) -> Result<bool> {
        let mut ticker = self.ticker.lock().await;
        if let Some(handle) = ticker.take() {
            handle.abort();
        }
        self.store.remove_job(AUTO_BACKUP_JOB).await
    }

    pub async fn is_periodic_armed(&self) -> bool {
        is_running(self.ticker.lock().await.as_ref())
    }

    /// Enqueue a one-off push without waiting for it.
    ///
    /// Returns `false` when a push is already queued and not yet started,
    /// when the queue is full, or when the worker is gone.
    pub fn trigger_manual_sync(&self) -> bool {
        enqueue_push(&self.commands, &self.push_pending)
    }

    /// Run a push through the job slot and wait for its result
    pub async fn run_push_now(&self) -> SyncResult<PushReport> {
        let (reply, result) = oneshot::channel();
        self.commands
            .send(Command::Push { reply: Some(reply) })
            .await
            .map_err(|_| SyncError::SchedulerStopped)?;
        result.await.map_err(|_| SyncError::SchedulerStopped)?
    }

    /// Run a pull through the job slot and wait for its result
    pub async fn run_pull_now(&self) -> SyncResult<PullReport> {
        let (reply, result) = oneshot::channel();
        self.commands
            .send(Command::Pull { reply })
            .await
            .map_err(|_| SyncError::SchedulerStopped)?;
        result.await.map_err(|_| SyncError::SchedulerStopped)?
    }

    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.status.clone()
    }

    /// Stop the ticker, let queued jobs finish, and join the worker
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.ticker.get_mut().take() {
            handle.abort();
        }
        if self.commands.send(Command::Shutdown).await.is_err() {
            tracing::debug!("Sync worker already stopped");
        }
        if let Some(worker) = self.worker.take() {
            if let Err(error) = worker.await {
                tracing::warn!("Sync worker ended abnormally: {}", error);
            }
        }
    }

    fn spawn_ticker(&self, descriptor: &JobDescriptor) -> JoinHandle<()> {
        let period = Duration::from_millis(descriptor.interval_ms.max(1));
        let commands = self.commands.clone();
        let pending = Arc::clone(&self.push_pending);

        tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                if commands.is_closed() {
                    break;
                }
                enqueue_push(&commands, &pending);
            }
        })
    }
}

impl Drop for PushScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.ticker.get_mut().take() {
            handle.abort();
        }
    }
}

fn is_running(handle: Option<&JoinHandle<()>>) -> bool {
    handle.is_some_and(|handle| !handle.is_finished())
}

fn enqueue_push(commands: &mpsc::Sender<Command>, pending: &AtomicBool) -> bool {
    if pending.swap(true, Ordering::AcqRel) {
        tracing::debug!("Push trigger coalesced with a queued run");
        return false;
    }
    match commands.try_send(Command::Push { reply: None }) {
        Ok(()) => true,
        Err(error) => {
            pending.store(false, Ordering::Release);
            match error {
                TrySendError::Full(_) => tracing::debug!("Sync queue full, push trigger dropped"),
                TrySendError::Closed(_) => {
                    tracing::debug!("Sync worker stopped, push trigger dropped");
                }
            }
            false
        }
    }
}

async fn run_worker(
    mut commands: mpsc::Receiver<Command>,
    push: PushSyncJob,
    pull: PullSyncJob,
    push_pending: Arc<AtomicBool>,
    status: watch::Sender<SyncStatus>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Push { reply } => {
                if reply.is_none() {
                    push_pending.store(false, Ordering::Release);
                }
                let previous = status.borrow().state;
                status.send_modify(SyncStatus::begin);
                let result = push.run().await;
                record(&status, previous, result.as_ref().map(|_| ()));
                if let Some(reply) = reply {
                    // Caller may have stopped waiting
                    reply.send(result).ok();
                }
            }
            Command::Pull { reply } => {
                let previous = status.borrow().state;
                status.send_modify(SyncStatus::begin);
                let result = pull.run().await;
                record(&status, previous, result.as_ref().map(|_| ()));
                reply.send(result).ok();
            }
            Command::Shutdown => break,
        }
    }
    tracing::debug!("Sync worker stopped");
}

fn record(
    status: &watch::Sender<SyncStatus>,
    previous: SyncState,
    outcome: std::result::Result<(), &SyncError>,
) {
    status.send_modify(|status| match outcome {
        Ok(()) => status.succeed(unix_timestamp_now()),
        // Another process is syncing this database; nothing ran here
        Err(SyncError::AlreadyRunning) => status.state = previous,
        Err(error) => status.fail(error),
    });
}
