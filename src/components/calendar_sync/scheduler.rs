use super::reconciler::SyncReconciler;
use crate::config::MAX_SYNC_INTERVAL_MINUTES;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs a bidirectional pass on a fixed period.
///
/// The first pass fires as soon as the scheduler starts. Each tick spawns its
/// own pass, so a slow pass never delays the timer; the reconciler's guard
/// turns overlapping ticks into no-ops.
pub struct SyncScheduler {
    reconciler: Arc<SyncReconciler>,
    cancellation: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SyncScheduler {
    pub fn new(reconciler: Arc<SyncReconciler>) -> Self {
        Self {
            reconciler,
            cancellation: CancellationToken::new(),
            task: None,
        }
    }

    /// Start with a period in minutes. Returns false when already running or
    /// when the period is zero or too large.
    pub fn start(&mut self, interval_minutes: u64) -> bool {
        if interval_minutes == 0 {
            warn!("Sync interval of zero minutes, scheduler not started");
            return false;
        }
        let Some(secs) = interval_minutes
            .checked_mul(60)
            .filter(|_| interval_minutes <= MAX_SYNC_INTERVAL_MINUTES)
        else {
            warn!(interval_minutes, "Sync interval out of range, scheduler not started");
            return false;
        };
        self.start_with_period(Duration::from_secs(secs))
    }

    pub fn start_with_period(&mut self, period: Duration) -> bool {
        if self.is_running() {
            warn!("Sync scheduler already running");
            return false;
        }
        if period.is_zero() {
            return false;
        }

        self.cancellation = CancellationToken::new();
        let cancel = self.cancellation.clone();
        let reconciler = Arc::clone(&self.reconciler);

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Sync scheduler loop cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let reconciler = Arc::clone(&reconciler);
                        tokio::spawn(async move {
                            reconciler.perform_bidirectional_sync().await;
                        });
                    }
                }
            }
        });

        self.task = Some(task);
        info!("Sync scheduler started, running every {:?}", period);
        true
    }

    /// Stop issuing new passes. A pass already in flight runs to completion.
    pub fn stop(&mut self) {
        if self.task.take().is_some() {
            self.cancellation.cancel();
            info!("Sync scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}
