//! Calendar sync component: the reconciler, its periodic scheduler and the
//! actor that serves webhook and event-hook requests.

mod actor;
mod handle;
pub mod reconciler;
mod scheduler;
pub mod window;

pub use handle::CalendarSyncHandle;
pub use reconciler::{PassOutcome, ResourceState, SyncReconciler, SyncSettings, WebhookOutcome};
pub use scheduler::SyncScheduler;
pub use window::SyncWindow;

use super::event_store::EventStore;
use super::google_calendar::{GoogleCalendarClient, RemoteCalendar, TokenManager};
use crate::config::Config;
use crate::error::{component_error, SyncResult};
use actor::{SyncActor, SyncCommand};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Keeps the local event store and Google Calendar in step
pub struct CalendarSync {
    handle: CalendarSyncHandle,
    command_rx: Mutex<Option<mpsc::Receiver<SyncCommand>>>,
    remote_override: Option<Arc<dyn RemoteCalendar>>,
    reconciler: RwLock<Option<Arc<SyncReconciler>>>,
    scheduler: Mutex<Option<SyncScheduler>>,
    actor_task: Mutex<Option<JoinHandle<()>>>,
}

impl Default for CalendarSync {
    fn default() -> Self {
        Self::new()
    }
}

impl CalendarSync {
    /// Create the component. The handle is usable right away; commands queue
    /// until `init` starts the actor.
    pub fn new() -> Self {
        let (command_tx, command_rx) = mpsc::channel(32);
        Self {
            handle: CalendarSyncHandle::new(command_tx),
            command_rx: Mutex::new(Some(command_rx)),
            remote_override: None,
            reconciler: RwLock::new(None),
            scheduler: Mutex::new(None),
            actor_task: Mutex::new(None),
        }
    }

    /// Use `remote` instead of building a Google client from the config
    pub fn with_remote(remote: Arc<dyn RemoteCalendar>) -> Self {
        Self {
            remote_override: Some(remote),
            ..Self::new()
        }
    }

    pub fn handle(&self) -> CalendarSyncHandle {
        self.handle.clone()
    }

    /// The reconciler, once the component is initialized
    pub async fn reconciler(&self) -> Option<Arc<SyncReconciler>> {
        self.reconciler.read().await.clone()
    }

    pub async fn is_scheduler_running(&self) -> bool {
        self.scheduler
            .lock()
            .await
            .as_ref()
            .is_some_and(SyncScheduler::is_running)
    }

    async fn build_remote(&self, config: &Arc<RwLock<Config>>) -> SyncResult<Arc<dyn RemoteCalendar>> {
        if let Some(remote) = &self.remote_override {
            return Ok(Arc::clone(remote));
        }

        let token_manager = TokenManager::new(Arc::clone(config)).await?;
        let config_read = config.read().await;
        Ok(Arc::new(GoogleCalendarClient::new(&config_read, token_manager)))
    }
}

#[async_trait]
impl super::Component for CalendarSync {
    fn name(&self) -> &'static str {
        "calendar_sync"
    }

    async fn init(&self, config: Arc<RwLock<Config>>, store: Arc<dyn EventStore>) -> SyncResult<()> {
        let remote = self.build_remote(&config).await?;

        let (settings, interval_minutes) = {
            let config_read = config.read().await;
            (SyncSettings::from(&*config_read), config_read.sync_interval_minutes)
        };

        let command_rx = self
            .command_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| component_error("Calendar sync is already initialized"))?;

        let reconciler = Arc::new(SyncReconciler::new(store, remote, settings));
        *self.reconciler.write().await = Some(Arc::clone(&reconciler));

        let mut actor = SyncActor::new(Arc::clone(&reconciler), command_rx);
        let actor_task = tokio::spawn(async move {
            actor.run().await;
        });
        *self.actor_task.lock().await = Some(actor_task);

        let mut scheduler = SyncScheduler::new(reconciler);
        if scheduler.start(interval_minutes) {
            info!("Periodic calendar sync every {} minutes", interval_minutes);
        } else {
            warn!("Periodic calendar sync disabled");
        }
        *self.scheduler.lock().await = Some(scheduler);

        Ok(())
    }

    async fn shutdown(&self) -> SyncResult<()> {
        if let Some(mut scheduler) = self.scheduler.lock().await.take() {
            scheduler.stop();
        }

        self.handle.shutdown().await?;
        if let Some(task) = self.actor_task.lock().await.take() {
            if let Err(e) = task.await {
                warn!("Calendar sync actor ended abnormally: {}", e);
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
