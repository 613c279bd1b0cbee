use super::actor::SyncCommand;
use super::reconciler::{PassOutcome, ResourceState, WebhookOutcome};
use crate::components::event_store::PushStats;
use crate::error::{component_error, SyncResult};
use tokio::sync::mpsc;

/// Handle for interacting with the calendar sync actor
#[derive(Clone)]
pub struct CalendarSyncHandle {
    command_tx: mpsc::Sender<SyncCommand>,
}

impl CalendarSyncHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<SyncCommand>) -> Self {
        Self { command_tx }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(mpsc::Sender<T>) -> SyncCommand,
    ) -> SyncResult<T> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(build(response_tx))
            .await
            .map_err(|e| component_error(&format!("Calendar sync mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| component_error("Calendar sync response channel closed"))
    }

    /// Run a bidirectional pass now
    pub async fn sync_now(&self) -> SyncResult<PassOutcome> {
        self.request(SyncCommand::SyncNow).await
    }

    /// Import the coming week from Google
    pub async fn pull_manual(&self) -> SyncResult<PassOutcome> {
        self.request(SyncCommand::PullManual).await
    }

    pub async fn event_created(&self, event_id: &str) -> SyncResult<PushStats> {
        let event_id = event_id.to_string();
        self.request(|tx| SyncCommand::EventCreated(event_id, tx))
            .await
    }

    pub async fn event_updated(&self, event_id: &str) -> SyncResult<bool> {
        let event_id = event_id.to_string();
        self.request(|tx| SyncCommand::EventUpdated(event_id, tx))
            .await
    }

    pub async fn event_deleted(&self, external_id: &str) -> SyncResult<()> {
        let external_id = external_id.to_string();
        self.request(|tx| SyncCommand::EventDeleted(external_id, tx))
            .await
    }

    pub async fn webhook(&self, state: ResourceState) -> SyncResult<WebhookOutcome> {
        self.request(|tx| SyncCommand::Webhook(state, tx)).await
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> SyncResult<()> {
        let _ = self.command_tx.send(SyncCommand::Shutdown).await;
        Ok(())
    }
}
