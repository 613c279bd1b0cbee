use super::reconciler::{PassOutcome, ResourceState, SyncReconciler, WebhookOutcome};
use super::window::SyncWindow;
use crate::components::event_store::PushStats;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Commands that can be sent to the sync actor
pub enum SyncCommand {
    SyncNow(mpsc::Sender<PassOutcome>),
    PullManual(mpsc::Sender<PassOutcome>),
    EventCreated(String, mpsc::Sender<PushStats>),
    EventUpdated(String, mpsc::Sender<bool>),
    EventDeleted(String, mpsc::Sender<()>),
    Webhook(ResourceState, mpsc::Sender<WebhookOutcome>),
    Shutdown,
}

/// Owns the reconciler and serves commands from the handle
pub struct SyncActor {
    reconciler: Arc<SyncReconciler>,
    command_rx: mpsc::Receiver<SyncCommand>,
}

impl SyncActor {
    pub fn new(reconciler: Arc<SyncReconciler>, command_rx: mpsc::Receiver<SyncCommand>) -> Self {
        Self {
            reconciler,
            command_rx,
        }
    }

    /// Start the actor's processing loop.
    ///
    /// Every command runs on its own task so a long pass does not hold up
    /// cheap commands such as event hooks.
    pub async fn run(&mut self) {
        info!("Calendar sync actor started");

        while let Some(cmd) = self.command_rx.recv().await {
            let reconciler = Arc::clone(&self.reconciler);
            match cmd {
                SyncCommand::SyncNow(response_tx) => {
                    tokio::spawn(async move {
                        let outcome = reconciler.perform_bidirectional_sync().await;
                        let _ = response_tx.send(outcome).await;
                    });
                }
                SyncCommand::PullManual(response_tx) => {
                    tokio::spawn(async move {
                        let outcome = reconciler.pull(SyncWindow::manual(Utc::now())).await;
                        let _ = response_tx.send(outcome).await;
                    });
                }
                SyncCommand::EventCreated(event_id, response_tx) => {
                    tokio::spawn(async move {
                        let stats = reconciler.on_event_created(&event_id).await;
                        let _ = response_tx.send(stats).await;
                    });
                }
                SyncCommand::EventUpdated(event_id, response_tx) => {
                    tokio::spawn(async move {
                        let flagged = reconciler.on_event_updated(&event_id).await;
                        let _ = response_tx.send(flagged).await;
                    });
                }
                SyncCommand::EventDeleted(external_id, response_tx) => {
                    tokio::spawn(async move {
                        reconciler.on_event_deleted(&external_id).await;
                        let _ = response_tx.send(()).await;
                    });
                }
                SyncCommand::Webhook(state, response_tx) => {
                    tokio::spawn(async move {
                        let outcome = reconciler.handle_webhook_notification(state).await;
                        let _ = response_tx.send(outcome).await;
                    });
                }
                SyncCommand::Shutdown => {
                    info!("Calendar sync actor shutting down");
                    break;
                }
            }
        }

        info!("Calendar sync actor shut down");
    }
}
