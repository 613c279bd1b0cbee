//! HTTP surface: Google push notifications, manual sync triggers and local
//! event lifecycle hooks.

pub mod handlers;

use super::calendar_sync::CalendarSyncHandle;
use super::event_store::EventStore;
use crate::config::Config;
use crate::error::{component_error, SyncResult};
use async_trait::async_trait;
use axum::{
    routing::{delete, get, post},
    Router,
};
use handlers::{
    event_created_handler, event_deleted_handler, event_updated_handler, google_webhook_handler,
    health_handler, pull_handler, sync_now_handler,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    /// Handle to the calendar sync actor
    pub sync: CalendarSyncHandle,
    /// Expected `X-Goog-Channel-Token`, if any
    pub webhook_token: Option<String>,
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/webhooks/google-calendar", post(google_webhook_handler))
        .route("/api/calendar/sync", post(sync_now_handler))
        .route("/api/calendar/pull", post(pull_handler))
        .route("/api/calendar/events/{id}/created", post(event_created_handler))
        .route("/api/calendar/events/{id}/updated", post(event_updated_handler))
        .route(
            "/api/calendar/events/external/{external_id}",
            delete(event_deleted_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the router for as long as the component is up
pub struct WebhookServer {
    sync: CalendarSyncHandle,
    cancellation: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WebhookServer {
    pub fn new(sync: CalendarSyncHandle) -> Self {
        Self {
            sync,
            cancellation: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }
}

#[async_trait]
impl super::Component for WebhookServer {
    fn name(&self) -> &'static str {
        "webhook_server"
    }

    async fn init(&self, config: Arc<RwLock<Config>>, _store: Arc<dyn EventStore>) -> SyncResult<()> {
        let (port, webhook_token) = {
            let config_read = config.read().await;
            (config_read.webhook_port, config_read.webhook_token.clone())
        };

        let app = router(AppState {
            sync: self.sync.clone(),
            webhook_token,
        });

        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| component_error(&format!("Failed to bind {}: {}", addr, e)))?;
        info!("Webhook server listening on {}", addr);

        let cancel = self.cancellation.clone();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app)
                .with_graceful_shutdown(async move { cancel.cancelled().await });
            if let Err(e) = server.await {
                error!("Webhook server error: {}", e);
            }
        });
        *self.task.lock().await = Some(task);

        Ok(())
    }

    async fn shutdown(&self) -> SyncResult<()> {
        self.cancellation.cancel();
        if let Some(task) = self.task.lock().await.take() {
            task.await
                .map_err(|e| component_error(&format!("Webhook server task failed: {}", e)))?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
