use crate::components::event_store::{EventStore, InMemoryEventStore, RedisEventStore};
use crate::components::{CalendarSync, ComponentManager};
use crate::config::Config;
use crate::error::Error;
use crate::shutdown;
use std::sync::Arc;
use tokio::sync::{oneshot, RwLock};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=warn")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load and initialize the application config
pub async fn load_config() -> miette::Result<Arc<RwLock<Config>>> {
    match Config::load() {
        Ok(config) => Ok(Arc::new(RwLock::new(config))),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Connect to Redis, falling back to an in-memory store when it is unreachable
pub async fn connect_store(redis_url: &str) -> Arc<dyn EventStore> {
    match RedisEventStore::connect(redis_url).await {
        Ok(store) => {
            info!("Connected to Redis successfully");
            Arc::new(store)
        }
        Err(e) => {
            error!("Failed to connect to Redis: {}", e);
            info!("Using in-memory event store as fallback");
            Arc::new(InMemoryEventStore::default())
        }
    }
}

/// Build the component manager with every component of the service
pub fn build_components(config: Arc<RwLock<Config>>) -> ComponentManager {
    let mut component_manager = ComponentManager::new(config);

    let calendar_sync = CalendarSync::new();
    #[cfg(feature = "webhook-server")]
    let sync_handle = calendar_sync.handle();

    component_manager.register(calendar_sync);

    #[cfg(feature = "webhook-server")]
    component_manager.register(crate::components::webhook::WebhookServer::new(sync_handle));

    component_manager
}

/// Start all components and run until a shutdown signal arrives
pub async fn start_service(config: Arc<RwLock<Config>>) -> miette::Result<()> {
    let redis_url = config.read().await.redis_url.clone();
    let store = connect_store(&redis_url).await;

    let component_manager = Arc::new(build_components(Arc::clone(&config)));
    component_manager.init_all(store).await?;

    // Create shutdown channel
    let (shutdown_send, shutdown_recv) = oneshot::channel();

    let shutdown_components = Arc::clone(&component_manager);
    tokio::spawn(async move {
        shutdown::handle_signals(shutdown_send, shutdown_components).await;
    });

    if shutdown_recv.await.is_err() {
        error!("Shutdown handler ended without signalling");
    }
    info!("Lab Sync stopped");
    Ok(())
}
