mod common;

use async_trait::async_trait;
use common::{store_with_lab, MockRemoteCalendar};
use lab_sync::components::calendar_sync::{CalendarSync, PassOutcome};
use lab_sync::components::event_store::{EventStore, InMemoryEventStore};
use lab_sync::components::{Component, ComponentManager};
use lab_sync::config::Config;
use lab_sync::error::{component_error, SyncResult};
use lab_sync::startup::build_components;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

/// Smoke test to verify the config defaults
#[tokio::test]
async fn test_config_defaults() {
    let config = Config::default();

    assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
    assert_eq!(config.sync_interval_minutes, 5);
    assert_eq!(config.push_batch_size, 50);
    assert!(config.google_access_token.is_none());
}

/// Component that records its lifecycle calls
struct RecordingComponent {
    name: &'static str,
    fail_init: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Component for RecordingComponent {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn init(&self, _config: Arc<RwLock<Config>>, _store: Arc<dyn EventStore>) -> SyncResult<()> {
        self.calls.lock().unwrap().push(format!("init:{}", self.name));
        if self.fail_init {
            return Err(component_error("boom"));
        }
        Ok(())
    }

    async fn shutdown(&self) -> SyncResult<()> {
        self.calls.lock().unwrap().push(format!("shutdown:{}", self.name));
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Test for component initialization order using the real ComponentManager
#[tokio::test]
async fn test_component_lifecycle_order() {
    let calls = Arc::new(Mutex::new(Vec::new()));

    let mut config = Config::default();
    config.components.insert("first".to_string(), true);
    config.components.insert("second".to_string(), true);
    config.components.insert("disabled".to_string(), false);
    let config = Arc::new(RwLock::new(config));

    let mut component_manager = ComponentManager::new(Arc::clone(&config));
    for (name, fail_init) in [("first", true), ("disabled", false), ("second", false)] {
        component_manager.register(RecordingComponent {
            name,
            fail_init,
            calls: Arc::clone(&calls),
        });
    }

    // A failing component does not stop the others
    let store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
    component_manager.init_all(store).await.unwrap();
    component_manager.shutdown_all().await.unwrap();

    let calls = calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![
            "init:first",
            "init:second",
            "shutdown:second",
            "shutdown:disabled",
            "shutdown:first",
        ]
    );

    assert!(component_manager.get_component_by_name("second").is_some());
    assert!(component_manager.get_component_by_name("missing").is_none());
    assert!(component_manager.get_component::<RecordingComponent>().is_some());
}

#[tokio::test]
async fn test_service_registers_every_component() {
    let config = Arc::new(RwLock::new(Config::default()));
    let component_manager = build_components(config);

    assert!(component_manager.get_component_by_name("calendar_sync").is_some());
    assert!(component_manager.get_component::<CalendarSync>().is_some());
    #[cfg(feature = "webhook-server")]
    assert!(component_manager.get_component_by_name("webhook_server").is_some());
}

#[tokio::test]
async fn test_handle_commands_queue_until_init() {
    let store = store_with_lab("lab-1").await;
    let remote = Arc::new(MockRemoteCalendar::new());
    let sync = CalendarSync::with_remote(remote.clone());
    let handle = sync.handle();

    // Sent before the actor exists; answered once it starts
    let pending = tokio::spawn(async move { handle.sync_now().await });

    let config = Config {
        sync_interval_minutes: 0,
        ..Config::default()
    };
    sync.init(Arc::new(RwLock::new(config)), store).await.unwrap();
    assert!(!sync.is_scheduler_running().await);
    assert!(sync.reconciler().await.is_some());

    let outcome = pending.await.unwrap().unwrap();
    assert!(matches!(outcome, PassOutcome::Completed { .. }));
    assert_eq!(remote.fetch_calls(), 1);

    sync.shutdown().await.unwrap();
    // The actor is gone, so the handle reports a mailbox error
    assert!(sync.handle().sync_now().await.is_err());
}

#[tokio::test]
async fn test_calendar_sync_rejects_second_init() {
    let store = store_with_lab("lab-1").await;
    let sync = CalendarSync::with_remote(Arc::new(MockRemoteCalendar::new()));
    let config = Arc::new(RwLock::new(Config {
        sync_interval_minutes: 0,
        ..Config::default()
    }));

    sync.init(Arc::clone(&config), store.clone()).await.unwrap();
    assert!(sync.init(config, store).await.is_err());
    sync.shutdown().await.unwrap();
}
