use super::models::{CalendarEvent, Lab, LabCalendar, SyncLogEntry};
use super::EventStore;
use crate::error::{store_error, SyncResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// In-memory implementation of the event store (for testing and local runs)
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: RwLock<HashMap<String, CalendarEvent>>,
    labs: RwLock<BTreeMap<String, Lab>>,
    calendars: RwLock<HashMap<String, String>>,
    sync_logs: RwLock<Vec<SyncLogEntry>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored event
    pub async fn all_events(&self) -> Vec<CalendarEvent> {
        self.events.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn get_event(&self, id: &str) -> SyncResult<Option<CalendarEvent>> {
        Ok(self.events.read().await.get(id).cloned())
    }

    async fn find_by_google_id(&self, google_id: &str) -> SyncResult<Option<CalendarEvent>> {
        let events = self.events.read().await;
        Ok(events
            .values()
            .find(|e| e.google_calendar_id.as_deref() == Some(google_id))
            .cloned())
    }

    async fn insert_event(&self, event: &CalendarEvent) -> SyncResult<()> {
        let mut events = self.events.write().await;
        if events.contains_key(&event.id) {
            return Err(store_error(&format!("Event {} already exists", event.id)));
        }
        events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn update_event(&self, event: &CalendarEvent) -> SyncResult<()> {
        let mut events = self.events.write().await;
        match events.get_mut(&event.id) {
            Some(existing) => {
                *existing = event.clone();
                Ok(())
            }
            None => Err(store_error(&format!("Event {} not found", event.id))),
        }
    }

    async fn pending_push(
        &self,
        from: DateTime<Utc>,
        limit: usize,
    ) -> SyncResult<Vec<CalendarEvent>> {
        let events = self.events.read().await;
        let mut pending: Vec<CalendarEvent> = events
            .values()
            .filter(|e| e.is_pending_push() && e.start_date >= from)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.start_date.cmp(&b.start_date).then_with(|| a.id.cmp(&b.id)));
        pending.truncate(limit);
        Ok(pending)
    }

    async fn insert_lab(&self, lab: &Lab) -> SyncResult<()> {
        self.labs.write().await.insert(lab.id.clone(), lab.clone());
        Ok(())
    }

    async fn any_lab(&self) -> SyncResult<Option<Lab>> {
        Ok(self.labs.read().await.values().next().cloned())
    }

    async fn bind_calendar(&self, mapping: &LabCalendar) -> SyncResult<()> {
        self.calendars
            .write()
            .await
            .insert(mapping.google_calendar_id.clone(), mapping.lab_id.clone());
        Ok(())
    }

    async fn lab_for_calendar(&self, google_calendar_id: &str) -> SyncResult<Option<String>> {
        Ok(self.calendars.read().await.get(google_calendar_id).cloned())
    }

    async fn append_sync_log(&self, entry: &SyncLogEntry) -> SyncResult<()> {
        self.sync_logs.write().await.push(entry.clone());
        Ok(())
    }

    async fn recent_sync_logs(&self, limit: usize) -> SyncResult<Vec<SyncLogEntry>> {
        let logs = self.sync_logs.read().await;
        Ok(logs.iter().rev().take(limit).cloned().collect())
    }
}
