#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use lab_sync::components::event_store::{
    CalendarEvent, EventStore, InMemoryEventStore, Lab, LabCalendar, SyncLogEntry,
};
use lab_sync::components::google_calendar::models::EventDateTime;
use lab_sync::components::google_calendar::{PushedEvent, RemoteCalendar, RemoteEvent};
use lab_sync::components::calendar_sync::{SyncReconciler, SyncSettings};
use lab_sync::error::{google_calendar_error, store_error, SyncResult};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const CALENDAR_ID: &str = "primary";

/// Google Calendar stand-in that records every call
#[derive(Default)]
pub struct MockRemoteCalendar {
    events: Mutex<Vec<RemoteEvent>>,
    failing_pushes: Mutex<HashSet<String>>,
    pushed: Mutex<Vec<CalendarEvent>>,
    fail_fetch: AtomicBool,
    fetch_calls: AtomicUsize,
    next_id: AtomicUsize,
    fetch_delay: Mutex<Option<std::time::Duration>>,
    push_delay: Mutex<Option<std::time::Duration>>,
}

impl MockRemoteCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<RemoteEvent>) -> Self {
        let mock = Self::default();
        *mock.events.lock().unwrap() = events;
        mock
    }

    pub fn set_events(&self, events: Vec<RemoteEvent>) {
        *self.events.lock().unwrap() = events;
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Make pushes of the given local event fail
    pub fn fail_push_for(&self, event_id: &str) {
        self.failing_pushes
            .lock()
            .unwrap()
            .insert(event_id.to_string());
    }

    /// Hold every fetch for `delay` before answering
    pub fn delay_fetch(&self, delay: std::time::Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    /// Hold every push for `delay` before answering
    pub fn delay_push(&self, delay: std::time::Duration) {
        *self.push_delay.lock().unwrap() = Some(delay);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn pushed(&self) -> Vec<CalendarEvent> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteCalendar for MockRemoteCalendar {
    fn calendar_id(&self) -> &str {
        CALENDAR_ID
    }

    fn timezone(&self) -> Tz {
        chrono_tz::UTC
    }

    async fn fetch_remote_events(
        &self,
        _start: DateTime<Utc>,
        _end: Option<DateTime<Utc>>,
        _correlation_tag: &str,
    ) -> SyncResult<Vec<RemoteEvent>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(google_calendar_error("Failed to fetch events: HTTP 503"));
        }
        Ok(self.events.lock().unwrap().clone())
    }

    async fn push_local_to_remote(
        &self,
        event: &CalendarEvent,
        _correlation_tag: &str,
    ) -> Option<PushedEvent> {
        let delay = *self.push_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_pushes.lock().unwrap().contains(&event.id) {
            return None;
        }

        self.pushed.lock().unwrap().push(event.clone());
        let id = match &event.google_calendar_id {
            Some(id) => id.clone(),
            None => format!("remote-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1),
        };
        Some(PushedEvent {
            id,
            updated: Some(Utc::now()),
            html_link: None,
        })
    }
}

/// Store whose event and lab operations always fail; the audit log still works
#[derive(Default)]
pub struct FailingStore {
    logs: Mutex<Vec<SyncLogEntry>>,
}

impl FailingStore {
    pub fn logs(&self) -> Vec<SyncLogEntry> {
        self.logs.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventStore for FailingStore {
    async fn get_event(&self, _id: &str) -> SyncResult<Option<CalendarEvent>> {
        Err(store_error("connection refused"))
    }

    async fn find_by_google_id(&self, _google_id: &str) -> SyncResult<Option<CalendarEvent>> {
        Err(store_error("connection refused"))
    }

    async fn insert_event(&self, _event: &CalendarEvent) -> SyncResult<()> {
        Err(store_error("connection refused"))
    }

    async fn update_event(&self, _event: &CalendarEvent) -> SyncResult<()> {
        Err(store_error("connection refused"))
    }

    async fn pending_push(
        &self,
        _from: DateTime<Utc>,
        _limit: usize,
    ) -> SyncResult<Vec<CalendarEvent>> {
        Err(store_error("connection refused"))
    }

    async fn insert_lab(&self, _lab: &Lab) -> SyncResult<()> {
        Err(store_error("connection refused"))
    }

    async fn any_lab(&self) -> SyncResult<Option<Lab>> {
        Err(store_error("connection refused"))
    }

    async fn bind_calendar(&self, _mapping: &LabCalendar) -> SyncResult<()> {
        Err(store_error("connection refused"))
    }

    async fn lab_for_calendar(&self, _google_calendar_id: &str) -> SyncResult<Option<String>> {
        Err(store_error("connection refused"))
    }

    async fn append_sync_log(&self, entry: &SyncLogEntry) -> SyncResult<()> {
        self.logs.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn recent_sync_logs(&self, limit: usize) -> SyncResult<Vec<SyncLogEntry>> {
        let logs = self.logs.lock().unwrap();
        Ok(logs.iter().rev().take(limit).cloned().collect())
    }
}

/// A timed remote event starting `start` and lasting an hour
pub fn remote_event(
    id: &str,
    summary: &str,
    description: Option<&str>,
    start: DateTime<Utc>,
    updated: DateTime<Utc>,
) -> RemoteEvent {
    RemoteEvent {
        id: id.to_string(),
        summary: Some(summary.to_string()),
        description: description.map(str::to_string),
        status: Some("confirmed".to_string()),
        updated: Some(updated.to_rfc3339()),
        start: Some(EventDateTime {
            date_time: Some(start.to_rfc3339()),
            ..Default::default()
        }),
        end: Some(EventDateTime {
            date_time: Some((start + Duration::hours(1)).to_rfc3339()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A local event that has already been bound to `google_id`
pub fn bound_event(lab_id: &str, google_id: &str, start: DateTime<Utc>, updated_at: DateTime<Utc>) -> CalendarEvent {
    let mut event = CalendarEvent::new_local(lab_id, "Local title", start, start + Duration::hours(1));
    event.google_calendar_id = Some(google_id.to_string());
    event.updated_at = updated_at;
    event
}

pub fn reconciler(
    store: Arc<dyn EventStore>,
    remote: Arc<dyn RemoteCalendar>,
) -> SyncReconciler {
    SyncReconciler::new(store, remote, SyncSettings::default())
}

pub async fn store_with_lab(lab_id: &str) -> Arc<InMemoryEventStore> {
    let store = Arc::new(InMemoryEventStore::new());
    store.insert_lab(&Lab::new(lab_id, "Test lab")).await.unwrap();
    store
}
