//! Local persistence for calendar events, labs and the sync audit log.
//!
//! The reconciler only talks to the [`EventStore`] trait. Production runs
//! against Redis, tests and local development use the in-memory store.

mod memory;
pub mod models;
mod redis_store;

pub use memory::InMemoryEventStore;
pub use models::{
    CalendarEvent, EventDraft, Lab, LabCalendar, PullStats, PushStats, SyncLogEntry, SyncMetadata,
    SyncStatus, SyncType,
};
pub use redis_store::RedisEventStore;

use crate::error::SyncResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Storage operations needed by the sync subsystem
#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Get an event by its local ID
    async fn get_event(&self, id: &str) -> SyncResult<Option<CalendarEvent>>;

    /// Get the event bound to a Google event ID
    async fn find_by_google_id(&self, google_id: &str) -> SyncResult<Option<CalendarEvent>>;

    /// Insert a new event
    async fn insert_event(&self, event: &CalendarEvent) -> SyncResult<()>;

    /// Overwrite an existing event
    async fn update_event(&self, event: &CalendarEvent) -> SyncResult<()>;

    /// Events that still need an outbound push and start at or after `from`,
    /// ordered by start, at most `limit` of them
    async fn pending_push(
        &self,
        from: DateTime<Utc>,
        limit: usize,
    ) -> SyncResult<Vec<CalendarEvent>>;

    /// Insert or replace a lab
    async fn insert_lab(&self, lab: &Lab) -> SyncResult<()>;

    /// Any existing lab, used as a last-resort owner for inbound events
    async fn any_lab(&self) -> SyncResult<Option<Lab>>;

    /// Record which lab owns a Google calendar
    async fn bind_calendar(&self, mapping: &LabCalendar) -> SyncResult<()>;

    /// Lab bound to a Google calendar, if any
    async fn lab_for_calendar(&self, google_calendar_id: &str) -> SyncResult<Option<String>>;

    /// Append an audit record
    async fn append_sync_log(&self, entry: &SyncLogEntry) -> SyncResult<()>;

    /// Most recent audit records, newest first
    async fn recent_sync_logs(&self, limit: usize) -> SyncResult<Vec<SyncLogEntry>>;
}
