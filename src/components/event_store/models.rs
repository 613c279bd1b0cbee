use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Sync bookkeeping carried on every local event.
///
/// `needs_sync` is the outbox flag: set when a local edit has not yet been
/// pushed, cleared by a successful push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadata {
    #[serde(default)]
    pub needs_sync: bool,
    #[serde(default)]
    pub created_from_google: bool,
    pub last_synced_from_google: Option<DateTime<Utc>>,
    pub last_synced_to_google: Option<DateTime<Utc>>,
    pub last_modified_locally: Option<DateTime<Utc>>,
    pub synced_at: Option<DateTime<Utc>>,
    /// Free-form values copied from the remote event
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Local calendar event record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub lab_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub all_day: bool,
    pub location: Option<String>,
    /// External Google event ID, bound after the first push or when pulled
    pub google_calendar_id: Option<String>,
    pub google_calendar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: SyncMetadata,
}

impl CalendarEvent {
    /// New locally-created event that still has to be pushed
    pub fn new_local(
        lab_id: impl Into<String>,
        title: impl Into<String>,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            lab_id: lab_id.into(),
            title: title.into(),
            description: None,
            start_date,
            end_date,
            all_day: false,
            location: None,
            google_calendar_id: None,
            google_calendar_url: None,
            created_at: now,
            updated_at: now,
            metadata: SyncMetadata::default(),
        }
    }

    /// Eligible for the outbound push: never pushed, or flagged dirty
    pub fn is_pending_push(&self) -> bool {
        self.google_calendar_id.is_none() || self.metadata.needs_sync
    }
}

/// Fields recovered from a remote event; the owning lab is resolved separately
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub google_calendar_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub all_day: bool,
    pub location: Option<String>,
    pub google_calendar_url: Option<String>,
    pub remote_updated: DateTime<Utc>,
    pub extra: HashMap<String, serde_json::Value>,
}

/// A lab (tenant) owning calendar events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lab {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Lab {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// Explicit binding of a Google calendar to the lab that owns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabCalendar {
    pub google_calendar_id: String,
    pub lab_id: String,
}

/// Kind of reconciliation recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    Bidirectional,
    Pull,
    Push,
    Webhook,
    EventCreated,
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncType::Bidirectional => "bidirectional",
            SyncType::Pull => "pull",
            SyncType::Push => "push",
            SyncType::Webhook => "webhook",
            SyncType::EventCreated => "event_created",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Error,
}

/// Counters for a pull phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PullStats {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Counters for a push phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PushStats {
    pub synced: usize,
    pub failed: usize,
}

/// One append-only audit record per reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: String,
    pub sync_type: SyncType,
    pub status: SyncStatus,
    pub duration_ms: u64,
    pub error_message: Option<String>,
    #[serde(default)]
    pub pull: PullStats,
    #[serde(default)]
    pub push: PushStats,
    pub created_at: DateTime<Utc>,
}

impl SyncLogEntry {
    pub fn success(sync_type: SyncType, duration_ms: u64, pull: PullStats, push: PushStats) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sync_type,
            status: SyncStatus::Success,
            duration_ms,
            error_message: None,
            pull,
            push,
            created_at: Utc::now(),
        }
    }

    pub fn error(sync_type: SyncType, duration_ms: u64, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sync_type,
            status: SyncStatus::Error,
            duration_ms,
            error_message: Some(message.into()),
            pull: PullStats::default(),
            push: PushStats::default(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_metadata_uses_camel_case_keys() {
        let metadata = SyncMetadata {
            created_from_google: true,
            last_synced_to_google: Some(Utc::now()),
            ..Default::default()
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["createdFromGoogle"], true);
        assert_eq!(json["needsSync"], false);
        assert!(json.get("lastSyncedToGoogle").is_some());
        assert!(json.get("extra").is_none());
    }

    #[test]
    fn test_pending_push() {
        let start = Utc::now() + Duration::days(1);
        let mut event = CalendarEvent::new_local("lab", "Standup", start, start + Duration::hours(1));
        assert!(event.is_pending_push());

        event.google_calendar_id = Some("g1".to_string());
        assert!(!event.is_pending_push());

        event.metadata.needs_sync = true;
        assert!(event.is_pending_push());
    }

    #[test]
    fn test_sync_type_display() {
        assert_eq!(SyncType::Bidirectional.to_string(), "bidirectional");
        assert_eq!(SyncType::EventCreated.to_string(), "event_created");
    }
}
