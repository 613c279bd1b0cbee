use super::models::{CalendarEvent, Lab, LabCalendar, SyncLogEntry};
use super::EventStore;
use crate::error::{store_error, SyncResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client as RedisClient};
use tracing::info;

// Redis key constants
pub mod keys {
    pub const EVENT_PREFIX: &str = "calendar_events:";
    pub const EVENT_INDEX: &str = "calendar_events:index";
    pub const GOOGLE_ID_PREFIX: &str = "calendar_events:google:";
    pub const LABS: &str = "labs";
    pub const LAB_CALENDARS: &str = "lab_calendars";
    pub const SYNC_LOGS: &str = "sync_logs";
}

fn event_key(id: &str) -> String {
    format!("{}{}", keys::EVENT_PREFIX, id)
}

fn google_key(google_id: &str) -> String {
    format!("{}{}", keys::GOOGLE_ID_PREFIX, google_id)
}

/// Redis-backed event store.
///
/// Events are stored as JSON under `calendar_events:<id>` with a set of all
/// IDs and a `google id -> local id` pointer per bound event.
#[derive(Clone)]
pub struct RedisEventStore {
    conn: ConnectionManager,
}

impl RedisEventStore {
    /// Connect to Redis at `redis_url`
    pub async fn connect(redis_url: &str) -> SyncResult<Self> {
        info!("Connecting to Redis at {}", redis_url);
        let client = RedisClient::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    async fn load_event(&self, key: &str) -> SyncResult<Option<CalendarEvent>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        raw.map(|json| serde_json::from_str(&json).map_err(Into::into))
            .transpose()
    }

    async fn load_all_events(&self) -> SyncResult<Vec<CalendarEvent>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.smembers(keys::EVENT_INDEX).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let event_keys: Vec<String> = ids.iter().map(|id| event_key(id)).collect();
        let raw: Vec<Option<String>> = conn.mget(&event_keys).await?;

        let mut events = Vec::with_capacity(raw.len());
        for json in raw.into_iter().flatten() {
            events.push(serde_json::from_str(&json)?);
        }
        Ok(events)
    }
}

#[async_trait]
impl EventStore for RedisEventStore {
    async fn get_event(&self, id: &str) -> SyncResult<Option<CalendarEvent>> {
        self.load_event(&event_key(id)).await
    }

    async fn find_by_google_id(&self, google_id: &str) -> SyncResult<Option<CalendarEvent>> {
        let mut conn = self.conn.clone();
        let local_id: Option<String> = conn.get(google_key(google_id)).await?;
        match local_id {
            Some(id) => self.load_event(&event_key(&id)).await,
            None => Ok(None),
        }
    }

    async fn insert_event(&self, event: &CalendarEvent) -> SyncResult<()> {
        let mut conn = self.conn.clone();
        let key = event_key(&event.id);

        let exists: bool = conn.exists(&key).await?;
        if exists {
            return Err(store_error(&format!("Event {} already exists", event.id)));
        }

        let json = serde_json::to_string(event)?;
        let mut pipe = redis::pipe();
        pipe.atomic()
            .set(&key, json)
            .ignore()
            .sadd(keys::EVENT_INDEX, &event.id)
            .ignore();
        if let Some(google_id) = &event.google_calendar_id {
            pipe.set(google_key(google_id), &event.id).ignore();
        }
        pipe.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn update_event(&self, event: &CalendarEvent) -> SyncResult<()> {
        let key = event_key(&event.id);
        let previous = self
            .load_event(&key)
            .await?
            .ok_or_else(|| store_error(&format!("Event {} not found", event.id)))?;

        let json = serde_json::to_string(event)?;
        let mut pipe = redis::pipe();
        pipe.atomic().set(&key, json).ignore();

        if previous.google_calendar_id != event.google_calendar_id {
            if let Some(old) = &previous.google_calendar_id {
                pipe.del(google_key(old)).ignore();
            }
            if let Some(new) = &event.google_calendar_id {
                pipe.set(google_key(new), &event.id).ignore();
            }
        }

        let mut conn = self.conn.clone();
        pipe.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn pending_push(
        &self,
        from: DateTime<Utc>,
        limit: usize,
    ) -> SyncResult<Vec<CalendarEvent>> {
        let mut pending: Vec<CalendarEvent> = self
            .load_all_events()
            .await?
            .into_iter()
            .filter(|e| e.is_pending_push() && e.start_date >= from)
            .collect();
        pending.sort_by(|a, b| a.start_date.cmp(&b.start_date).then_with(|| a.id.cmp(&b.id)));
        pending.truncate(limit);
        Ok(pending)
    }

    async fn insert_lab(&self, lab: &Lab) -> SyncResult<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(lab)?;
        let _: () = conn.hset(keys::LABS, &lab.id, json).await?;
        Ok(())
    }

    async fn any_lab(&self) -> SyncResult<Option<Lab>> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.hvals(keys::LABS).await?;
        let mut labs = Vec::with_capacity(raw.len());
        for json in raw {
            labs.push(serde_json::from_str::<Lab>(&json)?);
        }
        labs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(labs.into_iter().next())
    }

    async fn bind_calendar(&self, mapping: &LabCalendar) -> SyncResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .hset(keys::LAB_CALENDARS, &mapping.google_calendar_id, &mapping.lab_id)
            .await?;
        Ok(())
    }

    async fn lab_for_calendar(&self, google_calendar_id: &str) -> SyncResult<Option<String>> {
        let mut conn = self.conn.clone();
        let lab_id: Option<String> = conn.hget(keys::LAB_CALENDARS, google_calendar_id).await?;
        Ok(lab_id)
    }

    async fn append_sync_log(&self, entry: &SyncLogEntry) -> SyncResult<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(entry)?;
        let _: () = conn.lpush(keys::SYNC_LOGS, json).await?;
        Ok(())
    }

    async fn recent_sync_logs(&self, limit: usize) -> SyncResult<Vec<SyncLogEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let stop = isize::try_from(limit).unwrap_or(isize::MAX) - 1;
        let raw: Vec<String> = conn.lrange(keys::SYNC_LOGS, 0, stop).await?;
        let mut logs = Vec::with_capacity(raw.len());
        for json in raw {
            logs.push(serde_json::from_str(&json)?);
        }
        Ok(logs)
    }
}
