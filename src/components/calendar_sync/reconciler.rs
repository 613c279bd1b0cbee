//! Bidirectional reconciliation between the local event store and Google
//! Calendar.
//!
//! A pass pulls remote changes first and then pushes pending local events.
//! Conflicts are resolved last-write-wins on `updated` timestamps, with ties
//! going to the local copy. Entry points never return errors: failures end up
//! in the counters, the tracing output and the `sync_logs` audit trail.

use super::window::SyncWindow;
use crate::components::event_store::{
    CalendarEvent, EventDraft, EventStore, PullStats, PushStats, SyncLogEntry, SyncMetadata,
    SyncType,
};
use crate::components::google_calendar::convert::{
    convert_remote_to_local, edit_url, extract_lab_tag, LOCAL_ID_PROPERTY,
};
use crate::components::google_calendar::{RemoteCalendar, RemoteEvent};
use crate::config::Config;
use crate::error::{Error, SyncResult};
use crate::utils::time::elapsed_ms;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Tunables for a reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub push_batch_size: usize,
    pub lookback_days: i64,
    pub lookahead_days: i64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            push_batch_size: 50,
            lookback_days: 7,
            lookahead_days: 30,
        }
    }
}

impl From<&Config> for SyncSettings {
    fn from(config: &Config) -> Self {
        Self {
            push_batch_size: config.push_batch_size,
            lookback_days: config.pull_lookback_days,
            lookahead_days: config.pull_lookahead_days,
        }
    }
}

/// Result of one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Completed { pull: PullStats, push: PushStats },
    Failed(String),
    /// Another pass held the guard; nothing was done
    AlreadyRunning,
}

/// `X-Goog-Resource-State` of a push notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Sync,
    Exists,
    NotExists,
}

impl FromStr for ResourceState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "sync" => Ok(ResourceState::Sync),
            "exists" => Ok(ResourceState::Exists),
            "not_exists" => Ok(ResourceState::NotExists),
            other => Err(Error::Other(format!("Unknown resource state: {}", other))),
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceState::Sync => "sync",
            ResourceState::Exists => "exists",
            ResourceState::NotExists => "not_exists",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Acknowledged,
    Pulled(PassOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PullAction {
    Created,
    Updated,
    Skipped,
}

fn correlation_tag(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

/// Overwrite local fields with the newer remote copy
fn apply_remote(local: &mut CalendarEvent, draft: EventDraft, now: DateTime<Utc>) {
    local.title = draft.title;
    local.description = draft.description;
    local.start_date = draft.start_date;
    local.end_date = draft.end_date;
    local.all_day = draft.all_day;
    local.location = draft.location;
    if draft.google_calendar_url.is_some() {
        local.google_calendar_url = draft.google_calendar_url;
    }
    local.updated_at = draft.remote_updated;
    local.metadata.extra.extend(draft.extra);
    local.metadata.last_synced_from_google = Some(now);
    // The remote copy won, so there is nothing left to push
    local.metadata.needs_sync = false;
}

fn event_from_remote(draft: EventDraft, lab_id: String, now: DateTime<Utc>) -> CalendarEvent {
    CalendarEvent {
        id: uuid::Uuid::new_v4().to_string(),
        lab_id,
        title: draft.title,
        description: draft.description,
        start_date: draft.start_date,
        end_date: draft.end_date,
        all_day: draft.all_day,
        location: draft.location,
        google_calendar_id: Some(draft.google_calendar_id),
        google_calendar_url: draft.google_calendar_url,
        created_at: now,
        updated_at: draft.remote_updated,
        metadata: SyncMetadata {
            created_from_google: true,
            synced_at: Some(now),
            last_synced_from_google: Some(now),
            extra: draft.extra,
            ..Default::default()
        },
    }
}

/// Pull-then-push reconciler
pub struct SyncReconciler {
    store: Arc<dyn EventStore>,
    remote: Arc<dyn RemoteCalendar>,
    settings: SyncSettings,
    pass_guard: Mutex<()>,
}

impl SyncReconciler {
    pub fn new(
        store: Arc<dyn EventStore>,
        remote: Arc<dyn RemoteCalendar>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            store,
            remote,
            settings,
            pass_guard: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Run one full pull-then-push pass over the periodic window.
    ///
    /// Returns [`PassOutcome::AlreadyRunning`] without doing anything when a
    /// previous pass has not finished yet.
    pub async fn perform_bidirectional_sync(&self) -> PassOutcome {
        let Ok(_guard) = self.pass_guard.try_lock() else {
            warn!("Calendar sync pass still in flight, skipping this run");
            return PassOutcome::AlreadyRunning;
        };

        let started = Instant::now();
        let correlation = correlation_tag("sync");
        info!(correlation = %correlation, "Starting bidirectional calendar sync");

        let window = SyncWindow::periodic(
            Utc::now(),
            self.settings.lookback_days,
            self.settings.lookahead_days,
        );

        let result = match self.pull_phase(window, &correlation).await {
            Ok(pull) => self.push_phase(&correlation).await.map(|push| (pull, push)),
            Err(e) => Err(e),
        };

        self.finish(SyncType::Bidirectional, &correlation, started, result)
            .await
    }

    /// Pull a window without pushing, waiting for any running pass first
    pub async fn pull(&self, window: SyncWindow) -> PassOutcome {
        self.pull_logged(window, SyncType::Pull).await
    }

    /// Push pending local events without pulling, waiting for any running pass first
    pub async fn push(&self) -> PassOutcome {
        let _guard = self.pass_guard.lock().await;
        let started = Instant::now();
        let correlation = correlation_tag("push");

        let result = self
            .push_phase(&correlation)
            .await
            .map(|push| (PullStats::default(), push));
        self.finish(SyncType::Push, &correlation, started, result).await
    }

    /// React to a Google push notification
    pub async fn handle_webhook_notification(&self, state: ResourceState) -> WebhookOutcome {
        match state {
            ResourceState::Sync => {
                info!("Google Calendar watch channel confirmed");
                WebhookOutcome::Acknowledged
            }
            ResourceState::NotExists => {
                // Remote deletions are not propagated
                info!("Google Calendar resource removed; nothing to do");
                WebhookOutcome::Acknowledged
            }
            ResourceState::Exists => {
                let window = SyncWindow::webhook(Utc::now());
                WebhookOutcome::Pulled(self.pull_logged(window, SyncType::Webhook).await)
            }
        }
    }

    /// Push a freshly created local event right away, waiting for any running
    /// pass first so the event is never pushed twice
    pub async fn on_event_created(&self, event_id: &str) -> PushStats {
        let _guard = self.pass_guard.lock().await;
        let started = Instant::now();
        let correlation = correlation_tag("created");

        let event = match self.store.get_event(event_id).await {
            Ok(Some(event)) => event,
            Ok(None) => {
                warn!(event_id, "Created event not found, nothing to push");
                return PushStats::default();
            }
            Err(e) => {
                error!(event_id, "Failed to load created event: {}", e);
                self.record(SyncLogEntry::error(
                    SyncType::EventCreated,
                    elapsed_ms(started),
                    e.to_string(),
                ))
                .await;
                return PushStats::default();
            }
        };

        if !event.is_pending_push() || event.start_date < Utc::now() {
            debug!(event_id, "Created event is not eligible for push");
            return PushStats::default();
        }

        let pushed = self.push_event(event, &correlation).await;
        let duration_ms = elapsed_ms(started);
        if pushed {
            let stats = PushStats { synced: 1, failed: 0 };
            self.record(SyncLogEntry::success(
                SyncType::EventCreated,
                duration_ms,
                PullStats::default(),
                stats,
            ))
            .await;
            stats
        } else {
            self.record(SyncLogEntry::error(
                SyncType::EventCreated,
                duration_ms,
                format!("Failed to push event {}", event_id),
            ))
            .await;
            PushStats { synced: 0, failed: 1 }
        }
    }

    /// Flag a locally edited event for the next pass instead of pushing now.
    ///
    /// Returns whether the event was found and flagged.
    pub async fn on_event_updated(&self, event_id: &str) -> bool {
        match self.mark_needs_sync(event_id).await {
            Ok(true) => {
                debug!(event_id, "Event flagged for sync");
                true
            }
            Ok(false) => {
                warn!(event_id, "Updated event not found");
                false
            }
            Err(e) => {
                error!(event_id, "Failed to flag event for sync: {}", e);
                false
            }
        }
    }

    /// Local deletions are not propagated to Google.
    pub async fn on_event_deleted(&self, external_id: &str) {
        // TODO: settle whether deleting a lab event should also delete the
        // Google copy; until then the remote event is left untouched.
        info!(
            google_id = external_id,
            "Local event deleted; remote event left in place"
        );
    }

    async fn mark_needs_sync(&self, event_id: &str) -> SyncResult<bool> {
        let Some(mut event) = self.store.get_event(event_id).await? else {
            return Ok(false);
        };

        let now = Utc::now();
        event.metadata.needs_sync = true;
        event.metadata.last_modified_locally = Some(now);
        event.updated_at = now;
        self.store.update_event(&event).await?;
        Ok(true)
    }

    async fn pull_logged(&self, window: SyncWindow, sync_type: SyncType) -> PassOutcome {
        let _guard = self.pass_guard.lock().await;
        let started = Instant::now();
        let correlation = correlation_tag(&sync_type.to_string());

        let result = self
            .pull_phase(window, &correlation)
            .await
            .map(|pull| (pull, PushStats::default()));
        self.finish(sync_type, &correlation, started, result).await
    }

    async fn finish(
        &self,
        sync_type: SyncType,
        correlation: &str,
        started: Instant,
        result: SyncResult<(PullStats, PushStats)>,
    ) -> PassOutcome {
        let duration_ms = elapsed_ms(started);
        match result {
            Ok((pull, push)) => {
                info!(
                    correlation,
                    %sync_type,
                    duration_ms,
                    "Calendar sync finished"
                );
                self.record(SyncLogEntry::success(sync_type, duration_ms, pull, push))
                    .await;
                PassOutcome::Completed { pull, push }
            }
            Err(e) => {
                error!(correlation, %sync_type, duration_ms, "Calendar sync failed: {}", e);
                let message = e.to_string();
                self.record(SyncLogEntry::error(sync_type, duration_ms, message.clone()))
                    .await;
                PassOutcome::Failed(message)
            }
        }
    }

    async fn record(&self, entry: SyncLogEntry) {
        if let Err(e) = self.store.append_sync_log(&entry).await {
            error!("Failed to write sync log entry: {}", e);
        }
    }

    async fn pull_phase(&self, window: SyncWindow, correlation: &str) -> SyncResult<PullStats> {
        let remote_events = self
            .remote
            .fetch_remote_events(window.start, window.end, correlation)
            .await?;

        let now = Utc::now();
        let mut stats = PullStats::default();

        for remote in &remote_events {
            match self.reconcile_remote(remote, now).await {
                Ok(PullAction::Created) => stats.created += 1,
                Ok(PullAction::Updated) => stats.updated += 1,
                Ok(PullAction::Skipped) => stats.skipped += 1,
                Err(e) => {
                    warn!(
                        correlation,
                        google_id = %remote.id,
                        "Failed to reconcile remote event: {}", e
                    );
                    stats.failed += 1;
                }
            }
        }

        info!(
            correlation,
            created = stats.created,
            updated = stats.updated,
            skipped = stats.skipped,
            failed = stats.failed,
            "Pull phase finished"
        );
        Ok(stats)
    }

    async fn reconcile_remote(
        &self,
        remote: &RemoteEvent,
        now: DateTime<Utc>,
    ) -> SyncResult<PullAction> {
        let Some(draft) = convert_remote_to_local(remote, self.remote.timezone()) else {
            return Ok(PullAction::Skipped);
        };

        if let Some(mut local) = self
            .store
            .find_by_google_id(&draft.google_calendar_id)
            .await?
        {
            // Ties go to the local copy
            if draft.remote_updated <= local.updated_at {
                return Ok(PullAction::Skipped);
            }
            apply_remote(&mut local, draft, now);
            self.store.update_event(&local).await?;
            return Ok(PullAction::Updated);
        }

        if let Some(local) = self.unbound_origin(&draft).await? {
            self.bind_to_remote(local, draft, now).await?;
            return Ok(PullAction::Updated);
        }

        let Some(lab_id) = self.resolve_lab(&draft).await? else {
            debug!(google_id = %draft.google_calendar_id, "No lab for remote event, skipping");
            return Ok(PullAction::Skipped);
        };

        let event = event_from_remote(draft, lab_id, now);
        self.store.insert_event(&event).await?;
        Ok(PullAction::Created)
    }

    /// Local event a remote copy was pushed from, when that event never
    /// recorded its Google ID
    async fn unbound_origin(&self, draft: &EventDraft) -> SyncResult<Option<CalendarEvent>> {
        let Some(local_id) = draft.extra.get(LOCAL_ID_PROPERTY).and_then(|v| v.as_str()) else {
            return Ok(None);
        };
        Ok(self
            .store
            .get_event(local_id)
            .await?
            .filter(|event| event.google_calendar_id.is_none()))
    }

    async fn bind_to_remote(
        &self,
        mut local: CalendarEvent,
        draft: EventDraft,
        now: DateTime<Utc>,
    ) -> SyncResult<()> {
        info!(
            event_id = %local.id,
            google_id = %draft.google_calendar_id,
            "Binding local event to its existing Google copy"
        );
        local.google_calendar_id = Some(draft.google_calendar_id.clone());
        local.google_calendar_url = Some(edit_url(
            &draft.google_calendar_id,
            self.remote.calendar_id(),
        ));
        local.metadata.synced_at.get_or_insert(now);

        if draft.remote_updated > local.updated_at {
            apply_remote(&mut local, draft, now);
        } else {
            // Local edits are newer than the remote copy
            local.metadata.needs_sync = true;
        }
        self.store.update_event(&local).await
    }

    /// Owning lab for an inbound event: description tag, then the calendar
    /// binding, then any existing lab
    async fn resolve_lab(&self, draft: &EventDraft) -> SyncResult<Option<String>> {
        if let Some(lab_id) = draft.description.as_deref().and_then(extract_lab_tag) {
            return Ok(Some(lab_id));
        }

        if let Some(lab_id) = self
            .store
            .lab_for_calendar(self.remote.calendar_id())
            .await?
        {
            return Ok(Some(lab_id));
        }

        Ok(self.store.any_lab().await?.map(|lab| lab.id))
    }

    async fn push_phase(&self, correlation: &str) -> SyncResult<PushStats> {
        let pending = self
            .store
            .pending_push(Utc::now(), self.settings.push_batch_size)
            .await?;

        let mut stats = PushStats::default();
        for event in pending {
            if self.push_event(event, correlation).await {
                stats.synced += 1;
            } else {
                stats.failed += 1;
            }
        }

        info!(
            correlation,
            synced = stats.synced,
            failed = stats.failed,
            "Push phase finished"
        );
        Ok(stats)
    }

    /// Push one event and bind it to its remote copy. A failed push leaves the
    /// record untouched so the next pass retries it.
    async fn push_event(&self, mut event: CalendarEvent, correlation: &str) -> bool {
        let Some(pushed) = self.remote.push_local_to_remote(&event, correlation).await else {
            return false;
        };

        let now = Utc::now();
        event.google_calendar_url = Some(edit_url(&pushed.id, self.remote.calendar_id()));
        event.google_calendar_id = Some(pushed.id);
        // Matching the remote timestamp keeps the next pull from echoing the push back
        event.updated_at = pushed.updated.unwrap_or(now);
        event.metadata.needs_sync = false;
        event.metadata.last_synced_to_google = Some(now);
        event.metadata.synced_at.get_or_insert(now);

        match self.store.update_event(&event).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    correlation,
                    event_id = %event.id,
                    "Pushed event but failed to store its Google binding: {}", e
                );
                false
            }
        }
    }
}
