mod client;
pub mod convert;
pub mod models;
pub mod token;

pub use client::GoogleCalendarClient;
pub use models::{PushedEvent, RemoteEvent};
pub use token::TokenManager;

use crate::components::event_store::CalendarEvent;
use crate::error::SyncResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// The remote calendar the reconciler syncs against
#[async_trait]
pub trait RemoteCalendar: Send + Sync + 'static {
    /// Identifier of the remote calendar
    fn calendar_id(&self) -> &str;

    /// Timezone used to anchor all-day events
    fn timezone(&self) -> Tz;

    /// List events overlapping `[start, end)`; an open `end` means no upper bound
    async fn fetch_remote_events(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        correlation_tag: &str,
    ) -> SyncResult<Vec<RemoteEvent>>;

    /// Create or update the remote copy of `event`. `None` means the push
    /// failed and has already been logged.
    async fn push_local_to_remote(
        &self,
        event: &CalendarEvent,
        correlation_tag: &str,
    ) -> Option<PushedEvent>;
}
