use chrono::{DateTime, Duration, Utc};

/// Widest span the periodic window reaches in either direction
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Time range fetched from the remote calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    /// `None` leaves the upper bound open
    pub end: Option<DateTime<Utc>>,
}

impl SyncWindow {
    /// Periodic reconciliation: `lookback_days` back, `lookahead_days` forward.
    /// Both spans are clamped to `0..=MAX_WINDOW_DAYS`.
    pub fn periodic(now: DateTime<Utc>, lookback_days: i64, lookahead_days: i64) -> Self {
        Self {
            start: now - Duration::days(lookback_days.clamp(0, MAX_WINDOW_DAYS)),
            end: Some(now + Duration::days(lookahead_days.clamp(0, MAX_WINDOW_DAYS))),
        }
    }

    /// Manual import: the coming week
    pub fn manual(now: DateTime<Utc>) -> Self {
        Self {
            start: now,
            end: Some(now + Duration::days(7)),
        }
    }

    /// Push-notification follow-up: the last hour onward
    pub fn webhook(now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::hours(1),
            end: None,
        }
    }
}
