//! Mapping between Google events and local calendar events.

use super::models::{EventDateTime, ExtendedProperties, GoogleEventBody, RemoteEvent};
use crate::components::event_store::{CalendarEvent, EventDraft};
use crate::utils::time::{local_date, midnight_in_tz, parse_date, parse_rfc3339_utc};
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

/// Prefix of the lab tag embedded in event descriptions
pub const LAB_TAG_PREFIX: &str = "lab_id:";
/// Private extended property carrying the local event ID
pub const LOCAL_ID_PROPERTY: &str = "labSyncEventId";

lazy_static! {
    static ref LAB_TAG: Regex =
        Regex::new(r"lab_id:\s*([A-Za-z0-9][A-Za-z0-9_-]*)").expect("lab tag pattern is valid");
}

/// Extract the lab ID from a `lab_id:<id>` tag in free text
pub fn extract_lab_tag(text: &str) -> Option<String> {
    LAB_TAG
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Description with the lab tag appended unless one is already present
pub fn with_lab_tag(description: Option<&str>, lab_id: &str) -> String {
    match description.map(str::trim).filter(|d| !d.is_empty()) {
        Some(text) if extract_lab_tag(text).is_some() => text.to_string(),
        Some(text) => format!("{}\n\n{}{}", text, LAB_TAG_PREFIX, lab_id),
        None => format!("{}{}", LAB_TAG_PREFIX, lab_id),
    }
}

/// Deterministic Google Calendar edit link for an event
pub fn edit_url(event_id: &str, calendar_id: &str) -> String {
    let eid = STANDARD_NO_PAD.encode(format!("{} {}", event_id, calendar_id));
    format!("https://calendar.google.com/calendar/event?eid={}", eid)
}

fn parse_event_time(time: &EventDateTime, tz: Tz) -> Option<(DateTime<Utc>, bool)> {
    if let Some(date_time) = &time.date_time {
        return parse_rfc3339_utc(date_time).map(|dt| (dt, false));
    }
    let date = parse_date(time.date.as_deref()?)?;
    midnight_in_tz(date, tz).map(|dt| (dt, true))
}

/// Convert a Google event into local fields.
///
/// Returns `None` when the event cannot be mapped: blank title, missing or
/// malformed start/end/updated, or an end before the start.
pub fn convert_remote_to_local(remote: &RemoteEvent, tz: Tz) -> Option<EventDraft> {
    if remote.id.trim().is_empty() {
        return None;
    }

    let title = remote
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())?
        .to_string();

    let (start_date, start_all_day) = parse_event_time(remote.start.as_ref()?, tz)?;
    let (end_date, _) = parse_event_time(remote.end.as_ref()?, tz)?;
    if end_date < start_date {
        return None;
    }

    let remote_updated = parse_rfc3339_utc(remote.updated.as_deref()?)?;

    let extra: HashMap<String, serde_json::Value> = remote
        .extended_properties
        .as_ref()
        .map(|props| {
            props
                .private
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect()
        })
        .unwrap_or_default();

    Some(EventDraft {
        google_calendar_id: remote.id.clone(),
        title,
        description: remote.description.clone().filter(|d| !d.trim().is_empty()),
        start_date,
        end_date,
        all_day: start_all_day,
        location: remote.location.clone().filter(|l| !l.trim().is_empty()),
        google_calendar_url: remote.html_link.clone(),
        remote_updated,
        extra,
    })
}

/// Build the Google request body for a local event
pub fn local_to_remote(event: &CalendarEvent, tz: Tz) -> GoogleEventBody {
    let (start, end) = if event.all_day {
        let start_day = local_date(event.start_date, tz);
        let mut end_day = local_date(event.end_date, tz);
        // Google all-day end dates are exclusive
        if end_day <= start_day {
            end_day = start_day + Duration::days(1);
        }
        (
            EventDateTime {
                date: Some(start_day.format("%Y-%m-%d").to_string()),
                ..Default::default()
            },
            EventDateTime {
                date: Some(end_day.format("%Y-%m-%d").to_string()),
                ..Default::default()
            },
        )
    } else {
        (
            EventDateTime {
                date_time: Some(event.start_date.to_rfc3339()),
                ..Default::default()
            },
            EventDateTime {
                date_time: Some(event.end_date.to_rfc3339()),
                ..Default::default()
            },
        )
    };

    let mut private = HashMap::new();
    private.insert(LOCAL_ID_PROPERTY.to_string(), event.id.clone());

    GoogleEventBody {
        summary: event.title.clone(),
        description: Some(with_lab_tag(event.description.as_deref(), &event.lab_id)),
        location: event.location.clone(),
        start,
        end,
        extended_properties: ExtendedProperties { private },
    }
}
