use super::convert::local_to_remote;
use super::models::{EventsPage, PushedEvent, RemoteEvent};
use super::token::TokenManager;
use super::RemoteCalendar;
use crate::components::event_store::CalendarEvent;
use crate::config::Config;
use crate::error::{google_calendar_error, SyncResult};
use crate::utils::time::parse_rfc3339_utc;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use reqwest::{Client, Response};
use tracing::{debug, warn};
use url::Url;

/// Page size requested from `events.list`
const PAGE_SIZE: &str = "250";
/// Upper bound on pages followed for one window
const MAX_PAGES: usize = 20;

/// Google Calendar v3 REST client
#[derive(Clone)]
pub struct GoogleCalendarClient {
    client: Client,
    token_manager: TokenManager,
    api_base: String,
    calendar_id: String,
    tz: Tz,
}

impl GoogleCalendarClient {
    pub fn new(config: &Config, token_manager: TokenManager) -> Self {
        Self {
            client: Client::new(),
            token_manager,
            api_base: config.google_api_base.trim_end_matches('/').to_string(),
            calendar_id: config.google_calendar_id.clone(),
            tz: config.tz(),
        }
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(&self.calendar_id)
        )
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_url(), urlencoding::encode(event_id))
    }

    async fn check_status(response: Response, action: &str) -> SyncResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Could not read error response".to_string());
        Err(google_calendar_error(&format!(
            "Failed to {}: HTTP {} - {}",
            action, status, error_body
        )))
    }

    async fn fetch_page(
        &self,
        access_token: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        page_token: Option<&str>,
    ) -> SyncResult<EventsPage> {
        let mut url = Url::parse(&self.events_url())
            .map_err(|e| google_calendar_error(&format!("Failed to parse URL: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("timeMin", &start.to_rfc3339());
            if let Some(end) = end {
                query.append_pair("timeMax", &end.to_rfc3339());
            }
            query.append_pair("singleEvents", "true");
            query.append_pair("orderBy", "startTime");
            query.append_pair("maxResults", PAGE_SIZE);
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to fetch events: {}", e)))?;

        let response = Self::check_status(response, "fetch events").await?;
        response
            .json::<EventsPage>()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to parse events response: {}", e)))
    }

    async fn try_push(&self, event: &CalendarEvent) -> SyncResult<PushedEvent> {
        let access_token = self.token_manager.get_access_token().await?;
        let body = local_to_remote(event, self.tz);

        let request = match &event.google_calendar_id {
            Some(google_id) => self.client.patch(self.event_url(google_id)),
            None => self.client.post(self.events_url()),
        };

        let response = request
            .bearer_auth(&access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to push event: {}", e)))?;

        let response = Self::check_status(response, "push event").await?;
        let created: RemoteEvent = response
            .json()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to parse push response: {}", e)))?;

        if created.id.is_empty() {
            return Err(google_calendar_error("Push response carried no event id"));
        }

        Ok(PushedEvent {
            updated: created.updated.as_deref().and_then(parse_rfc3339_utc),
            html_link: created.html_link,
            id: created.id,
        })
    }
}

#[async_trait]
impl RemoteCalendar for GoogleCalendarClient {
    fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    fn timezone(&self) -> Tz {
        self.tz
    }

    async fn fetch_remote_events(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        correlation_tag: &str,
    ) -> SyncResult<Vec<RemoteEvent>> {
        let access_token = self.token_manager.get_access_token().await?;

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let page = self
                .fetch_page(&access_token, start, end, page_token.as_deref())
                .await?;
            events.extend(page.items.into_iter().filter(|e| !e.is_cancelled()));

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        if page_token.is_some() {
            warn!(
                correlation = correlation_tag,
                "Stopped following pagination after {} pages", MAX_PAGES
            );
        }

        debug!(
            correlation = correlation_tag,
            count = events.len(),
            "Fetched remote events"
        );
        Ok(events)
    }

    async fn push_local_to_remote(
        &self,
        event: &CalendarEvent,
        correlation_tag: &str,
    ) -> Option<PushedEvent> {
        match self.try_push(event).await {
            Ok(pushed) => {
                debug!(
                    correlation = correlation_tag,
                    event_id = %event.id,
                    google_id = %pushed.id,
                    "Pushed event to Google Calendar"
                );
                Some(pushed)
            }
            Err(e) => {
                warn!(
                    correlation = correlation_tag,
                    event_id = %event.id,
                    "Failed to push event to Google Calendar: {}", e
                );
                None
            }
        }
    }
}
