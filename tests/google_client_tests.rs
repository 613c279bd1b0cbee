use chrono::{Duration, TimeZone, Utc};
use lab_sync::components::event_store::CalendarEvent;
use lab_sync::components::google_calendar::{GoogleCalendarClient, RemoteCalendar, TokenManager};
use lab_sync::config::Config;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

const EVENTS_PATH: &str = "/calendars/primary/events";

async fn client_for(server: &MockServer) -> GoogleCalendarClient {
    let config = Config {
        google_calendar_id: "primary".to_string(),
        google_access_token: Some("test-token".to_string()),
        google_api_base: server.uri(),
        ..Config::default()
    };
    let token_manager = TokenManager::new(Arc::new(RwLock::new(config.clone())))
        .await
        .unwrap();
    GoogleCalendarClient::new(&config, token_manager)
}

fn event_json(id: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "status": status,
        "summary": format!("Event {}", id),
        "updated": "2025-03-01T10:00:00.000Z",
        "start": { "dateTime": "2025-03-10T09:00:00Z" },
        "end": { "dateTime": "2025-03-10T10:00:00Z" }
    })
}

#[tokio::test]
async fn test_fetch_follows_pages_and_drops_cancelled() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("GET"))
        .and(matchers::path(EVENTS_PATH))
        .and(matchers::query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [event_json("c", "confirmed")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(matchers::method("GET"))
        .and(matchers::path(EVENTS_PATH))
        .and(matchers::query_param_is_missing("pageToken"))
        .and(matchers::query_param("singleEvents", "true"))
        .and(matchers::query_param("orderBy", "startTime"))
        .and(matchers::header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [event_json("a", "confirmed"), event_json("b", "cancelled")],
            "nextPageToken": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let events = client
        .fetch_remote_events(start, Some(start + Duration::days(30)), "test")
        .await
        .unwrap();

    let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
}

#[tokio::test]
async fn test_fetch_without_upper_bound_omits_time_max() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("GET"))
        .and(matchers::path(EVENTS_PATH))
        .and(matchers::query_param_is_missing("timeMax"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let events = client
        .fetch_remote_events(Utc::now(), None, "test")
        .await
        .unwrap();
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_fetch_error_status_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("GET"))
        .and(matchers::path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .fetch_remote_events(Utc::now(), None, "test")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_push_inserts_unbound_event() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path(EVENTS_PATH))
        .and(matchers::header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "new-remote-id",
            "updated": "2025-03-01T10:00:00.000Z",
            "htmlLink": "https://www.google.com/calendar/event?eid=abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let start = Utc::now() + Duration::days(1);
    let event = CalendarEvent::new_local("lab-1", "Journal club", start, start + Duration::hours(1));

    let pushed = client
        .push_local_to_remote(&event, "test")
        .await
        .expect("push succeeds");
    assert_eq!(pushed.id, "new-remote-id");
    assert_eq!(
        pushed.updated,
        Some(Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap())
    );

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["summary"], "Journal club");
}

#[tokio::test]
async fn test_push_patches_bound_event() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("PATCH"))
        .and(matchers::path(format!("{}/existing-id", EVENTS_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "existing-id" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let start = Utc::now() + Duration::days(1);
    let mut event = CalendarEvent::new_local("lab-1", "Renamed", start, start + Duration::hours(1));
    event.google_calendar_id = Some("existing-id".to_string());

    let pushed = client.push_local_to_remote(&event, "test").await.unwrap();
    assert_eq!(pushed.id, "existing-id");
    assert!(pushed.updated.is_none());
}

#[tokio::test]
async fn test_push_failure_returns_none() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let start = Utc::now() + Duration::days(1);
    let event = CalendarEvent::new_local("lab-1", "Doomed", start, start + Duration::hours(1));

    assert!(client.push_local_to_remote(&event, "test").await.is_none());
}
