use lab_sync::components::google_calendar::token::{StoredToken, TokenManager};
use lab_sync::config::Config;
use lab_sync::error::{other_error, SyncResult};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

const REDIRECT_URI: &str = "http://localhost:8080";
const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[tokio::main]
async fn main() -> SyncResult<()> {
    // Load configuration
    let config = Config::load()?;
    let (client_id, client_secret, token_url) = (
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.google_token_url.clone(),
    );
    let token_manager = TokenManager::new(Arc::new(RwLock::new(config))).await?;

    // Random state to match the callback against this request
    let state = uuid::Uuid::new_v4().to_string();

    let auth_url = format!(
        "https://accounts.google.com/o/oauth2/v2/auth?\
        client_id={}&\
        redirect_uri={}&\
        response_type=code&\
        access_type=offline&\
        prompt=consent&\
        scope={}&\
        state={}",
        urlencoding::encode(&client_id),
        urlencoding::encode(REDIRECT_URI),
        urlencoding::encode(CALENDAR_SCOPE),
        state
    );

    println!("Opening browser for Google Calendar authorization...");
    if webbrowser::open(&auth_url).is_err() {
        println!("Could not open a browser. Visit this URL instead:\n{}", auth_url);
    }

    // Start local server to receive the callback
    let server = tiny_http::Server::http("0.0.0.0:8080")
        .map_err(|e| other_error(&format!("Failed to start callback server: {}", e)))?;
    println!("Waiting for authorization callback...");

    let request = server.recv()?;
    let callback = Url::parse(&format!("{}{}", REDIRECT_URI, request.url()))
        .map_err(|e| other_error(&format!("Invalid callback URL: {}", e)))?;

    let param = |name: &str| {
        callback
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    };

    if param("state").as_deref() != Some(state.as_str()) {
        return Err(other_error("Callback state does not match the request"));
    }
    let code = param("code").ok_or_else(|| other_error("No authorization code found in callback"))?;

    // Exchange code for tokens
    let response = reqwest::Client::new()
        .post(&token_url)
        .form(&[
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("code", code.as_str()),
            ("redirect_uri", REDIRECT_URI),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        let error_text = response.text().await?;
        return Err(other_error(&format!("Failed to get token: {}", error_text)));
    }

    let body: TokenResponse = response.json().await?;
    let token = StoredToken {
        access_token: body.access_token,
        refresh_token: body.refresh_token,
        expires_at: chrono::Utc::now().timestamp() + body.expires_in.unwrap_or(3600),
    };

    token_manager.set_token(&token).await?;

    request.respond(tiny_http::Response::from_string(
        "Authorization successful! You can close this window.",
    ))?;

    println!("Token successfully saved to Redis!");
    Ok(())
}
