use crate::config::Config;
use crate::error::{google_calendar_error, SyncResult};
use chrono::Utc;
use redis::{AsyncCommands, Client as RedisClient};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Redis key holding the OAuth token
pub const TOKEN_KEY: &str = "google_calendar_token";

/// Seconds before expiry at which a token is already treated as expired
const EXPIRY_MARGIN_SECS: i64 = 60;

/// OAuth token as persisted in Redis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds)
    pub expires_at: i64,
}

impl StoredToken {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at - EXPIRY_MARGIN_SECS <= now
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

#[derive(Clone)]
enum TokenSource {
    /// Access token supplied directly through configuration
    Static(String),
    Redis(RedisClient),
}

/// Hands out Google access tokens, refreshing them when they expire
#[derive(Clone)]
pub struct TokenManager {
    config: Arc<RwLock<Config>>,
    source: TokenSource,
    client: Client,
}

impl TokenManager {
    pub async fn new(config: Arc<RwLock<Config>>) -> SyncResult<Self> {
        let source = {
            let config_read = config.read().await;
            match &config_read.google_access_token {
                Some(token) => TokenSource::Static(token.clone()),
                None => TokenSource::Redis(RedisClient::open(config_read.redis_url.as_str())?),
            }
        };

        Ok(Self {
            config,
            source,
            client: Client::new(),
        })
    }

    /// Get a valid access token, refreshing it if needed
    pub async fn get_access_token(&self) -> SyncResult<String> {
        let redis = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Redis(redis) => redis,
        };

        let mut conn = redis.get_multiplexed_async_connection().await.map_err(|e| {
            google_calendar_error(&format!("Failed to connect to Redis: {}", e))
        })?;

        let raw: Option<String> = conn
            .get(TOKEN_KEY)
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to read token from Redis: {}", e)))?;

        let token: StoredToken = match raw {
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                google_calendar_error(&format!("Failed to parse token JSON: {}", e))
            })?,
            None => {
                return Err(google_calendar_error(
                    "No valid token found. Run get_calendar_token to authorize.",
                ))
            }
        };

        if !token.is_expired(Utc::now().timestamp()) {
            return Ok(token.access_token);
        }

        debug!("Google access token expired, refreshing");
        let refreshed = self.refresh_token(&token).await?;
        Ok(refreshed.access_token)
    }

    /// Refresh an expired token and persist the result
    async fn refresh_token(&self, token: &StoredToken) -> SyncResult<StoredToken> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| google_calendar_error("No refresh token in token data"))?;

        let (client_id, client_secret, token_url) = {
            let config_read = self.config.read().await;
            (
                config_read.google_client_id.clone(),
                config_read.google_client_secret.clone(),
                config_read.google_token_url.clone(),
            )
        };

        let params = [
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(&token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to refresh token: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(google_calendar_error(&format!(
                "Failed to refresh token: HTTP {} - {}",
                status, error_body
            )));
        }

        let body: RefreshResponse = response.json().await.map_err(|e| {
            google_calendar_error(&format!("Failed to parse token response: {}", e))
        })?;

        let refreshed = StoredToken {
            access_token: body.access_token,
            // Google only returns a new refresh token when it rotates it
            refresh_token: body.refresh_token.or_else(|| token.refresh_token.clone()),
            expires_at: Utc::now().timestamp() + body.expires_in.unwrap_or(3600),
        };

        self.set_token(&refreshed).await?;
        info!("Refreshed Google access token");
        Ok(refreshed)
    }

    /// Store a token in Redis (used by the authorization binary)
    pub async fn set_token(&self, token: &StoredToken) -> SyncResult<()> {
        let redis = match &self.source {
            TokenSource::Static(_) => {
                return Err(google_calendar_error(
                    "A static access token is configured; nothing to store",
                ))
            }
            TokenSource::Redis(redis) => redis,
        };

        let mut conn = redis.get_multiplexed_async_connection().await.map_err(|e| {
            google_calendar_error(&format!("Failed to connect to Redis: {}", e))
        })?;

        let json = serde_json::to_string(token)?;
        let _: () = conn
            .set(TOKEN_KEY, json)
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to save token to Redis: {}", e)))?;

        Ok(())
    }
}
