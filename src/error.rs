use miette::Diagnostic;
use thiserror::Error;

/// Main error type for the sync service
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Environment error: {0}")]
    #[diagnostic(code(lab_sync::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(lab_sync::config))]
    Config(String),

    #[error("Google Calendar API error: {0}")]
    #[diagnostic(code(lab_sync::google_calendar))]
    GoogleCalendar(String),

    #[error("Event store error: {0}")]
    #[diagnostic(code(lab_sync::store))]
    Store(String),

    #[error("Redis error: {0}")]
    #[diagnostic(code(lab_sync::redis))]
    Redis(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    #[diagnostic(code(lab_sync::http))]
    Http(#[from] reqwest::Error),

    #[error("Component error: {0}")]
    #[diagnostic(code(lab_sync::component))]
    Component(String),

    #[error(transparent)]
    #[diagnostic(code(lab_sync::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(lab_sync::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(lab_sync::other))]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type SyncResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create component errors
pub fn component_error(message: &str) -> Error {
    Error::Component(message.to_string())
}

/// Helper to create Google Calendar errors
pub fn google_calendar_error(message: &str) -> Error {
    Error::GoogleCalendar(message.to_string())
}

/// Helper to create event store errors
pub fn store_error(message: &str) -> Error {
    Error::Store(message.to_string())
}

/// Helper to create other errors
pub fn other_error(message: &str) -> Error {
    Error::Other(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpers_pick_variant() {
        assert!(matches!(env_error("X"), Error::Environment(msg) if msg.contains("X")));
        assert!(matches!(store_error("boom"), Error::Store(_)));
        assert!(matches!(google_calendar_error("boom"), Error::GoogleCalendar(_)));
    }

    #[test]
    fn test_json_errors_become_serialization() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
