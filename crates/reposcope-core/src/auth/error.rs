use reqwest::StatusCode;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by the authorization flow and session client.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("authorization response missing code or state parameter")]
    MissingParameters,
    #[error("no pending login attempt found; start a new login")]
    MissingSession,
    #[error("authorization state mismatch")]
    StateMismatch,
    #[error("authorization request denied ({0})")]
    AccessDenied(String),
    #[error("code exchange rejected with status {status}: {body}")]
    ExchangeFailed { status: StatusCode, body: String },
    #[error("redirect URI must name a loopback host and an explicit port")]
    MissingRedirectPort,
    #[error("authorization listener terminated before receiving redirect")]
    ListenerClosed,
    #[error("failed to launch system browser: {0}")]
    BrowserLaunch(String),
    #[error("invalid authorization response: {0}")]
    InvalidAuthorizationResponse(String),
}
