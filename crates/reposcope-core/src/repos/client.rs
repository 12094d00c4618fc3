use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::auth::SessionClient;

const REPOS_PATH: &str = "/api/repos";

/// Errors returned by the repo listing client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {status} body: {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("invalid API endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    #[error("failed to deserialize response: {0}")]
    Deserialize(#[from] serde_json::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// One repository row as rendered by the listing view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoSummary {
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
}

/// Fetches the authenticated user's repositories through the backend proxy.
///
/// Shares the session client's HTTP client so the session cookie rides on
/// every request; without a live session the backend answers 401 and the
/// guard has already sent the user to login.
#[derive(Debug, Clone)]
pub struct ReposClient {
    http: Client,
    endpoint: Url,
}

impl ReposClient {
    pub fn from_session(session: &SessionClient) -> ApiResult<Self> {
        let endpoint = session.api_base().join(REPOS_PATH)?;
        Ok(Self {
            http: session.http_client().clone(),
            endpoint,
        })
    }

    pub async fn list(&self) -> ApiResult<Vec<RepoSummary>> {
        let response = self.http.get(self.endpoint.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::HttpStatus { status, body });
        }
        let payload: Value = response.json().await?;
        Ok(parse_repos(payload)?)
    }
}

/// The backend may answer with a bare array or wrap it in an `items` or
/// `repos` object; anything else reads as an empty list.
fn parse_repos(payload: Value) -> Result<Vec<RepoSummary>, serde_json::Error> {
    let items = match payload {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => map
            .remove("items")
            .or_else(|| map.remove("repos"))
            .unwrap_or_else(|| Value::Array(vec![])),
        _ => Value::Array(vec![]),
    };
    serde_json::from_value(items)
}

/// Case-insensitive substring filter over `full_name`, matching the
/// listing view's search box. A blank term keeps everything.
pub fn filter_repos<'a>(repos: &'a [RepoSummary], term: &str) -> Vec<&'a RepoSummary> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return repos.iter().collect();
    }
    repos
        .iter()
        .filter(|repo| repo.full_name.to_lowercase().contains(&term))
        .collect()
}
