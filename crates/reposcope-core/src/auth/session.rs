use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::AuthError;

const USER_AGENT: &str = "reposcope/0.1.0";

const EXCHANGE_PATH: &str = "/api/auth/exchange";
const STATUS_PATH: &str = "/api/auth/userstatus";
const LOGOUT_PATH: &str = "/api/auth/logout";

/// Snapshot of the server-held session, as reported by the backend.
///
/// The session itself is opaque to this client: it exists only as a cookie
/// in the HTTP client's jar. Callers pass this value object around instead
/// of consulting any ambient authenticated flag, so a status can never go
/// stale behind their backs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl SessionStatus {
    pub fn unauthenticated() -> Self {
        Self {
            authenticated: false,
            login: None,
            name: None,
        }
    }

    /// Best human-readable identity: display name, then login handle.
    pub fn display_identity(&self) -> Option<&str> {
        self.name.as_deref().or(self.login.as_deref())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeRequest<'a> {
    code: &'a str,
    code_verifier: &'a str,
    redirect_uri: &'a str,
}

/// Talks to the trusted backend that performs the actual code-for-token
/// exchange and manages the session cookie.
///
/// The provider-issued tokens never reach this client; the cookie jar is
/// the only session state it carries.
#[derive(Debug, Clone)]
pub struct SessionClient {
    http: Client,
    api_base: Url,
    exchange_url: Url,
    status_url: Url,
    logout_url: Url,
}

impl SessionClient {
    pub fn new(api_base: Url) -> Result<Self, AuthError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()?;
        let exchange_url = api_base.join(EXCHANGE_PATH)?;
        let status_url = api_base.join(STATUS_PATH)?;
        let logout_url = api_base.join(LOGOUT_PATH)?;
        Ok(Self {
            http,
            api_base,
            exchange_url,
            status_url,
            logout_url,
        })
    }

    /// HTTP client sharing this session's cookie jar. Other API clients
    /// clone this so the session cookie rides along on their requests.
    pub fn http_client(&self) -> &Client {
        &self.http
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// Hand the authorization code and PKCE verifier to the backend, which
    /// redeems them against the provider and answers with a session cookie.
    /// Any non-success response leaves the client unauthenticated.
    pub async fn exchange(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &Url,
    ) -> Result<(), AuthError> {
        let request = ExchangeRequest {
            code,
            code_verifier: verifier,
            redirect_uri: redirect_uri.as_str(),
        };
        let response = self
            .http
            .post(self.exchange_url.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::ExchangeFailed { status, body });
        }
        Ok(())
    }

    /// Ask the backend whether the session cookie still names a live
    /// session. Infallible on purpose: any transport or decode failure
    /// reads as "not authenticated", because ambiguity must never unlock
    /// a protected view.
    pub async fn status(&self) -> SessionStatus {
        match self.try_status().await {
            Ok(status) => status,
            Err(err) => {
                tracing::debug!(error = %err, "status query failed; treating as unauthenticated");
                SessionStatus::unauthenticated()
            }
        }
    }

    async fn try_status(&self) -> Result<SessionStatus, AuthError> {
        let response = self.http.get(self.status_url.clone()).send().await?;
        if !response.status().is_success() {
            return Ok(SessionStatus::unauthenticated());
        }
        Ok(response.json().await?)
    }

    /// Request server-side invalidation. Always resolves: even if the
    /// server is unreachable the caller ends up unauthenticated, which is
    /// the only state this client can still prove.
    pub async fn logout(&self) {
        if let Err(err) = self.http.post(self.logout_url.clone()).send().await {
            tracing::debug!(error = %err, "logout request failed; session dropped locally");
        }
    }
}
