use std::env;

use thiserror::Error;
use url::Url;

pub const DEFAULT_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8080";
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:9400/auth/callback";
pub const DEFAULT_SCOPES: &[&str; 2] = &["read:user", "repo"];

const CLIENT_ID_VAR: &str = "REPOSCOPE_CLIENT_ID";
const REDIRECT_URI_VAR: &str = "REPOSCOPE_REDIRECT_URI";
const SCOPES_VAR: &str = "REPOSCOPE_SCOPES";
const API_BASE_VAR: &str = "REPOSCOPE_API_BASE_URL";
const AUTHORIZE_URL_VAR: &str = "REPOSCOPE_AUTHORIZE_URL";

/// Client-side configuration supplied by the environment.
///
/// None of this is secret: the whole point of PKCE is that the client
/// carries no credential beyond its public client id. The provider secret
/// lives on the backend this client talks to.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub client_id: String,
    pub redirect_uri: Url,
    pub scopes: Vec<String>,
    pub api_base: Url,
    pub authorize_url: Url,
}

impl AppConfig {
    pub fn new<S: Into<String>>(client_id: S) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: Url::parse(DEFAULT_REDIRECT_URI).expect("valid redirect URI"),
            scopes: DEFAULT_SCOPES.iter().map(|scope| scope.to_string()).collect(),
            api_base: Url::parse(DEFAULT_API_BASE).expect("valid API base URL"),
            authorize_url: Url::parse(DEFAULT_AUTHORIZE_URL).expect("valid authorize URL"),
        }
    }

    /// Build a config from `REPOSCOPE_*` environment variables. The client
    /// id is the only required value; everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let client_id = env::var(CLIENT_ID_VAR)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingClientId)?;
        let mut config = Self::new(client_id);

        if let Some(redirect) = non_empty_var(REDIRECT_URI_VAR) {
            config.redirect_uri = parse_url(REDIRECT_URI_VAR, &redirect)?;
        }
        if let Some(api_base) = non_empty_var(API_BASE_VAR) {
            config.api_base = parse_url(API_BASE_VAR, &api_base)?;
        }
        if let Some(authorize) = non_empty_var(AUTHORIZE_URL_VAR) {
            config.authorize_url = parse_url(AUTHORIZE_URL_VAR, &authorize)?;
        }
        if let Some(scopes) = non_empty_var(SCOPES_VAR) {
            config.scopes = scopes.split_whitespace().map(str::to_owned).collect();
        }

        Ok(config)
    }

    pub fn with_redirect_uri(mut self, redirect_uri: Url) -> Self {
        self.redirect_uri = redirect_uri;
        self
    }

    pub fn with_api_base(mut self, api_base: Url) -> Self {
        self.api_base = api_base;
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Space-separated scope list as it appears in the authorization URL.
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl { name, source })
}

/// Errors raised while assembling client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("REPOSCOPE_CLIENT_ID is not set")]
    MissingClientId,
    #[error("invalid {name}: {source}")]
    InvalidUrl {
        name: &'static str,
        source: url::ParseError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_everything_but_client_id() {
        let config = AppConfig::new("client-123");
        assert_eq!(config.client_id, "client-123");
        assert_eq!(config.redirect_uri.as_str(), DEFAULT_REDIRECT_URI);
        assert_eq!(config.scope_param(), "read:user repo");
    }

    #[test]
    fn from_env_requires_client_id() {
        temp_env::with_var(CLIENT_ID_VAR, None::<&str>, || {
            let err = AppConfig::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::MissingClientId));
        });
    }

    #[test]
    fn from_env_applies_overrides() {
        temp_env::with_vars(
            [
                (CLIENT_ID_VAR, Some("env-client")),
                (REDIRECT_URI_VAR, Some("http://127.0.0.1:4200/auth/callback")),
                (API_BASE_VAR, Some("https://api.example.com")),
                (SCOPES_VAR, Some("read:user")),
            ],
            || {
                let config = AppConfig::from_env().unwrap();
                assert_eq!(config.client_id, "env-client");
                assert_eq!(config.redirect_uri.port(), Some(4200));
                assert_eq!(config.api_base.host_str(), Some("api.example.com"));
                assert_eq!(config.scopes, vec!["read:user"]);
            },
        );
    }

    #[test]
    fn from_env_rejects_bad_urls() {
        temp_env::with_vars(
            [
                (CLIENT_ID_VAR, Some("env-client")),
                (REDIRECT_URI_VAR, Some("not a url")),
            ],
            || {
                let err = AppConfig::from_env().unwrap_err();
                assert!(matches!(
                    err,
                    ConfigError::InvalidUrl {
                        name: REDIRECT_URI_VAR,
                        ..
                    }
                ));
            },
        );
    }
}
