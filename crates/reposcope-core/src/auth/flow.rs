use url::Url;

use crate::config::AppConfig;

use super::pkce::{generate_state, PkcePair, STATE_ENTROPY_BYTES};
use super::store::{EphemeralStore, STATE_KEY, VERIFIER_KEY};
use super::{AuthError, SessionClient};

/// Where a login attempt currently stands.
///
/// `LoginInitiated` and `Exchanging` are transient: they are observable
/// only if the flow is inspected mid-operation, but they keep the
/// progression explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    LoginInitiated,
    AwaitingCallback,
    Exchanging,
    Authenticated,
    Failed,
}

/// Query parameters carried by the provider redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackQuery {
    pub fn from_url(url: &Url) -> Self {
        let mut query = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => query.code = Some(value.into_owned()),
                "state" => query.state = Some(value.into_owned()),
                "error" => query.error = Some(value.into_owned()),
                _ => {}
            }
        }
        query
    }
}

/// Orchestrates the PKCE login handshake: generate → persist → hand the
/// browser off to the provider, then validate → exchange → clean up when
/// the redirect comes back.
pub struct AuthFlowController<S> {
    store: S,
    session: SessionClient,
    config: AppConfig,
    state: FlowState,
}

impl<S: EphemeralStore> AuthFlowController<S> {
    pub fn new(store: S, session: SessionClient, config: AppConfig) -> Self {
        Self {
            store,
            session,
            config,
            state: FlowState::Idle,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn session(&self) -> &SessionClient {
        &self.session
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Begin a login attempt and return the provider authorization URL the
    /// browser must visit. The verifier and state token are persisted in
    /// the ephemeral store for the callback to consume.
    ///
    /// Calling this again before the callback overwrites the pending slot,
    /// invalidating any in-flight first attempt. Single-slot semantics.
    pub fn login(&mut self) -> Result<Url, AuthError> {
        self.state = FlowState::LoginInitiated;
        let pkce = PkcePair::generate();
        let state = generate_state(STATE_ENTROPY_BYTES);

        self.store.set(VERIFIER_KEY, &pkce.verifier())?;
        self.store.set(STATE_KEY, &state)?;

        let url = self.authorization_url(pkce.challenge(), &state);
        self.state = FlowState::AwaitingCallback;
        tracing::debug!("login initiated; awaiting provider callback");
        Ok(url)
    }

    fn authorization_url(&self, challenge: &str, state: &str) -> Url {
        let mut url = self.config.authorize_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("client_id", &self.config.client_id);
            pairs.append_pair("redirect_uri", self.config.redirect_uri.as_str());
            pairs.append_pair("scope", &self.config.scope_param());
            pairs.append_pair("state", state);
            pairs.append_pair("code_challenge", challenge);
            pairs.append_pair("code_challenge_method", "S256");
        }
        url
    }

    /// Handle the provider redirect. Validates the query against the
    /// pending attempt, consumes the stored verifier/state, and drives the
    /// backend exchange. Every error is terminal for this attempt; the
    /// only recovery is a fresh `login()`.
    pub async fn callback(&mut self, query: CallbackQuery) -> Result<(), AuthError> {
        match self.handle_callback(query).await {
            Ok(()) => {
                self.state = FlowState::Authenticated;
                tracing::debug!("code exchange succeeded; session established");
                Ok(())
            }
            Err(err) => {
                self.state = FlowState::Failed;
                tracing::debug!(error = %err, "callback handling failed");
                Err(err)
            }
        }
    }

    async fn handle_callback(&mut self, query: CallbackQuery) -> Result<(), AuthError> {
        if let Some(reason) = query.error {
            return Err(AuthError::AccessDenied(reason));
        }

        let (code, returned_state) = match (query.code, query.state) {
            (Some(code), Some(state)) => (code, state),
            _ => return Err(AuthError::MissingParameters),
        };

        let expected_state: Option<String> = self.store.get(STATE_KEY);
        let verifier: Option<String> = self.store.get(VERIFIER_KEY);
        let (expected_state, verifier) = match (expected_state, verifier) {
            (Some(expected), Some(verifier)) => (expected, verifier),
            // Expired, cleared, or already consumed by an earlier callback.
            _ => return Err(AuthError::MissingSession),
        };

        if returned_state != expected_state {
            return Err(AuthError::StateMismatch);
        }

        // Single use: drop both values before the exchange so a replayed
        // redirect fails at MissingSession no matter how the exchange ends.
        self.store.remove(STATE_KEY);
        self.store.remove(VERIFIER_KEY);

        self.state = FlowState::Exchanging;
        self.session
            .exchange(&code, &verifier, &self.config.redirect_uri)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::pkce::generate_challenge;
    use crate::auth::store::MemoryEphemeralStore;
    use httpmock::prelude::*;

    fn controller(server: &MockServer) -> AuthFlowController<MemoryEphemeralStore> {
        let config = AppConfig::new("client-id")
            .with_api_base(Url::parse(&server.base_url()).unwrap());
        let session = SessionClient::new(config.api_base.clone()).unwrap();
        AuthFlowController::new(MemoryEphemeralStore::default(), session, config)
    }

    fn query_param(url: &Url, name: &str) -> Option<String> {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    fn pending_state<S: EphemeralStore>(controller: &AuthFlowController<S>) -> Option<String> {
        controller.store.get(STATE_KEY)
    }

    fn pending_verifier<S: EphemeralStore>(controller: &AuthFlowController<S>) -> Option<String> {
        controller.store.get(VERIFIER_KEY)
    }

    #[tokio::test]
    async fn login_persists_secrets_and_builds_authorization_url() {
        let server = MockServer::start();
        let mut flow = controller(&server);

        let url = flow.login().unwrap();
        assert_eq!(flow.state(), FlowState::AwaitingCallback);

        let verifier = pending_verifier(&flow).expect("verifier stored");
        let state = pending_state(&flow).expect("state stored");

        assert_eq!(query_param(&url, "client_id").as_deref(), Some("client-id"));
        assert_eq!(
            query_param(&url, "redirect_uri").as_deref(),
            Some(flow.config().redirect_uri.as_str())
        );
        assert_eq!(query_param(&url, "scope").as_deref(), Some("read:user repo"));
        assert_eq!(query_param(&url, "state"), Some(state));
        assert_eq!(
            query_param(&url, "code_challenge"),
            Some(generate_challenge(&verifier))
        );
        assert_eq!(
            query_param(&url, "code_challenge_method").as_deref(),
            Some("S256")
        );
    }

    #[tokio::test]
    async fn callback_exchanges_code_and_consumes_secrets() {
        let server = MockServer::start();
        let mut flow = controller(&server);
        flow.login().unwrap();
        let verifier = pending_verifier(&flow).unwrap();
        let state = pending_state(&flow).unwrap();

        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/auth/exchange")
                .body_contains(&format!("\"codeVerifier\":\"{verifier}\""));
            then.status(204);
        });

        flow.callback(CallbackQuery {
            code: Some("code-abc".into()),
            state: Some(state),
            error: None,
        })
        .await
        .unwrap();

        mock.assert();
        assert_eq!(flow.state(), FlowState::Authenticated);
        assert_eq!(pending_verifier(&flow), None);
        assert_eq!(pending_state(&flow), None);
    }

    #[tokio::test]
    async fn callback_without_parameters_fails_closed() {
        let server = MockServer::start();
        let mut flow = controller(&server);
        flow.login().unwrap();

        let err = flow.callback(CallbackQuery::default()).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingParameters));
        assert_eq!(flow.state(), FlowState::Failed);
    }

    #[tokio::test]
    async fn callback_rejects_foreign_state() {
        let server = MockServer::start();
        let mut flow = controller(&server);
        flow.login().unwrap();

        let err = flow
            .callback(CallbackQuery {
                code: Some("c".into()),
                state: Some("s1".into()),
                error: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::StateMismatch));
        // Validation never passed, so the pending attempt is untouched.
        assert!(pending_verifier(&flow).is_some());
    }

    #[tokio::test]
    async fn replayed_callback_dies_at_missing_session() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/auth/exchange");
            then.status(204);
        });
        let mut flow = controller(&server);
        flow.login().unwrap();
        let state = pending_state(&flow).unwrap();

        let query = CallbackQuery {
            code: Some("code-abc".into()),
            state: Some(state),
            error: None,
        };
        flow.callback(query.clone()).await.unwrap();

        let err = flow.callback(query).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingSession));
    }

    #[tokio::test]
    async fn failed_exchange_still_consumes_secrets() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/auth/exchange");
            then.status(502).body("upstream exchange failed");
        });
        let mut flow = controller(&server);
        flow.login().unwrap();
        let state = pending_state(&flow).unwrap();

        let err = flow
            .callback(CallbackQuery {
                code: Some("code-abc".into()),
                state: Some(state),
                error: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::ExchangeFailed { .. }));
        assert_eq!(flow.state(), FlowState::Failed);
        assert_eq!(pending_verifier(&flow), None);
        assert_eq!(pending_state(&flow), None);
    }

    #[tokio::test]
    async fn provider_denial_is_reported() {
        let server = MockServer::start();
        let mut flow = controller(&server);
        flow.login().unwrap();

        let err = flow
            .callback(CallbackQuery {
                code: None,
                state: None,
                error: Some("access_denied".into()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccessDenied(reason) if reason == "access_denied"));
    }

    #[tokio::test]
    async fn second_login_overwrites_pending_attempt() {
        let server = MockServer::start();
        let mut flow = controller(&server);

        flow.login().unwrap();
        let first_state = pending_state(&flow).unwrap();
        flow.login().unwrap();
        let second_state = pending_state(&flow).unwrap();

        assert_ne!(first_state, second_state);

        // The first attempt's redirect now looks foreign.
        let err = flow
            .callback(CallbackQuery {
                code: Some("c".into()),
                state: Some(first_state),
                error: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::StateMismatch));
    }

    #[test]
    fn callback_query_parses_redirect_urls() {
        let url = Url::parse("http://127.0.0.1:9400/auth/callback?code=abc&state=xyz").unwrap();
        let query = CallbackQuery::from_url(&url);
        assert_eq!(query.code.as_deref(), Some("abc"));
        assert_eq!(query.state.as_deref(), Some("xyz"));
        assert_eq!(query.error, None);

        let denied = Url::parse("http://127.0.0.1:9400/auth/callback?error=access_denied").unwrap();
        assert_eq!(
            CallbackQuery::from_url(&denied).error.as_deref(),
            Some("access_denied")
        );
    }
}
