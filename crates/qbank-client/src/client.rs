//! The authenticated client.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use qbank_core::{
    AccessToken, ClientError, RefreshExchange, RequestSpec, Response, Transport, UNAUTHORIZED,
};

use crate::auth::HttpRefreshExchange;
use crate::config::ClientConfig;
use crate::http::HttpTransport;
use crate::refresh::{RefreshCoordinator, RefreshState};
use crate::session::SessionState;

/// Sends API requests with the session's bearer token and renews it on expiry.
///
/// A request whose credential is rejected (HTTP 401) triggers a refresh;
/// concurrent rejections share a single refresh exchange. Each request is
/// retried at most once. If the refresh fails, the session is cleared and
/// the request fails with [`ClientError::SessionExpired`].
///
/// Every other response, success or error, is returned to the caller as-is.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use qbank_client::{AuthenticatedClient, ClientConfig, MemoryStore, SessionState};
/// use qbank_core::{LoginForm, RequestSpec};
///
/// # async fn example() -> qbank_core::Result<()> {
/// let config = ClientConfig::from_env()?;
/// let session = Arc::new(SessionState::new(Arc::new(MemoryStore::new())));
/// let client = AuthenticatedClient::from_config(&config, session)?;
///
/// client.login(&LoginForm::new("alice", "hunter2")).await?;
/// let banks = client.send(RequestSpec::get("/banks")).await?;
/// println!("{}", banks.text());
/// # Ok(())
/// # }
/// ```
pub struct AuthenticatedClient {
    session: Arc<SessionState>,
    transport: Arc<dyn Transport>,
    refresh: RefreshCoordinator,
}

impl AuthenticatedClient {
    /// Create a client from its collaborators.
    pub fn new(
        session: Arc<SessionState>,
        transport: Arc<dyn Transport>,
        exchange: Arc<dyn RefreshExchange>,
    ) -> Self {
        let refresh = RefreshCoordinator::new(Arc::clone(&session), exchange);
        Self {
            session,
            transport,
            refresh,
        }
    }

    /// Create a client talking HTTP to the configured API.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(
        config: &ClientConfig,
        session: Arc<SessionState>,
    ) -> qbank_core::Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config)?);
        let exchange = Arc::new(HttpRefreshExchange::new(Arc::clone(&transport)));
        Ok(Self::new(session, transport, exchange))
    }

    /// Returns the session this client authenticates with.
    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    /// Returns whether a refresh exchange is currently running.
    pub fn refresh_state(&self) -> RefreshState {
        self.refresh.state()
    }

    /// Send a request, attaching credentials and renewing them if rejected.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Transport`] if no response was received
    /// - [`ClientError::SessionExpired`] if the credential was rejected and
    ///   could not be renewed, or was rejected again after renewal
    #[instrument(skip(self, spec), fields(method = %spec.method, path = %spec.path))]
    pub async fn send(&self, spec: RequestSpec) -> qbank_core::Result<Response> {
        if spec.skip_auth {
            debug!("Sending without credentials");
            return Ok(self.transport.send(spec.to_transport(None)).await?);
        }

        let mut token = self.session.access_token();
        let mut retried = false;

        loop {
            let request = spec.to_transport(token.as_ref().map(AccessToken::bearer));
            let response = self.transport.send(request).await?;

            if response.status != UNAUTHORIZED {
                return Ok(response);
            }

            if retried {
                warn!("Credential rejected after renewal, ending session");
                self.session.clear();
                return Err(ClientError::SessionExpired);
            }

            retried = true;
            token = Some(self.renew(token.as_ref()).await?);
            debug!("Retrying with renewed credential");
        }
    }

    /// Force a coordinated refresh of the access token.
    ///
    /// Joins a refresh that is already running rather than starting another.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionExpired`] if the refresh failed; the
    /// session has been cleared.
    pub async fn refresh(&self) -> qbank_core::Result<AccessToken> {
        self.refresh.coordinate().await.map_err(|failure| {
            info!(reason = %failure, "Refresh failed, session expired");
            ClientError::SessionExpired
        })
    }

    /// Obtain a credential to replace `rejected`.
    async fn renew(&self, rejected: Option<&AccessToken>) -> qbank_core::Result<AccessToken> {
        // Another request already finished a refresh after this one was sent.
        if let Some(current) = self.session.access_token()
            && rejected != Some(&current)
        {
            debug!("Credential already renewed, skipping refresh");
            return Ok(current);
        }

        self.refresh().await
    }
}

impl std::fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("session", &self.session)
            .field("refresh_state", &self.refresh.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use qbank_core::{
        CredentialPair, ExchangeError, RefreshToken, Role, TransportError, TransportRequest,
        UserIdentity,
    };
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Accepts only `Bearer <valid>`; records every authorization header seen.
    struct TokenCheckingTransport {
        valid: Option<String>,
        seen: Mutex<Vec<Option<String>>>,
        status_for_valid: u16,
        slow_path: Option<&'static str>,
    }

    impl TokenCheckingTransport {
        fn new(valid: Option<&str>) -> Self {
            Self {
                valid: valid.map(str::to_string),
                seen: Mutex::new(Vec::new()),
                status_for_valid: 200,
                slow_path: None,
            }
        }

        fn seen(&self) -> Vec<Option<String>> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for TokenCheckingTransport {
        async fn send(&self, request: TransportRequest) -> Result<Response, TransportError> {
            let delay = if self.slow_path == Some(request.path.as_str()) {
                Duration::from_millis(100)
            } else {
                Duration::from_millis(5)
            };
            tokio::time::sleep(delay).await;
            let auth = request.header("authorization").map(str::to_string);
            self.seen.lock().unwrap().push(auth.clone());
            let accepted = match (auth, &self.valid) {
                (Some(auth), Some(valid)) => auth == format!("Bearer {}", valid),
                _ => false,
            };
            if accepted {
                Ok(Response::new(self.status_for_valid, request.path))
            } else {
                Ok(Response::new(401, "expired"))
            }
        }
    }

    struct CountingExchange {
        calls: AtomicUsize,
        result: Option<&'static str>,
    }

    #[async_trait]
    impl RefreshExchange for CountingExchange {
        async fn exchange(&self, _token: &RefreshToken) -> Result<AccessToken, ExchangeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            match self.result {
                Some(token) => Ok(AccessToken::new(token)),
                None => Err(ExchangeError::Rejected {
                    status: 401,
                    message: Some("refresh token expired".to_string()),
                }),
            }
        }
    }

    fn session_with(access: &str) -> Arc<SessionState> {
        let session = Arc::new(SessionState::new(Arc::new(MemoryStore::new())));
        session.set_authenticated(
            CredentialPair::new(AccessToken::new(access), RefreshToken::new("R1")),
            UserIdentity {
                id: 1,
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                role: Role::User,
                avatar_url: None,
                is_active: true,
                created_at: None,
                updated_at: None,
                last_login: None,
            },
        );
        session
    }

    fn build(
        session: Arc<SessionState>,
        transport: Arc<TokenCheckingTransport>,
        result: Option<&'static str>,
    ) -> (AuthenticatedClient, Arc<CountingExchange>) {
        let exchange = Arc::new(CountingExchange {
            calls: AtomicUsize::new(0),
            result,
        });
        (
            AuthenticatedClient::new(session, transport, exchange.clone()),
            exchange,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn valid_token_passes_through() {
        let transport = Arc::new(TokenCheckingTransport::new(Some("T1")));
        let (client, exchange) = build(session_with("T1"), transport.clone(), None);

        let response = client.send(RequestSpec::get("/banks")).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 0);
        assert_eq!(transport.seen(), vec![Some("Bearer T1".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn two_expired_requests_refresh_once() {
        let transport = Arc::new(TokenCheckingTransport::new(Some("T2")));
        let (client, exchange) = build(session_with("T1"), transport.clone(), Some("T2"));

        let (a, b) = tokio::join!(
            client.send(RequestSpec::get("/banks")),
            client.send(RequestSpec::get("/users/profile"))
        );

        assert_eq!(a.unwrap().status, 200);
        assert_eq!(b.unwrap().status, 200);
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);

        let seen = transport.seen();
        assert_eq!(seen.len(), 4);
        let retried: Vec<_> = seen[2..].to_vec();
        assert_eq!(
            retried,
            vec![Some("Bearer T2".to_string()), Some("Bearer T2".to_string())]
        );
        assert_eq!(client.refresh_state(), RefreshState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_expires_every_request() {
        let transport = Arc::new(TokenCheckingTransport::new(None));
        let session = session_with("T1");
        let (client, exchange) = build(session.clone(), transport, None);

        let (a, b, c) = tokio::join!(
            client.send(RequestSpec::get("/a")),
            client.send(RequestSpec::get("/b")),
            client.send(RequestSpec::get("/c"))
        );

        assert!(a.unwrap_err().is_session_expired());
        assert!(b.unwrap_err().is_session_expired());
        assert!(c.unwrap_err().is_session_expired());
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);
        assert!(session.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_after_failed_refresh_expires_without_exchange() {
        let mut transport = TokenCheckingTransport::new(None);
        transport.slow_path = Some("/slow");
        let transport = Arc::new(transport);
        let session = session_with("T1");
        let (client, exchange) = build(session.clone(), transport, None);

        // The slow request's 401 lands after the refresh for the fast one failed.
        let (fast, slow) = tokio::join!(
            client.send(RequestSpec::get("/fast")),
            client.send(RequestSpec::get("/slow"))
        );

        assert!(fast.unwrap_err().is_session_expired());
        assert!(slow.unwrap_err().is_session_expired());
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);
        assert!(!session.is_authenticated());
        assert_eq!(client.refresh_state(), RefreshState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_auth_returns_401_unchanged() {
        let transport = Arc::new(TokenCheckingTransport::new(Some("T1")));
        let (client, exchange) = build(session_with("T1"), transport.clone(), Some("T2"));

        let response = client
            .send(RequestSpec::post("/auth/login").skip_auth())
            .await
            .unwrap();

        assert_eq!(response.status, 401);
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 0);
        assert_eq!(transport.seen(), vec![None]);
        assert!(client.session().is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn retries_at_most_once() {
        // The server rejects everything, including the refreshed token.
        let transport = Arc::new(TokenCheckingTransport::new(None));
        let session = session_with("T1");
        let (client, exchange) = build(session.clone(), transport.clone(), Some("T2"));

        let err = client.send(RequestSpec::get("/banks")).await.unwrap_err();

        assert!(err.is_session_expired());
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            transport.seen(),
            vec![Some("Bearer T1".to_string()), Some("Bearer T2".to_string())]
        );
        assert!(session.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn later_requests_use_the_new_token() {
        let transport = Arc::new(TokenCheckingTransport::new(Some("T2")));
        let (client, _exchange) = build(session_with("T1"), transport.clone(), Some("T2"));

        client.send(RequestSpec::get("/banks")).await.unwrap();
        client.send(RequestSpec::get("/banks")).await.unwrap();

        assert_eq!(transport.seen().last().unwrap().as_deref(), Some("Bearer T2"));
        assert_eq!(transport.seen().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_auth_errors_pass_through() {
        let mut transport = TokenCheckingTransport::new(Some("T1"));
        transport.status_for_valid = 403;
        let transport = Arc::new(transport);
        let (client, exchange) = build(session_with("T1"), transport, Some("T2"));

        let response = client.send(RequestSpec::delete("/banks/3")).await.unwrap();

        assert_eq!(response.status, 403);
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn never_logged_in_expires_without_exchange() {
        let transport = Arc::new(TokenCheckingTransport::new(Some("T1")));
        let session = Arc::new(SessionState::new(Arc::new(MemoryStore::new())));
        let (client, exchange) = build(session, transport.clone(), Some("T2"));

        let err = client.send(RequestSpec::get("/favorites")).await.unwrap_err();

        assert!(err.is_session_expired());
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 0);
        assert_eq!(transport.seen(), vec![None]);
    }

    #[tokio::test(start_paused = true)]
    async fn straggler_reuses_completed_refresh() {
        let transport = Arc::new(TokenCheckingTransport::new(Some("T2")));
        let session = session_with("T1");
        let (client, exchange) = build(session.clone(), transport.clone(), Some("T2"));

        // The session was renewed after this request left with T1.
        session.update_access_token(AccessToken::new("T2")).unwrap();
        let rejected = AccessToken::new("T1");
        let token = client.renew(Some(&rejected)).await.unwrap();

        assert_eq!(token.as_str(), "T2");
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 0);
    }

    struct DownTransport;

    #[async_trait]
    impl Transport for DownTransport {
        async fn send(&self, _request: TransportRequest) -> Result<Response, TransportError> {
            Err(TransportError::Connection {
                message: "connection refused".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn transport_errors_are_not_retried() {
        let exchange = Arc::new(CountingExchange {
            calls: AtomicUsize::new(0),
            result: Some("T2"),
        });
        let session = session_with("T1");
        let client = AuthenticatedClient::new(session.clone(), Arc::new(DownTransport), exchange.clone());

        let err = client.send(RequestSpec::get("/banks")).await.unwrap_err();

        assert!(matches!(err, ClientError::Transport(TransportError::Connection { .. })));
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 0);
        assert!(session.is_authenticated());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn many_threads_share_one_exchange() {
        let transport = Arc::new(TokenCheckingTransport::new(Some("T2")));
        let (client, exchange) = build(session_with("T1"), transport, Some("T2"));
        let client = Arc::new(client);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let client = Arc::clone(&client);
                tokio::spawn(async move { client.send(RequestSpec::get(format!("/banks/{}", i))).await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().status, 200);
        }
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);
    }
}
