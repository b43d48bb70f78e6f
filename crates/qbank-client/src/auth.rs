//! Auth endpoints: login, register, current user, logout and token refresh.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use qbank_core::error::StatusError;
use qbank_core::{
    AccessToken, ClientError, CredentialPair, ExchangeError, LoginForm, RefreshExchange,
    RefreshToken, RegisterForm, RequestSpec, Response, Transport, UserIdentity,
};

use crate::client::AuthenticatedClient;

/// `POST`: exchange username/password for a credential pair.
pub const LOGIN: &str = "/auth/login";

/// `POST`: create an account and log into it.
pub const REGISTER: &str = "/auth/register";

/// `POST`: exchange a refresh token (sent as the bearer) for an access token.
pub const REFRESH: &str = "/auth/refresh";

/// `GET`: the user the access token belongs to.
pub const CURRENT_USER: &str = "/auth/me";

/// `POST`: end the server-side session for the access token.
pub const LOGOUT: &str = "/auth/logout";

/// Response from login and register.
#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
    refresh_token: String,
    user: UserIdentity,
}

/// Response from the refresh endpoint.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

/// Response from the current-user endpoint.
#[derive(Debug, Deserialize)]
struct CurrentUserResponse {
    user: UserIdentity,
}

/// Refresh exchange against `POST /auth/refresh`.
///
/// Talks to the transport directly so the refresh call can never re-enter
/// the client's own refresh pipeline.
pub struct HttpRefreshExchange {
    transport: Arc<dyn Transport>,
}

impl HttpRefreshExchange {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl RefreshExchange for HttpRefreshExchange {
    #[instrument(skip_all)]
    async fn exchange(&self, refresh_token: &RefreshToken) -> Result<AccessToken, ExchangeError> {
        let request = RequestSpec::post(REFRESH)
            .skip_auth()
            .to_transport(Some(refresh_token.bearer()));

        let response = self.transport.send(request).await?;

        if !response.is_success() {
            return Err(ExchangeError::Rejected {
                status: response.status,
                message: response.message(),
            });
        }

        let body: RefreshResponse = response.json().map_err(|e| ExchangeError::Decode {
            message: e.to_string(),
        })?;

        debug!("Refresh exchange succeeded");
        Ok(AccessToken::new(body.access_token))
    }
}

impl AuthenticatedClient {
    /// Log in and establish the session.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Status`] if the server refuses the credentials.
    #[instrument(skip(self, form), fields(username = %form.username()))]
    pub async fn login(&self, form: &LoginForm) -> qbank_core::Result<UserIdentity> {
        info!("Logging in");
        let spec = RequestSpec::post(LOGIN)
            .json(serde_json::to_value(form)?)
            .skip_auth();
        let response = self.send(spec).await?;
        self.establish(response)
    }

    /// Create an account and establish a session for it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Status`] if the server refuses the registration.
    #[instrument(skip(self, form), fields(username = %form.username()))]
    pub async fn register(&self, form: &RegisterForm) -> qbank_core::Result<UserIdentity> {
        info!("Registering account");
        let spec = RequestSpec::post(REGISTER)
            .json(serde_json::to_value(form)?)
            .skip_auth();
        let response = self.send(spec).await?;
        self.establish(response)
    }

    /// Fetch the current user and refresh the session's identity with it.
    ///
    /// Returns `Ok(None)` without contacting the server when logged out.
    /// If the server answers with an error status the session is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionExpired`] if the credential could not
    /// be renewed, or [`ClientError::Status`] for other refusals.
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> qbank_core::Result<Option<UserIdentity>> {
        if !self.session().is_authenticated() {
            debug!("Not logged in");
            return Ok(None);
        }

        let response = self.send(RequestSpec::get(CURRENT_USER)).await?;
        let response = match expect_success(response) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Current user lookup refused, ending session");
                self.session().clear();
                return Err(e);
            }
        };

        let body: CurrentUserResponse = response.json()?;
        if self.session().replace_identity(body.user.clone()).is_err() {
            return Err(ClientError::SessionExpired);
        }
        Ok(Some(body.user))
    }

    /// Tell the server the session is over, then clear it locally.
    ///
    /// The local session is cleared whatever the server answers.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if self.session().is_authenticated() {
            match self.send(RequestSpec::post(LOGOUT)).await {
                Ok(response) if response.is_success() => debug!("Server session ended"),
                Ok(response) => warn!(status = response.status, "Server refused logout"),
                Err(e) => warn!(error = %e, "Logout request failed"),
            }
        }
        self.session().clear();
    }

    fn establish(&self, response: Response) -> qbank_core::Result<UserIdentity> {
        let body: AuthResponse = expect_success(response)?.json()?;
        self.session().set_authenticated(
            CredentialPair::new(
                AccessToken::new(body.access_token),
                RefreshToken::new(body.refresh_token),
            ),
            body.user.clone(),
        );
        Ok(body.user)
    }
}

fn expect_success(response: Response) -> qbank_core::Result<Response> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ClientError::Status(StatusError {
            status: response.status,
            message: response.message(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qbank_core::{TransportError, TransportRequest};
    use serde_json::json;
    use std::sync::Mutex;

    struct Recorder {
        requests: Mutex<Vec<TransportRequest>>,
        response: Response,
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn send(&self, request: TransportRequest) -> Result<Response, TransportError> {
            self.requests.lock().unwrap().push(request);
            Ok(self.response.clone())
        }
    }

    fn recorder(response: Response) -> Arc<Recorder> {
        Arc::new(Recorder {
            requests: Mutex::new(Vec::new()),
            response,
        })
    }

    #[tokio::test]
    async fn exchange_sends_refresh_token_as_bearer() {
        let transport = recorder(Response::json_body(200, &json!({"access_token": "T2"})));
        let exchange = HttpRefreshExchange::new(transport.clone());

        let token = exchange.exchange(&RefreshToken::new("R1")).await.unwrap();

        assert_eq!(token.as_str(), "T2");
        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, REFRESH);
        assert_eq!(requests[0].header("authorization"), Some("Bearer R1"));
    }

    #[tokio::test]
    async fn exchange_rejection_carries_status() {
        let transport = recorder(Response::json_body(
            401,
            &json!({"message": "Token has expired"}),
        ));
        let exchange = HttpRefreshExchange::new(transport);

        let err = exchange.exchange(&RefreshToken::new("R1")).await.unwrap_err();

        match err {
            ExchangeError::Rejected { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message.as_deref(), Some("Token has expired"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn exchange_without_token_in_body_is_decode_error() {
        let transport = recorder(Response::json_body(200, &json!({"ok": true})));
        let exchange = HttpRefreshExchange::new(transport);

        let err = exchange.exchange(&RefreshToken::new("R1")).await.unwrap_err();
        assert!(matches!(err, ExchangeError::Decode { .. }));
    }
}
