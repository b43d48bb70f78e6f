//! Session state for the authenticated client.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use qbank_core::{
    AccessToken, CredentialPair, IdentityPatch, KeyValueStore, RefreshToken, SessionError,
    StoreError, UserIdentity,
};

/// Store key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "token";

/// Store key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Store key for the JSON-encoded user identity.
pub const USER_KEY: &str = "user";

/// A logged-in session: credentials and the user they belong to.
///
/// Credentials and identity only ever exist together, so a partial session
/// cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    pub credential: CredentialPair,
    pub identity: UserIdentity,
}

/// Process-wide session state, shared by the client and its callers.
///
/// All reads and writes go through this type. Mutations are atomic with
/// respect to each other and are written through to the injected
/// [`KeyValueStore`] on a best-effort basis: the in-memory session is
/// authoritative, so persistence failures are logged and not returned.
///
/// Consumers that need to react to login/logout (route guards, UI) can
/// [`subscribe`](SessionState::subscribe) for change notifications.
pub struct SessionState {
    state: watch::Sender<Option<AuthenticatedSession>>,
    store: Arc<dyn KeyValueStore>,
}

impl SessionState {
    /// Create an empty session backed by `store`.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let (state, _) = watch::channel(None);
        Self { state, store }
    }

    /// Create a session hydrated from `store`.
    ///
    /// The session is restored only when the access token, refresh token and
    /// identity are all present and the identity parses. Anything less
    /// starts an empty session.
    pub fn restore(store: Arc<dyn KeyValueStore>) -> Self {
        let restored = match load(store.as_ref()) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted session, starting logged out");
                None
            }
        };

        match &restored {
            Some(session) => debug!(user = %session.identity.username, "Restored session"),
            None => debug!("No persisted session"),
        }

        let (state, _) = watch::channel(restored);
        Self { state, store }
    }

    /// Returns a snapshot of the current session.
    pub fn current(&self) -> Option<AuthenticatedSession> {
        self.state.borrow().clone()
    }

    /// Returns true when a session is active.
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Returns true when the active session belongs to an administrator.
    pub fn is_admin(&self) -> bool {
        self.state
            .borrow()
            .as_ref()
            .is_some_and(|s| s.identity.is_admin())
    }

    /// Returns the current access token, if any.
    pub fn access_token(&self) -> Option<AccessToken> {
        self.state
            .borrow()
            .as_ref()
            .map(|s| s.credential.access_token.clone())
    }

    /// Returns the current refresh token, if any.
    pub fn refresh_token(&self) -> Option<RefreshToken> {
        self.state
            .borrow()
            .as_ref()
            .map(|s| s.credential.refresh_token.clone())
    }

    /// Returns the identity of the logged-in user, if any.
    pub fn identity(&self) -> Option<UserIdentity> {
        self.state.borrow().as_ref().map(|s| s.identity.clone())
    }

    /// Subscribe to session changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthenticatedSession>> {
        self.state.subscribe()
    }

    /// Replace the whole session.
    pub fn set_authenticated(&self, credential: CredentialPair, identity: UserIdentity) {
        info!(user = %identity.username, "Session established");
        let store = self.store.as_ref();
        self.state.send_modify(|current| {
            let session = AuthenticatedSession {
                credential,
                identity,
            };
            log_store_error(save(store, &session), "persist session");
            *current = Some(session);
        });
    }

    /// Replace only the access token.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoActiveSession`] if no session is active.
    pub fn update_access_token(&self, token: AccessToken) -> Result<(), SessionError> {
        let store = self.store.as_ref();
        let updated = self.state.send_if_modified(|current| match current {
            Some(session) => {
                log_store_error(
                    store.set(ACCESS_TOKEN_KEY, token.as_str()),
                    "persist access token",
                );
                session.credential.access_token = token;
                true
            }
            None => false,
        });

        if updated {
            debug!("Access token replaced");
            Ok(())
        } else {
            Err(SessionError::NoActiveSession)
        }
    }

    /// Replace the identity of the active session, e.g. after `/auth/me`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoActiveSession`] if no session is active.
    pub fn replace_identity(&self, identity: UserIdentity) -> Result<(), SessionError> {
        let store = self.store.as_ref();
        let updated = self.state.send_if_modified(|current| match current {
            Some(session) => {
                log_store_error(save_identity(store, &identity), "persist identity");
                session.identity = identity;
                true
            }
            None => false,
        });

        if updated {
            Ok(())
        } else {
            Err(SessionError::NoActiveSession)
        }
    }

    /// Apply a partial identity update. Does nothing when logged out.
    pub fn update_identity(&self, patch: IdentityPatch) {
        let store = self.store.as_ref();
        self.state.send_if_modified(|current| match current {
            Some(session) => {
                session.identity.apply(patch);
                log_store_error(save_identity(store, &session.identity), "persist identity");
                true
            }
            None => false,
        });
    }

    /// End the session and forget the persisted credentials.
    pub fn clear(&self) {
        let store = self.store.as_ref();
        let was_active = self.state.send_if_modified(|current| {
            for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
                log_store_error(store.remove(key), "remove persisted session");
            }
            current.take().is_some()
        });

        if was_active {
            info!("Session cleared");
        }
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field(
                "user",
                &self.state.borrow().as_ref().map(|s| s.identity.username.clone()),
            )
            .field("tokens", &"[REDACTED]")
            .finish()
    }
}

fn load(store: &dyn KeyValueStore) -> Result<Option<AuthenticatedSession>, StoreError> {
    let access = store.get(ACCESS_TOKEN_KEY)?;
    let refresh = store.get(REFRESH_TOKEN_KEY)?;
    let user = store.get(USER_KEY)?;

    let (Some(access), Some(refresh), Some(user)) = (access, refresh, user) else {
        return Ok(None);
    };

    let identity: UserIdentity = serde_json::from_str(&user)?;

    Ok(Some(AuthenticatedSession {
        credential: CredentialPair::new(AccessToken::new(access), RefreshToken::new(refresh)),
        identity,
    }))
}

fn save(store: &dyn KeyValueStore, session: &AuthenticatedSession) -> Result<(), StoreError> {
    store.set(ACCESS_TOKEN_KEY, session.credential.access_token.as_str())?;
    store.set(REFRESH_TOKEN_KEY, session.credential.refresh_token.as_str())?;
    save_identity(store, &session.identity)
}

fn save_identity(store: &dyn KeyValueStore, identity: &UserIdentity) -> Result<(), StoreError> {
    let json = serde_json::to_string(identity)?;
    store.set(USER_KEY, &json)
}

fn log_store_error(result: Result<(), StoreError>, action: &str) {
    if let Err(e) = result {
        warn!(error = %e, action, "Session storage failed");
    }
}
