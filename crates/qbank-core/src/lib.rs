//! qbank-core - Core types and traits for the qbank API client.
//!
//! This crate holds everything the authenticated client needs to agree on
//! with its collaborators: opaque tokens, the user identity returned by the
//! auth endpoints, request/response shapes, the error taxonomy and the
//! traits for the injected transport, refresh exchange and key-value store.
//! It performs no I/O.

pub mod credentials;
pub mod error;
pub mod identity;
pub mod request;
pub mod tokens;
pub mod traits;
pub mod types;

pub use credentials::{LoginForm, RegisterForm};
pub use error::{
    ClientError, ExchangeError, InvalidInputError, RefreshFailure, SessionError, StatusError,
    StoreError, TransportError,
};
pub use identity::{IdentityPatch, Role, UserIdentity};
pub use request::{Method, RequestSpec, Response, TransportRequest};
pub use tokens::{AccessToken, CredentialPair, RefreshToken};
pub use traits::{KeyValueStore, RefreshExchange, Transport};
pub use types::ApiUrl;

/// Result type alias using the client-facing error type.
pub type Result<T> = std::result::Result<T, ClientError>;

/// HTTP status the server uses to reject a missing, invalid or expired credential.
pub const UNAUTHORIZED: u16 = 401;
