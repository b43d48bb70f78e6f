//! qbank-client - Authenticated HTTP client for the qbank API
//!
//! All API traffic flows through an [`AuthenticatedClient`], which attaches
//! the bearer token held by a [`SessionState`] and transparently renews it
//! when the server rejects it. However many requests fail at once, a single
//! refresh exchange runs and every one of them retries with its result.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use qbank_client::{AuthenticatedClient, ClientConfig, FileStore, SessionState};
//! use qbank_core::RequestSpec;
//!
//! # async fn example() -> qbank_core::Result<()> {
//! let store = Arc::new(FileStore::new("/tmp/qbank/session.json"));
//! let session = Arc::new(SessionState::restore(store));
//! let client = AuthenticatedClient::from_config(&ClientConfig::from_env()?, session)?;
//!
//! if let Some(user) = client.current_user().await? {
//!     println!("logged in as {}", user.username);
//!     let banks = client.send(RequestSpec::get("/banks").query("page", "1")).await?;
//!     println!("{}", banks.text());
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod http;
pub mod refresh;
pub mod session;
pub mod store;

pub use auth::HttpRefreshExchange;
pub use client::AuthenticatedClient;
pub use config::{API_URL_ENV, ClientConfig, DEFAULT_API_URL, DEFAULT_TIMEOUT, TIMEOUT_ENV};
pub use http::HttpTransport;
pub use refresh::{RefreshOutcome, RefreshState};
pub use session::{
    ACCESS_TOKEN_KEY, AuthenticatedSession, REFRESH_TOKEN_KEY, SessionState, USER_KEY,
};
pub use store::{FileStore, MemoryStore};
