//! Refresh exchange trait.

use async_trait::async_trait;

use crate::error::ExchangeError;
use crate::tokens::{AccessToken, RefreshToken};

/// Trades a refresh token for a new access token.
///
/// The client calls this at most once per coordination cycle and never
/// retries it; any retry policy belongs to the implementation.
#[async_trait]
pub trait RefreshExchange: Send + Sync {
    async fn exchange(&self, refresh_token: &RefreshToken) -> Result<AccessToken, ExchangeError>;
}
