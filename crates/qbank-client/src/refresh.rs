//! Single-flight refresh coordination.
//!
//! However many requests see their credential rejected at the same time,
//! only one refresh exchange runs. The first request to arrive starts a
//! refresh operation on its own task; every request arriving while it runs
//! awaits a clone of the same shared outcome. The operation task owns its
//! slot: it clears the slot when the exchange finishes, before any waiter
//! is woken, so a later expiry starts a fresh operation. Dropping a waiter
//! never cancels the operation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;
use tracing::{Instrument, debug, info, info_span, warn};

use qbank_core::{AccessToken, RefreshExchange, RefreshFailure, RefreshToken};

use crate::session::SessionState;

/// What every waiter of one refresh operation receives.
pub type RefreshOutcome = Result<AccessToken, RefreshFailure>;

type SharedOutcome = Shared<BoxFuture<'static, RefreshOutcome>>;
type Slot = Arc<Mutex<Option<SharedOutcome>>>;

/// Refresh state of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    RefreshInFlight,
}

pub(crate) struct RefreshCoordinator {
    session: Arc<SessionState>,
    exchange: Arc<dyn RefreshExchange>,
    in_flight: Slot,
}

impl RefreshCoordinator {
    pub(crate) fn new(session: Arc<SessionState>, exchange: Arc<dyn RefreshExchange>) -> Self {
        Self {
            session,
            exchange,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn state(&self) -> RefreshState {
        if lock(&self.in_flight).is_some() {
            RefreshState::RefreshInFlight
        } else {
            RefreshState::Idle
        }
    }

    /// Join the in-flight refresh, or start one if none is running.
    pub(crate) async fn coordinate(&self) -> RefreshOutcome {
        let outcome = {
            let mut slot = lock(&self.in_flight);
            match slot.as_ref() {
                Some(pending) => {
                    debug!("Joining in-flight refresh");
                    pending.clone()
                }
                None => {
                    let pending = self.start();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        outcome.await
    }

    /// Spawn a refresh operation. Must be called with the slot locked.
    fn start(&self) -> SharedOutcome {
        let (tx, rx) = oneshot::channel();
        let refresh_token = self.session.refresh_token();
        let mut guard = InFlightGuard {
            slot: Arc::clone(&self.in_flight),
            session: Arc::clone(&self.session),
            completed: false,
        };
        let exchange = Arc::clone(&self.exchange);

        tokio::spawn(
            async move {
                let outcome = run(&guard.session, exchange.as_ref(), refresh_token).await;
                guard.completed = true;
                drop(guard);
                let _ = tx.send(outcome);
            }
            .instrument(info_span!("refresh")),
        );

        rx.map(|received| received.unwrap_or(Err(RefreshFailure::Aborted)))
            .boxed()
            .shared()
    }
}

async fn run(
    session: &SessionState,
    exchange: &dyn RefreshExchange,
    refresh_token: Option<RefreshToken>,
) -> RefreshOutcome {
    let Some(refresh_token) = refresh_token else {
        warn!("No refresh token, session cannot be renewed");
        session.clear();
        return Err(RefreshFailure::NoRefreshToken);
    };

    info!("Refreshing access token");

    match exchange.exchange(&refresh_token).await {
        Ok(access_token) => match session.update_access_token(access_token.clone()) {
            Ok(()) => {
                debug!("Access token refreshed");
                Ok(access_token)
            }
            Err(e) => {
                warn!(error = %e, "Session ended while refreshing");
                Err(RefreshFailure::NoActiveSession)
            }
        },
        Err(e) => {
            warn!(error = %e, "Refresh exchange failed, ending session");
            session.clear();
            Err(RefreshFailure::Exchange(e.to_string()))
        }
    }
}

/// Clears the in-flight slot when the operation task finishes or is torn down.
///
/// A task that never completed (panic, runtime shutdown) also ends the
/// session, persisted copy included: its waiters are told the session
/// expired, and a `SessionExpired` caller must never find a live session.
/// A shut-down process therefore starts logged out next time even though
/// the refresh token was never rejected.
struct InFlightGuard {
    slot: Slot,
    session: Arc<SessionState>,
    completed: bool,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.completed {
            self.session.clear();
        }
        lock(&self.slot).take();
    }
}

fn lock(slot: &Mutex<Option<SharedOutcome>>) -> MutexGuard<'_, Option<SharedOutcome>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
