//! Renewal coalescing.
//!
//! When several in-flight requests discover an expired access token at the
//! same time, exactly one rotation call must go out and every blocked
//! request must receive its outcome. The mechanism is a single-slot state:
//! an empty slot means no renewal is running; an occupied slot holds a
//! shared future that late arrivals attach to instead of starting a second
//! rotation. Attach-or-create happens under one async mutex acquisition, so
//! there is no window between observing "no renewal in flight" and becoming
//! the renewal owner.
//!
//! The slot is cleared only once the shared future has settled, so a later
//! authentication failure always starts a fresh cycle instead of being
//! stuck on a finished one. Callers each hold their own clone of the shared
//! future; dropping the coordinator (or flushing it) never leaves a caller
//! suspended.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::SessionTokens;

/// Why a renewal cycle failed. Cloneable so every attached caller receives
/// the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenewalError {
    /// No refresh token was held; there was nothing to rotate.
    #[error("no refresh token held")]
    NoRefreshToken,

    /// The rotation call was rejected or did not complete.
    #[error("rotation failed: {0}")]
    Rejected(String),
}

type SharedRenewal = Shared<BoxFuture<'static, Result<SessionTokens, RenewalError>>>;

/// Single-slot coordinator collapsing concurrent renewal triggers into one
/// rotation call.
pub(crate) struct RenewalCoordinator {
    slot: Mutex<Option<SharedRenewal>>,
}

impl RenewalCoordinator {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Join the in-flight renewal, or become its owner by starting `start`.
    ///
    /// Every caller of an overlapping `renew` observes the same outcome.
    pub async fn renew<F>(&self, start: F) -> Result<SessionTokens, RenewalError>
    where
        F: FnOnce() -> BoxFuture<'static, Result<SessionTokens, RenewalError>>,
    {
        let renewal = {
            let mut slot = self.slot.lock().await;
            match slot.as_ref().filter(|f| f.peek().is_none()) {
                Some(in_flight) => in_flight.clone(),
                None => {
                    let started = start().shared();
                    *slot = Some(started.clone());
                    started
                }
            }
        };

        let outcome = renewal.await;

        // Clear only a settled future; an unsettled one belongs to a newer
        // cycle that began while we were awaiting.
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|f| f.peek().is_some()) {
            *slot = None;
        }

        outcome
    }

    /// Drop the in-flight handle on teardown. Callers already attached hold
    /// their own clones and settle independently.
    pub async fn flush(&self) {
        *self.slot.lock().await = None;
    }
}
