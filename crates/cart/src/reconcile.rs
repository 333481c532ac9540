//! Guest-cart merge and authoritative re-fetch.
//!
//! Optimistic mutations are never rolled back. Staleness is bounded by
//! [`ReconciliationService::refresh`], which replaces the store with the
//! server cart; it runs after every merge, on cart-page loads and, when
//! configured, on a timer via [`ReconciliationService::spawn_periodic`].

use std::sync::Arc;
use std::time::Duration;

use shopfront_core::CartLineItem;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::api::{CartBackend, GuestItem, MergeGuestCartRequest};
use crate::error::CartError;
use crate::persistence::PersistenceAdapter;
use crate::session::{Credentials, SessionHandle};
use crate::store::CartStateStore;
use crate::sync::RemoteOutcome;

/// Result of merging a guest cart on sign-in.
#[derive(Debug)]
pub enum MergeOutcome {
    /// No guest lines; the server cart was fetched directly.
    Skipped(RemoteOutcome),
    /// Server absorbed the guest lines; local copy cleared and server cart fetched.
    Merged(RemoteOutcome),
    /// Server accepted the call but kept the guest cart pending.
    Retained,
    /// Merge call failed; the guest cart is kept for the next sign-in.
    Failed(CartError),
}

impl MergeOutcome {
    /// Whether guest lines are still waiting in local storage.
    #[must_use]
    pub const fn guest_cart_pending(&self) -> bool {
        matches!(self, Self::Retained | Self::Failed(_))
    }
}

/// Brings the store in line with the server cart.
#[derive(Clone)]
pub struct ReconciliationService {
    store: CartStateStore,
    persistence: PersistenceAdapter,
    backend: Arc<dyn CartBackend>,
}

impl ReconciliationService {
    #[must_use]
    pub fn new(
        store: CartStateStore,
        persistence: PersistenceAdapter,
        backend: Arc<dyn CartBackend>,
    ) -> Self {
        Self {
            store,
            persistence,
            backend,
        }
    }

    /// Merge `guest_items` into the customer's server cart.
    ///
    /// Called once, right after a successful login or registration. Only
    /// product ids and quantities are sent. Never fails the sign-in.
    pub async fn merge_guest_cart(
        &self,
        credentials: &Credentials,
        guest_items: &[CartLineItem],
    ) -> MergeOutcome {
        if guest_items.is_empty() {
            debug!(customer_id = %credentials.customer_id, "No guest cart to merge");
            return MergeOutcome::Skipped(self.refresh(credentials).await);
        }

        let request = MergeGuestCartRequest {
            customer_id: credentials.customer_id.clone(),
            guest_items: guest_items.iter().map(GuestItem::from).collect(),
        };

        match self
            .backend
            .merge_guest_cart(&credentials.token, &request)
            .await
        {
            Ok(response) if response.clear_guest_cart => {
                info!(
                    customer_id = %credentials.customer_id,
                    lines = request.guest_items.len(),
                    "Guest cart merged"
                );
                self.persistence.clear_local();
                MergeOutcome::Merged(self.refresh(credentials).await)
            }
            Ok(response) => {
                warn!(
                    customer_id = %credentials.customer_id,
                    message = ?response.message,
                    "Server kept the guest cart pending"
                );
                MergeOutcome::Retained
            }
            Err(e) => {
                error!(
                    customer_id = %credentials.customer_id,
                    error = %e,
                    "Guest cart merge failed, keeping local cart"
                );
                MergeOutcome::Failed(e)
            }
        }
    }

    /// Replace the store with the server cart and mirror it locally.
    ///
    /// On failure the store is left as it was.
    pub async fn refresh(&self, credentials: &Credentials) -> RemoteOutcome {
        match self.persistence.fetch_remote(credentials).await {
            Ok(remote) => {
                self.persistence.save_mirror(&remote.state);
                self.store.replace(remote.state);
                RemoteOutcome::Synced
            }
            Err(e) => RemoteOutcome::Failed(e),
        }
    }

    /// Refresh every `interval` while `session` is authenticated.
    ///
    /// Guest ticks are skipped. The task runs until aborted.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn_periodic(&self, session: SessionHandle, interval: Duration) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(credentials) = session.credentials() else {
                    continue;
                };
                if let RemoteOutcome::Failed(e) = this.refresh(&credentials).await {
                    debug!(error = %e, "Periodic cart refresh failed");
                }
            }
        })
    }
}

impl std::fmt::Debug for ReconciliationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationService")
            .field("persistence", &self.persistence)
            .finish_non_exhaustive()
    }
}
