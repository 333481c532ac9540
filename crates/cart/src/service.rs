//! Cart mutation operations and session lifecycle.
//!
//! Each operation reads the current [`Session`](crate::Session) to pick its
//! mode. Guests mutate the store and local storage only. Signed-in
//! customers get an optimistic store update followed by a backend call:
//!
//! - adds wait for the backend and re-fetch, because the server may refuse
//!   for stock and owns the resulting quantities
//! - quantity changes and removals keep the optimistic state and fire the
//!   backend call as a [`SyncTask`] without re-fetching
//!
//! Backend failures are logged and reported through [`RemoteOutcome`]; they
//! never undo the local change and are never retried here. Two quick changes
//! to the same line may reach the backend out of order; the local state
//! reflects the latest intent and the next [`CartService::refresh`] settles
//! the server view.

use std::sync::Arc;
use std::time::Duration;

use shopfront_core::{CartState, Product};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::api::{AddItemRequest, CartBackend, HttpCartBackend, RemoteCart, RemoveQuantityRequest};
use crate::config::CartConfig;
use crate::error::CartError;
use crate::persistence::PersistenceAdapter;
use crate::reconcile::{MergeOutcome, ReconciliationService};
use crate::session::{Credentials, SessionHandle};
use crate::storage::{FileStorage, LocalStorage};
use crate::store::CartStateStore;
use crate::sync::{RemoteOutcome, SyncTask};
use crate::view::{BadgeWatcher, CartBadge, CartView};

/// Entry point for every cart read and write.
///
/// Cheaply cloneable; clones share the same store, session and storage.
/// Create one at start-up and pass it to whatever renders the cart.
#[derive(Clone)]
pub struct CartService {
    inner: Arc<CartServiceInner>,
}

struct CartServiceInner {
    store: CartStateStore,
    session: SessionHandle,
    persistence: PersistenceAdapter,
    reconciler: ReconciliationService,
    backend: Arc<dyn CartBackend>,
}

impl CartService {
    /// Create a guest-session cart over the given backend and storage.
    ///
    /// The store starts empty; call [`Self::hydrate`] to load local storage.
    #[must_use]
    pub fn new(
        backend: Arc<dyn CartBackend>,
        storage: Arc<dyn LocalStorage>,
        cart_key: &str,
    ) -> Self {
        let store = CartStateStore::default();
        let persistence = PersistenceAdapter::new(storage, Arc::clone(&backend), cart_key);
        let reconciler =
            ReconciliationService::new(store.clone(), persistence.clone(), Arc::clone(&backend));

        Self {
            inner: Arc::new(CartServiceInner {
                store,
                session: SessionHandle::default(),
                persistence,
                reconciler,
                backend,
            }),
        }
    }

    /// Create a cart backed by the HTTP API and file storage from `config`.
    ///
    /// Signs in with the configured credentials, if any, and hydrates the
    /// store from local storage.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Url`] if the API URL is unusable.
    pub fn from_config(config: &CartConfig) -> Result<Self, CartError> {
        let backend = HttpCartBackend::new(config.api_url.as_str())?;
        let storage = FileStorage::new(&config.storage_dir);
        let service = Self::new(Arc::new(backend), Arc::new(storage), &config.cart_key);

        if let Some(credentials) = &config.credentials {
            service.inner.session.sign_in(credentials.clone());
        }
        service.hydrate();
        Ok(service)
    }

    #[must_use]
    pub fn store(&self) -> &CartStateStore {
        &self.inner.store
    }

    #[must_use]
    pub fn session(&self) -> &SessionHandle {
        &self.inner.session
    }

    #[must_use]
    pub fn persistence(&self) -> &PersistenceAdapter {
        &self.inner.persistence
    }

    #[must_use]
    pub fn reconciler(&self) -> &ReconciliationService {
        &self.inner.reconciler
    }

    /// Display model of the current cart.
    #[must_use]
    pub fn view(&self) -> CartView {
        self.inner.store.read(|state| CartView::from(state))
    }

    #[must_use]
    pub fn badge(&self) -> CartBadge {
        self.inner.store.read(|state| CartBadge::from(state))
    }

    /// Follow the badge count through every store change.
    #[must_use]
    pub fn watch_badge(&self) -> BadgeWatcher {
        BadgeWatcher::new(&self.inner.store)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Load local storage into the store.
    pub fn hydrate(&self) {
        self.inner.store.replace(self.inner.persistence.load_local());
    }

    /// Sign in and merge the guest cart into the customer's server cart.
    #[instrument(skip(self, credentials), fields(customer_id = %credentials.customer_id))]
    pub async fn login(&self, credentials: Credentials) -> MergeOutcome {
        info!("Customer signed in");
        self.sign_in_and_merge(credentials).await
    }

    /// Same as [`Self::login`], for a freshly registered customer.
    #[instrument(skip(self, credentials), fields(customer_id = %credentials.customer_id))]
    pub async fn register(&self, credentials: Credentials) -> MergeOutcome {
        info!("Customer registered");
        self.sign_in_and_merge(credentials).await
    }

    async fn sign_in_and_merge(&self, credentials: Credentials) -> MergeOutcome {
        self.inner.session.sign_in(credentials.clone());
        let guest_items = self.inner.persistence.pending_guest_lines();
        self.inner.persistence.save_pending(&guest_items);
        self.inner
            .reconciler
            .merge_guest_cart(&credentials, &guest_items)
            .await
    }

    /// Return to a guest session.
    ///
    /// The server mirror is dropped from local storage; guest lines that were
    /// never merged stay and become the guest cart again.
    pub fn logout(&self) {
        self.inner.session.sign_out();
        let pending = CartState::from_lines(self.inner.persistence.pending_guest_lines());
        self.inner.persistence.clear_local();
        if !pending.is_empty() {
            self.inner.persistence.save_local(&pending);
        }
        self.inner.store.replace(pending);
        info!("Customer signed out");
    }

    /// Re-read the authoritative cart: the server cart when signed in, local
    /// storage otherwise.
    pub async fn refresh(&self) -> RemoteOutcome {
        match self.inner.session.credentials() {
            Some(credentials) => self.inner.reconciler.refresh(&credentials).await,
            None => {
                self.hydrate();
                RemoteOutcome::LocalOnly
            }
        }
    }

    /// Start the periodic reconciliation pass.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn_periodic_refresh(&self, interval: Duration) -> JoinHandle<()> {
        self.inner
            .reconciler
            .spawn_periodic(self.inner.session.clone(), interval)
    }

    /// Empty the cart after an order went through.
    pub async fn complete_checkout(&self) -> RemoteOutcome {
        info!(
            lines = self.inner.store.read(CartState::len),
            "Checkout complete, emptying cart"
        );
        self.empty_cart().await
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` units of `product`.
    ///
    /// # Errors
    ///
    /// - [`CartError::InvalidQuantity`] if `quantity` is zero
    /// - [`CartError::InsufficientStock`] if the backend refuses the add; the
    ///   cart is left unchanged
    ///
    /// Backend failures are returned as [`RemoteOutcome::Failed`].
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_to_cart(
        &self,
        product: &Product,
        quantity: u32,
    ) -> Result<RemoteOutcome, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let Some(credentials) = self.inner.session.credentials() else {
            let next = self.inner.store.read(|state| state.with_added(product, quantity));
            self.commit(next);
            return Ok(RemoteOutcome::LocalOnly);
        };

        let request = AddItemRequest {
            customer_id: credentials.customer_id.clone(),
            product_id: product.id.clone(),
            quantity,
        };

        match self
            .inner
            .backend
            .add_item(&credentials.token, &request)
            .await
        {
            Ok(response) if response.insufficient_stock => {
                warn!(message = ?response.message, "Not enough stock to add item");
                Err(CartError::InsufficientStock(product.id.clone()))
            }
            Ok(_) => Ok(self.inner.reconciler.refresh(&credentials).await),
            Err(e) => {
                error!(error = %e, "Failed to add item to cart");
                Ok(RemoteOutcome::Failed(e))
            }
        }
    }

    /// Raise the quantity of the line at `index` to `new_quantity`.
    ///
    /// # Errors
    ///
    /// - [`CartError::LineNotFound`] if there is no such line
    /// - [`CartError::ExceedsStock`] if `new_quantity` is above the line's stock
    /// - [`CartError::InvalidQuantity`] if `new_quantity` is zero or below the
    ///   current quantity
    ///
    /// A signed-in customer's guest line that is still waiting to be merged
    /// only changes locally; the merge sends its final quantity.
    ///
    /// # Panics
    ///
    /// Panics if a backend call is needed outside a Tokio runtime.
    pub fn increase_quantity(&self, index: usize, new_quantity: u32) -> Result<SyncTask, CartError> {
        let current = self.inner.store.snapshot();
        let line = current.get(index).ok_or(CartError::LineNotFound(index))?;

        if new_quantity > line.stock {
            warn!(
                product_id = %line.product_id,
                requested = new_quantity,
                stock = line.stock,
                "Quantity above available stock"
            );
            return Err(CartError::ExceedsStock {
                requested: new_quantity,
                stock: line.stock,
            });
        }
        if new_quantity == 0 || new_quantity < line.quantity {
            return Err(CartError::InvalidQuantity);
        }

        let added = new_quantity.saturating_sub(line.quantity);
        let product_id = line.product_id.clone();
        let pending_guest = line.remote_item_id.is_none();
        let next = current
            .with_quantity(index, new_quantity)
            .ok_or(CartError::LineNotFound(index))?;
        self.commit(next);

        let Some(credentials) = self.inner.session.credentials() else {
            return Ok(SyncTask::local());
        };
        if pending_guest {
            self.inner
                .persistence
                .set_pending_quantity(&product_id, new_quantity);
            return Ok(SyncTask::local());
        }
        if added == 0 {
            return Ok(SyncTask::local());
        }

        let backend = Arc::clone(&self.inner.backend);
        Ok(SyncTask::spawn(async move {
            let request = AddItemRequest {
                customer_id: credentials.customer_id.clone(),
                product_id,
                quantity: added,
            };
            match backend.add_item(&credentials.token, &request).await {
                Ok(response) if response.insufficient_stock => {
                    warn!(product_id = %request.product_id, "Backend refused quantity increase");
                    RemoteOutcome::Failed(CartError::InsufficientStock(request.product_id))
                }
                Ok(_) => RemoteOutcome::Synced,
                Err(e) => {
                    error!(product_id = %request.product_id, error = %e, "Failed to increase quantity");
                    RemoteOutcome::Failed(e)
                }
            }
        }))
    }

    /// Lower the quantity of the line at `index` to `new_quantity`.
    ///
    /// A quantity of zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] if there is no such line.
    ///
    /// # Panics
    ///
    /// Panics if a backend call is needed outside a Tokio runtime.
    pub fn decrease_quantity(&self, index: usize, new_quantity: u32) -> Result<SyncTask, CartError> {
        if new_quantity == 0 {
            return self.remove_item(index);
        }

        let current = self.inner.store.snapshot();
        let line = current.get(index).ok_or(CartError::LineNotFound(index))?;
        let removed = line.quantity.saturating_sub(new_quantity);
        let product_id = line.product_id.clone();
        let remote_item_id = line.remote_item_id.clone();
        let next = current
            .with_quantity(index, new_quantity)
            .ok_or(CartError::LineNotFound(index))?;
        self.commit(next);

        let Some(credentials) = self.inner.session.credentials() else {
            return Ok(SyncTask::local());
        };
        let Some(item_id) = remote_item_id else {
            self.inner
                .persistence
                .set_pending_quantity(&product_id, new_quantity);
            return Ok(SyncTask::local());
        };
        if removed == 0 {
            return Ok(SyncTask::local());
        }

        let backend = Arc::clone(&self.inner.backend);
        Ok(SyncTask::spawn(async move {
            let request = RemoveQuantityRequest {
                item_id,
                quantity: removed,
            };
            let result = backend
                .remove_item_quantity(&credentials.token, &request)
                .await
                .inspect_err(|e| {
                    error!(item_id = %request.item_id, error = %e, "Failed to decrease quantity");
                });
            RemoteOutcome::from(result)
        }))
    }

    /// Remove the line at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] if there is no such line.
    ///
    /// # Panics
    ///
    /// Panics if a backend call is needed outside a Tokio runtime.
    pub fn remove_item(&self, index: usize) -> Result<SyncTask, CartError> {
        let (next, removed) = self
            .inner
            .store
            .read(|state| state.without(index))
            .ok_or(CartError::LineNotFound(index))?;
        self.commit(next);

        let Some(credentials) = self.inner.session.credentials() else {
            return Ok(SyncTask::local());
        };
        let Some(item_id) = removed.remote_item_id else {
            self.inner
                .persistence
                .set_pending_quantity(&removed.product_id, 0);
            return Ok(SyncTask::local());
        };

        let backend = Arc::clone(&self.inner.backend);
        Ok(SyncTask::spawn(async move {
            let result = backend
                .remove_item(&credentials.token, &item_id)
                .await
                .inspect_err(|e| {
                    error!(item_id = %item_id, error = %e, "Failed to remove cart line");
                });
            RemoteOutcome::from(result)
        }))
    }

    /// Empty the cart.
    ///
    /// The store and local storage are cleared whatever the session or the
    /// backend says. Signed-in customers also get their server cart cleared,
    /// which takes a cart-id lookup first.
    pub async fn empty_cart(&self) -> RemoteOutcome {
        self.inner.store.clear();
        self.inner.persistence.clear_local();

        match self.inner.session.credentials() {
            Some(credentials) => self.clear_remote(&credentials).await,
            None => RemoteOutcome::LocalOnly,
        }
    }

    async fn clear_remote(&self, credentials: &Credentials) -> RemoteOutcome {
        let cart_id = match self.inner.persistence.fetch_remote(credentials).await {
            Ok(RemoteCart {
                cart_id: Some(cart_id),
                ..
            }) => cart_id,
            Ok(_) => {
                let e = CartError::CartNotFound(credentials.customer_id.clone());
                error!(error = %e, "Cannot clear server cart");
                return RemoteOutcome::Failed(e);
            }
            Err(e) => return RemoteOutcome::Failed(e),
        };

        self.inner
            .backend
            .clear_cart(&credentials.token, &cart_id)
            .await
            .inspect_err(|e| {
                error!(cart_id = %cart_id, error = %e, "Failed to clear server cart");
            })
            .into()
    }

    /// Publish `state` and write it through to local storage.
    fn commit(&self, state: CartState) {
        if self.inner.session.is_authenticated() {
            self.inner.persistence.save_mirror(&state);
        } else {
            self.inner.persistence.save_local(&state);
        }
        self.inner.store.replace(state);
    }
}

impl std::fmt::Debug for CartService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartService")
            .field("session", &self.inner.session)
            .field("store", &self.inner.store)
            .finish_non_exhaustive()
    }
}
