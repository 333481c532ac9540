//! Durable copies of the cart.
//!
//! Guest carts live only in local storage. Once a customer signs in, the
//! cart key mirrors the server cart as a cache, and guest lines still
//! waiting to be merged move to a separate pending key that mirroring never
//! touches. The adapter is always written through and never read as the
//! primary source while a session is running.

use std::sync::Arc;

use serde_json::Value;
use shopfront_core::{CartLineItem, CartState, ProductId};
use tracing::{debug, warn};

use crate::api::{CartBackend, RemoteCart, lines_from_values};
use crate::error::CartError;
use crate::session::Credentials;
use crate::storage::LocalStorage;

/// Key the cart blob is stored under unless configured otherwise.
pub const DEFAULT_CART_KEY: &str = "cart";

/// Suffix of the key holding guest lines not yet merged.
const PENDING_SUFFIX: &str = ".pending";

/// Values a broken writer leaves behind when it stores a missing value.
const MISSING_PLACEHOLDERS: &[&str] = &["", "undefined", "null"];

/// Reads and writes the local cart blob and fetches the server cart.
#[derive(Clone)]
pub struct PersistenceAdapter {
    storage: Arc<dyn LocalStorage>,
    backend: Arc<dyn CartBackend>,
    key: Arc<str>,
    pending_key: Arc<str>,
}

impl PersistenceAdapter {
    #[must_use]
    pub fn new(
        storage: Arc<dyn LocalStorage>,
        backend: Arc<dyn CartBackend>,
        key: impl Into<Arc<str>>,
    ) -> Self {
        let key = key.into();
        let pending_key = format!("{key}{PENDING_SUFFIX}").into();
        Self {
            storage,
            backend,
            key,
            pending_key,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Key of the pending guest lines.
    #[must_use]
    pub fn pending_key(&self) -> &str {
        &self.pending_key
    }

    /// Load the cart blob from local storage.
    ///
    /// Absent, unparsable and placeholder values all yield an empty cart;
    /// failures are logged, never returned.
    #[must_use]
    pub fn load_local(&self) -> CartState {
        self.read(&self.key)
    }

    /// Write the full state to local storage. Errors are logged.
    pub fn save_local(&self, state: &CartState) {
        self.write(&self.key, state);
    }

    /// Mirror an authenticated cart locally.
    ///
    /// Pending guest lines sit under [`Self::pending_key`] and are left as
    /// they are, even when `state` holds the same products.
    pub fn save_mirror(&self, state: &CartState) {
        self.write(&self.key, state);
    }

    /// Guest lines that have never reached the server.
    ///
    /// Lines under the pending key come first, followed by guest lines of the
    /// cart blob for products not already pending.
    #[must_use]
    pub fn pending_guest_lines(&self) -> Vec<CartLineItem> {
        let pending = self.read(&self.pending_key);
        let local = self.load_local();
        let extra: Vec<CartLineItem> = local
            .guest_lines()
            .filter(|line| pending.position(&line.product_id).is_none())
            .cloned()
            .collect();
        pending.into_lines().into_iter().chain(extra).collect()
    }

    /// Hold `lines` under the pending key until a merge absorbs them.
    pub fn save_pending(&self, lines: &[CartLineItem]) {
        let state = CartState::from_lines(lines.iter().cloned());
        if state.is_empty() {
            self.remove(&self.pending_key);
        } else {
            self.write(&self.pending_key, &state);
        }
    }

    /// Set the pending quantity of one guest product; zero drops it.
    pub fn set_pending_quantity(&self, product_id: &ProductId, quantity: u32) {
        let lines: Vec<CartLineItem> = self
            .pending_guest_lines()
            .into_iter()
            .filter_map(|mut line| {
                if &line.product_id == product_id {
                    line.quantity = quantity;
                }
                (line.quantity > 0).then_some(line)
            })
            .collect();
        debug!(product_id = %product_id, quantity, "Updated pending guest line");
        self.save_pending(&lines);
    }

    /// Remove the cart blob and the pending guest lines. Errors are logged.
    pub fn clear_local(&self) {
        self.remove(&self.key);
        self.remove(&self.pending_key);
    }

    /// Fetch and normalise the customer's server cart.
    ///
    /// # Errors
    ///
    /// Returns the backend error; non-success statuses are logged with their
    /// code. Callers leave the store untouched on error.
    pub async fn fetch_remote(&self, credentials: &Credentials) -> Result<RemoteCart, CartError> {
        self.backend
            .cart_by_customer(&credentials.token, &credentials.customer_id)
            .await
            .inspect_err(|e| {
                warn!(
                    customer_id = %credentials.customer_id,
                    status = ?e.status(),
                    error = %e,
                    "Could not fetch server cart"
                );
            })
    }

    fn read(&self, key: &str) -> CartState {
        let raw = match self.storage.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return CartState::default(),
            Err(e) => {
                warn!(key, error = %e, "Could not read local cart, starting empty");
                return CartState::default();
            }
        };

        if MISSING_PLACEHOLDERS.contains(&raw.trim()) {
            debug!(key, value = %raw.trim(), "Local cart holds a placeholder");
            return CartState::default();
        }

        match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(values) => lines_from_values(values),
            Err(e) => {
                warn!(key, error = %e, "Local cart is corrupt, starting empty");
                CartState::default()
            }
        }
    }

    fn write(&self, key: &str, state: &CartState) {
        let raw = match serde_json::to_string(state) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Could not serialise cart");
                return;
            }
        };
        if let Err(e) = self.storage.set_item(key, &raw) {
            warn!(key, error = %e, "Could not write local cart");
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.storage.remove_item(key) {
            warn!(key, error = %e, "Could not clear local cart");
        }
    }
}

impl std::fmt::Debug for PersistenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceAdapter")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
pub(crate) mod tests {
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use shopfront_core::{CartId, CartItemId, CustomerId, Product, ProductId};

    use super::*;
    use crate::api::{
        AddItemRequest, AddItemResponse, MergeGuestCartRequest, MergeGuestCartResponse,
        RemoveQuantityRequest,
    };
    use crate::storage::MemoryStorage;

    /// Backend for tests that never reach the network.
    pub(crate) struct OfflineBackend;

    #[async_trait]
    impl CartBackend for OfflineBackend {
        async fn cart_by_customer(
            &self,
            _token: &SecretString,
            _customer_id: &CustomerId,
        ) -> Result<RemoteCart, CartError> {
            Err(CartError::Status {
                status: 503,
                body: "offline".to_string(),
            })
        }

        async fn add_item(
            &self,
            _token: &SecretString,
            _request: &AddItemRequest,
        ) -> Result<AddItemResponse, CartError> {
            Err(CartError::NotAuthenticated)
        }

        async fn remove_item_quantity(
            &self,
            _token: &SecretString,
            _request: &RemoveQuantityRequest,
        ) -> Result<(), CartError> {
            Err(CartError::NotAuthenticated)
        }

        async fn remove_item(
            &self,
            _token: &SecretString,
            _item_id: &CartItemId,
        ) -> Result<(), CartError> {
            Err(CartError::NotAuthenticated)
        }

        async fn clear_cart(
            &self,
            _token: &SecretString,
            _cart_id: &CartId,
        ) -> Result<(), CartError> {
            Err(CartError::NotAuthenticated)
        }

        async fn merge_guest_cart(
            &self,
            _token: &SecretString,
            _request: &MergeGuestCartRequest,
        ) -> Result<MergeGuestCartResponse, CartError> {
            Err(CartError::NotAuthenticated)
        }
    }

    fn adapter() -> (PersistenceAdapter, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let adapter = PersistenceAdapter::new(
            storage.clone(),
            Arc::new(OfflineBackend),
            DEFAULT_CART_KEY,
        );
        (adapter, storage)
    }

    fn product(id: i64, price: i64) -> Product {
        Product {
            id: ProductId::from(id),
            name: format!("Product {id}"),
            price: Decimal::from(price),
            stock: 10,
        }
    }

    #[test]
    fn test_load_local_absent_is_empty() {
        let (adapter, _) = adapter();
        assert!(adapter.load_local().is_empty());
    }

    #[test]
    fn test_load_local_undefined_placeholder_is_empty() {
        let (adapter, storage) = adapter();
        storage.set_item(DEFAULT_CART_KEY, "undefined").unwrap();
        assert!(adapter.load_local().is_empty());

        storage.set_item(DEFAULT_CART_KEY, "null").unwrap();
        assert!(adapter.load_local().is_empty());
    }

    #[test]
    fn test_load_local_corrupt_is_empty() {
        let (adapter, storage) = adapter();
        storage.set_item(DEFAULT_CART_KEY, "[{\"productId\":").unwrap();
        assert!(adapter.load_local().is_empty());

        storage.set_item(DEFAULT_CART_KEY, "{\"a\":1}").unwrap();
        assert!(adapter.load_local().is_empty());
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let (adapter, _) = adapter();
        let state = CartState::default()
            .with_added(&product(1, 300), 2)
            .with_added(&product(2, 450), 1);

        adapter.save_local(&state);
        let loaded = adapter.load_local();

        let key = |s: &CartState| {
            s.lines()
                .iter()
                .map(|l| (l.product_id.clone(), l.quantity))
                .collect::<Vec<_>>()
        };
        assert_eq!(key(&loaded), key(&state));
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_load_local_accepts_server_rows() {
        let (adapter, storage) = adapter();
        storage
            .set_item(
                DEFAULT_CART_KEY,
                r#"[{"id": 9, "quantity": 3, "product": {"id": 1, "name": "Lamp", "price": 300, "stock": 5}}]"#,
            )
            .unwrap();
        let state = adapter.load_local();
        assert_eq!(state.len(), 1);
        assert_eq!(
            state.get(0).unwrap().remote_item_id,
            Some(CartItemId::from(9))
        );
    }

    #[test]
    fn test_save_mirror_leaves_overlapping_pending_lines() {
        let (adapter, _) = adapter();
        adapter.save_local(
            &CartState::default()
                .with_added(&product(1, 300), 2)
                .with_added(&product(3, 10), 1),
        );
        adapter.save_pending(&adapter.pending_guest_lines());

        // Server already holds product 1
        let mut server_line = CartLineItem::from_product(&product(1, 300), 1);
        server_line.remote_item_id = Some(CartItemId::from(70));
        adapter.save_mirror(&CartState::from_lines([server_line]));

        let stored = adapter.load_local();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored.get(0).unwrap().quantity, 1);

        let pending = adapter.pending_guest_lines();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].product_id, ProductId::from(1));
        assert_eq!(pending[0].quantity, 2);
        assert!(pending.iter().all(CartLineItem::is_guest));
    }

    #[test]
    fn test_pending_lines_include_unstashed_guest_lines() {
        let (adapter, _) = adapter();
        adapter.save_pending(&[CartLineItem::from_product(&product(1, 300), 2)]);
        adapter.save_local(
            &CartState::default()
                .with_added(&product(1, 300), 5)
                .with_added(&product(2, 450), 1),
        );

        let pending = adapter.pending_guest_lines();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].quantity, 2);
        assert_eq!(pending[1].product_id, ProductId::from(2));
    }

    #[test]
    fn test_set_pending_quantity() {
        let (adapter, storage) = adapter();
        adapter.save_pending(&[
            CartLineItem::from_product(&product(1, 300), 2),
            CartLineItem::from_product(&product(2, 450), 1),
        ]);

        adapter.set_pending_quantity(&ProductId::from(1), 3);
        let pending = adapter.pending_guest_lines();
        assert_eq!(pending[0].quantity, 3);

        adapter.set_pending_quantity(&ProductId::from(1), 0);
        adapter.set_pending_quantity(&ProductId::from(2), 0);
        assert!(adapter.pending_guest_lines().is_empty());
        assert_eq!(storage.get_item("cart.pending").unwrap(), None);
    }

    #[test]
    fn test_clear_local_removes_blob() {
        let (adapter, storage) = adapter();
        adapter.save_local(&CartState::default().with_added(&product(1, 1), 1));
        adapter.save_pending(&[CartLineItem::from_product(&product(2, 1), 1)]);
        adapter.clear_local();
        assert_eq!(storage.get_item(DEFAULT_CART_KEY).unwrap(), None);
        assert_eq!(storage.get_item(adapter.pending_key()).unwrap(), None);
    }

    #[tokio::test]
    async fn test_fetch_remote_surfaces_status() {
        let (adapter, _) = adapter();
        let credentials = Credentials::new(CustomerId::from(1), "t");
        let err = adapter.fetch_remote(&credentials).await.unwrap_err();
        assert_eq!(err.status(), Some(503));
    }
}
