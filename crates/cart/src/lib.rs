//! Shopfront Cart - client-side cart state and backend reconciliation.
//!
//! # Architecture
//!
//! - [`CartStateStore`] owns the in-memory cart; every change is a whole-state
//!   replacement observed by all subscribers
//! - [`PersistenceAdapter`] writes through to local storage (guest carts and
//!   the authenticated mirror) and reads the server cart
//! - [`ReconciliationService`] merges a guest cart into the server cart on
//!   sign-in and re-fetches authoritative state
//! - [`CartService`] runs the mutations, choosing local-only or remote-backed
//!   execution from the current [`Session`]
//!
//! Remote calls never fail a mutation: their result is reported as a
//! [`RemoteOutcome`] and the optimistic local state stands.
//!
//! # Example
//!
//! ```rust,ignore
//! use shopfront_cart::{CartConfig, CartService, Credentials};
//!
//! let config = CartConfig::from_env()?;
//! let cart = CartService::from_config(&config)?;
//! cart.hydrate();
//!
//! cart.add_to_cart(&product, 1).await?;
//! cart.login(Credentials::new(customer_id, token)).await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod persistence;
pub mod reconcile;
pub mod service;
pub mod session;
pub mod storage;
pub mod store;
pub mod sync;
pub mod view;

pub use api::{CartBackend, HttpCartBackend, RemoteCart};
pub use config::{CartConfig, ConfigError};
pub use error::CartError;
pub use persistence::PersistenceAdapter;
pub use reconcile::{MergeOutcome, ReconciliationService};
pub use service::CartService;
pub use session::{Credentials, Session, SessionHandle};
pub use storage::{FileStorage, LocalStorage, MemoryStorage, StorageError};
pub use store::CartStateStore;
pub use sync::{RemoteOutcome, SyncTask};
pub use view::{BadgeWatcher, CartBadge, CartItemView, CartView, CheckoutSummary};
