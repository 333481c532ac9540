//! In-memory cart state store.
//!
//! The store is the single source of truth for every cart reader. It has one
//! setter, [`CartStateStore::replace`], which swaps in a complete new state;
//! subscribers see each replacement as a whole, never a partial patch.

use std::fmt;
use std::sync::Arc;

use shopfront_core::CartState;
use tokio::sync::watch;

/// Shared handle on the current [`CartState`].
///
/// Cheaply cloneable; all clones read and write the same state.
#[derive(Clone)]
pub struct CartStateStore {
    tx: Arc<watch::Sender<CartState>>,
}

impl CartStateStore {
    #[must_use]
    pub fn new(initial: CartState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.tx.borrow().clone()
    }

    /// Run `f` against the current state without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&CartState) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Replace the whole state. Returns the previous state.
    pub fn replace(&self, state: CartState) -> CartState {
        self.tx.send_replace(state)
    }

    pub fn clear(&self) -> CartState {
        self.replace(CartState::default())
    }

    /// Receiver notified after every [`Self::replace`].
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.tx.subscribe()
    }
}

impl Default for CartStateStore {
    fn default() -> Self {
        Self::new(CartState::default())
    }
}

impl fmt::Debug for CartStateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CartStateStore")
            .field(&*self.tx.borrow())
            .finish()
    }
}
