//! Read-only display models for cart consumers.
//!
//! Navbar badges, cart pages and checkout pages never touch the store's
//! setter; they build one of these from a snapshot or follow the store with
//! [`BadgeWatcher`].

use shopfront_core::{CartLineItem, CartState, CurrencyCode, Price, ProductId};
use tokio::sync::watch;

use crate::store::CartStateStore;

/// Cart line display data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItemView {
    /// Position in the cart, as passed back to quantity and removal operations.
    pub index: usize,
    pub product_id: ProductId,
    pub title: String,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
    /// Another unit would exceed stock.
    pub at_stock_limit: bool,
}

/// Cart display data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u64,
}

impl CartView {
    /// Create an empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::from(&CartState::default())
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// =============================================================================
// Type Conversions
// =============================================================================

fn format_price(amount: rust_decimal::Decimal) -> String {
    Price::new(amount, CurrencyCode::default()).display()
}

impl From<&CartState> for CartView {
    fn from(state: &CartState) -> Self {
        Self {
            items: state
                .lines()
                .iter()
                .enumerate()
                .map(|(index, line)| CartItemView::new(index, line))
                .collect(),
            subtotal: format_price(state.total_price()),
            item_count: state.total_quantity(),
        }
    }
}

impl CartItemView {
    fn new(index: usize, line: &CartLineItem) -> Self {
        Self {
            index,
            product_id: line.product_id.clone(),
            title: line.name.clone(),
            quantity: line.quantity,
            price: format_price(line.price),
            line_price: format_price(line.line_total()),
            at_stock_limit: line.quantity >= line.stock,
        }
    }
}

/// Cart count for a navbar badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CartBadge {
    pub count: u64,
}

impl From<&CartState> for CartBadge {
    fn from(state: &CartState) -> Self {
        Self {
            count: state.total_quantity(),
        }
    }
}

/// Follows the store and yields a fresh [`CartBadge`] on every change.
#[derive(Debug)]
pub struct BadgeWatcher {
    rx: watch::Receiver<CartState>,
}

impl BadgeWatcher {
    #[must_use]
    pub fn new(store: &CartStateStore) -> Self {
        Self {
            rx: store.subscribe(),
        }
    }

    /// Badge for the state currently in the store.
    #[must_use]
    pub fn current(&self) -> CartBadge {
        CartBadge::from(&*self.rx.borrow())
    }

    /// Wait for the next store replacement; `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<CartBadge> {
        self.rx.changed().await.ok()?;
        Some(CartBadge::from(&*self.rx.borrow_and_update()))
    }
}

/// What the checkout page shows before payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSummary {
    pub lines: Vec<CartLineItem>,
    pub item_count: u64,
    pub total: Price,
}

impl CheckoutSummary {
    /// Summary of `state`, or `None` when there is nothing to check out.
    #[must_use]
    pub fn from_state(state: &CartState) -> Option<Self> {
        if state.is_empty() {
            return None;
        }
        Some(Self {
            lines: state.lines().to_vec(),
            item_count: state.total_quantity(),
            total: state.total(CurrencyCode::default()),
        })
    }
}
