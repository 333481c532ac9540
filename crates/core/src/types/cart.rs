//! Cart line items and cart state.
//!
//! A [`CartState`] is an ordered list of [`CartLineItem`]s holding at most one
//! line per product, each with a quantity of at least one. Every transform
//! here returns a fresh state; nothing is patched in place, so a state can be
//! handed wholesale to a store setter.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CartItemId, ProductId};
use super::price::{CurrencyCode, Price};
use super::product::Product;

/// One product-and-quantity entry in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub stock: u32,
    /// Backend id for this line, absent until the line is persisted server-side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_item_id: Option<CartItemId>,
}

impl CartLineItem {
    /// Build a guest line for a product.
    #[must_use]
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            quantity,
            stock: product.stock,
            remote_item_id: None,
        }
    }

    /// `price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    /// Whether this line only exists on the client.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        self.remote_item_id.is_none()
    }
}

/// Ordered cart contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartState {
    lines: Vec<CartLineItem>,
}

impl CartState {
    /// Build a state from arbitrary lines, enforcing the line invariants.
    ///
    /// Zero-quantity lines are dropped. A repeated product is folded into its
    /// first occurrence by summing quantities.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLineItem>) -> Self {
        let mut folded: Vec<CartLineItem> = Vec::new();
        for line in lines {
            if line.quantity == 0 {
                continue;
            }
            match folded.iter_mut().find(|l| l.product_id == line.product_id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(line.quantity);
                    if existing.remote_item_id.is_none() {
                        existing.remote_item_id = line.remote_item_id;
                    }
                }
                None => folded.push(line),
            }
        }
        Self { lines: folded }
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLineItem] {
        &self.lines
    }

    #[must_use]
    pub fn into_lines(self) -> Vec<CartLineItem> {
        self.lines
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&CartLineItem> {
        self.lines.get(index)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Index of the line holding `product_id`.
    #[must_use]
    pub fn position(&self, product_id: &ProductId) -> Option<usize> {
        self.lines.iter().position(|l| &l.product_id == product_id)
    }

    /// Lines that have not been persisted server-side.
    pub fn guest_lines(&self) -> impl Iterator<Item = &CartLineItem> {
        self.lines.iter().filter(|l| l.is_guest())
    }

    /// Sum of all line quantities.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Sum of `price × quantity` over all lines.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.lines.iter().map(CartLineItem::line_total).sum()
    }

    /// [`Self::total_price`] as a displayable [`Price`].
    #[must_use]
    pub fn total(&self, currency_code: CurrencyCode) -> Price {
        Price::new(self.total_price(), currency_code)
    }

    /// Add `quantity` units of `product`, incrementing an existing line in
    /// place or appending a new one.
    #[must_use]
    pub fn with_added(&self, product: &Product, quantity: u32) -> Self {
        let mut lines = self.lines.clone();
        match lines.iter_mut().find(|l| l.product_id == product.id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(quantity),
            None => lines.push(CartLineItem::from_product(product, quantity)),
        }
        Self { lines }
    }

    /// Set the quantity of the line at `index`.
    ///
    /// Returns `None` if there is no such line. A quantity of zero removes
    /// the line.
    #[must_use]
    pub fn with_quantity(&self, index: usize, quantity: u32) -> Option<Self> {
        if quantity == 0 {
            return self.without(index).map(|(state, _)| state);
        }
        let mut lines = self.lines.clone();
        lines.get_mut(index)?.quantity = quantity;
        Some(Self { lines })
    }

    /// Remove the line at `index`, returning the new state and the removed line.
    #[must_use]
    pub fn without(&self, index: usize) -> Option<(Self, CartLineItem)> {
        if index >= self.lines.len() {
            return None;
        }
        let mut lines = self.lines.clone();
        let removed = lines.remove(index);
        Some((Self { lines }, removed))
    }
}

impl FromIterator<CartLineItem> for CartState {
    fn from_iter<T: IntoIterator<Item = CartLineItem>>(iter: T) -> Self {
        Self::from_lines(iter)
    }
}
