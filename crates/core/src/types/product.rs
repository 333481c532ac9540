//! Catalog product as handed to cart operations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// A product the shopper can put in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    /// Units available; caps the quantity a shopper may hold.
    #[serde(default)]
    pub stock: u32,
}
