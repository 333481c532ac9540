//! Normalisation of stored and served cart records.
//!
//! Cart lines reach the client in two shapes: the flat record written to
//! local storage (`productId`, `name`, `price`, `quantity`, `stock`,
//! optional `remoteItemId`) and the server row (`id`, `quantity`, nested
//! `product`). Both go through [`line_from_value`] so nothing downstream
//! branches on shape.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use shopfront_core::{CartId, CartItemId, CartLineItem, CartState, ProductId};
use tracing::warn;

use super::RemoteCart;
use crate::error::CartError;

/// Server cart row.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerCartRow {
    id: CartItemId,
    quantity: u32,
    product: ServerProduct,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerProduct {
    id: ProductId,
    name: String,
    price: Decimal,
    #[serde(default)]
    stock: Option<u32>,
}

/// Flat line as written to local storage.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlatLine {
    #[serde(alias = "id")]
    product_id: ProductId,
    name: String,
    price: Decimal,
    quantity: u32,
    #[serde(default)]
    stock: u32,
    #[serde(default)]
    remote_item_id: Option<CartItemId>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredLine {
    Server(ServerCartRow),
    Flat(FlatLine),
}

impl From<StoredLine> for CartLineItem {
    fn from(line: StoredLine) -> Self {
        match line {
            StoredLine::Server(row) => {
                // A missing stock caps the line at zero and blocks increases
                let stock = row.product.stock.unwrap_or_else(|| {
                    warn!(
                        product_id = %row.product.id,
                        item_id = %row.id,
                        "Server cart row has no stock, treating as 0"
                    );
                    0
                });
                Self {
                    product_id: row.product.id,
                    name: row.product.name,
                    price: row.product.price,
                    quantity: row.quantity,
                    stock,
                    remote_item_id: Some(row.id),
                }
            }
            StoredLine::Flat(flat) => Self {
                product_id: flat.product_id,
                name: flat.name,
                price: flat.price,
                quantity: flat.quantity,
                stock: flat.stock,
                remote_item_id: flat.remote_item_id,
            },
        }
    }
}

/// Map one record of either shape to a [`CartLineItem`].
fn line_from_value(value: Value) -> Result<CartLineItem, serde_json::Error> {
    serde_json::from_value::<StoredLine>(value).map(CartLineItem::from)
}

/// Normalise a list of records into a [`CartState`].
///
/// Records that match neither shape are skipped with a warning; the line
/// invariants are enforced by [`CartState::from_lines`].
#[must_use]
pub fn lines_from_values(values: Vec<Value>) -> CartState {
    values
        .into_iter()
        .filter_map(|value| match line_from_value(value) {
            Ok(line) => Some(line),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable cart line");
                None
            }
        })
        .collect()
}

/// Server cart envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartEnvelope {
    #[serde(default, alias = "cartId")]
    id: Option<CartId>,
    #[serde(default, alias = "cartItems")]
    items: Vec<Value>,
}

/// Normalise a `cart-by-customer` response body.
///
/// Accepts `{ "id": .., "items": [..] }` (or `cartItems`) and a bare array of
/// rows.
///
/// # Errors
///
/// Returns [`CartError::Parse`] if the body is neither shape.
pub fn remote_cart_from_value(value: Value) -> Result<RemoteCart, CartError> {
    match value {
        Value::Array(rows) => Ok(RemoteCart {
            cart_id: None,
            state: lines_from_values(rows),
        }),
        other => {
            let envelope: CartEnvelope = serde_json::from_value(other)?;
            Ok(RemoteCart {
                cart_id: envelope.id,
                state: lines_from_values(envelope.items),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_server_row_is_normalised() {
        let state = lines_from_values(vec![json!({
            "id": 31,
            "quantity": 2,
            "product": {"id": 1, "name": "Lamp", "price": 300, "stock": 4}
        })]);
        let line = state.get(0).unwrap();
        assert_eq!(line.product_id, ProductId::from(1));
        assert_eq!(line.name, "Lamp");
        assert_eq!(line.price, Decimal::from(300));
        assert_eq!(line.quantity, 2);
        assert_eq!(line.stock, 4);
        assert_eq!(line.remote_item_id, Some(CartItemId::from(31)));
    }

    #[test]
    fn test_server_row_without_stock_is_kept() {
        let state = lines_from_values(vec![json!({
            "id": 32,
            "quantity": 1,
            "product": {"id": 2, "name": "Chair", "price": 450}
        })]);
        let line = state.get(0).unwrap();
        assert_eq!(line.stock, 0);
        assert_eq!(line.remote_item_id, Some(CartItemId::from(32)));
    }

    #[test]
    fn test_flat_line_is_normalised() {
        let state = lines_from_values(vec![json!({
            "productId": "sku-1", "name": "Rug", "price": "19.50", "quantity": 1, "stock": 2
        })]);
        let line = state.get(0).unwrap();
        assert_eq!(line.product_id, ProductId::from("sku-1"));
        assert_eq!(line.price, Decimal::new(1950, 2));
        assert!(line.is_guest());
    }

    #[test]
    fn test_bad_records_are_skipped() {
        let state = lines_from_values(vec![
            json!({"productId": 1, "quantity": 1}),
            json!("garbage"),
            json!({"productId": 2, "name": "Cup", "price": 5, "quantity": 0}),
            json!({"productId": 3, "name": "Pan", "price": 5, "quantity": 1}),
        ]);
        assert_eq!(state.len(), 1);
        assert_eq!(state.get(0).unwrap().product_id, ProductId::from(3));
    }

    #[test]
    fn test_remote_cart_envelope() {
        let cart = remote_cart_from_value(json!({
            "id": 7,
            "customerId": 3,
            "cartItems": [
                {"id": 1, "quantity": 1, "product": {"id": 10, "name": "A", "price": 1, "stock": 1}}
            ]
        }))
        .unwrap();
        assert_eq!(cart.cart_id, Some(CartId::from(7)));
        assert_eq!(cart.state.len(), 1);
    }

    #[test]
    fn test_remote_cart_bare_array() {
        let cart = remote_cart_from_value(json!([])).unwrap();
        assert_eq!(cart.cart_id, None);
        assert!(cart.state.is_empty());
    }

    #[test]
    fn test_remote_cart_rejects_scalars() {
        assert!(matches!(
            remote_cart_from_value(json!("nope")),
            Err(CartError::Parse(_))
        ));
    }
}
