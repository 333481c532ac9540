//! Cart-management REST API.
//!
//! [`CartBackend`] has one method per backend endpoint; [`HttpCartBackend`]
//! implements it over HTTP. Request bodies carry ids and quantities only;
//! names and prices always come back from the server.
//!
//! | Method | Path | Trait method |
//! |---|---|---|
//! | GET | `/cart-management/cart-by-customer/{customerId}` | [`CartBackend::cart_by_customer`] |
//! | POST | `/cart-management/add-item` | [`CartBackend::add_item`] |
//! | PATCH | `/cart-management/remove-item-quantity` | [`CartBackend::remove_item_quantity`] |
//! | DELETE | `/cart-management/remove-item/{itemId}` | [`CartBackend::remove_item`] |
//! | DELETE | `/cart-management/clear-cart/{cartId}` | [`CartBackend::clear_cart`] |
//! | POST | `/cart-management/merge-guest-cart` | [`CartBackend::merge_guest_cart`] |

mod conversions;
mod http;

pub use conversions::{lines_from_values, remote_cart_from_value};
pub use http::HttpCartBackend;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use shopfront_core::{CartId, CartItemId, CartLineItem, CartState, CustomerId, ProductId};

use crate::error::CartError;

/// Server cart after normalisation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteCart {
    /// Backend cart id, when the response carried one.
    pub cart_id: Option<CartId>,
    pub state: CartState,
}

/// Body of `POST /cart-management/add-item`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Response of `POST /cart-management/add-item`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemResponse {
    /// Set when the server refused the add for lack of stock.
    #[serde(default, alias = "insufficient_stock")]
    pub insufficient_stock: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of `PATCH /cart-management/remove-item-quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveQuantityRequest {
    pub item_id: CartItemId,
    pub quantity: u32,
}

/// One guest line as sent to the merge endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl From<&CartLineItem> for GuestItem {
    fn from(line: &CartLineItem) -> Self {
        Self {
            product_id: line.product_id.clone(),
            quantity: line.quantity,
        }
    }
}

/// Body of `POST /cart-management/merge-guest-cart`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeGuestCartRequest {
    pub customer_id: CustomerId,
    pub guest_items: Vec<GuestItem>,
}

/// Response of `POST /cart-management/merge-guest-cart`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeGuestCartResponse {
    /// The server absorbed the guest lines; the local copy can go.
    #[serde(default, alias = "clear_guest_cart")]
    pub clear_guest_cart: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// The cart-management endpoints.
///
/// Every call is authorised with the customer's bearer token.
#[async_trait]
pub trait CartBackend: Send + Sync {
    /// Fetch the customer's cart.
    async fn cart_by_customer(
        &self,
        token: &SecretString,
        customer_id: &CustomerId,
    ) -> Result<RemoteCart, CartError>;

    /// Add `quantity` units of a product, creating the line if needed.
    async fn add_item(
        &self,
        token: &SecretString,
        request: &AddItemRequest,
    ) -> Result<AddItemResponse, CartError>;

    /// Decrement a line by `quantity`.
    async fn remove_item_quantity(
        &self,
        token: &SecretString,
        request: &RemoveQuantityRequest,
    ) -> Result<(), CartError>;

    /// Delete one line.
    async fn remove_item(
        &self,
        token: &SecretString,
        item_id: &CartItemId,
    ) -> Result<(), CartError>;

    /// Delete every line of a cart.
    async fn clear_cart(&self, token: &SecretString, cart_id: &CartId) -> Result<(), CartError>;

    /// Fold guest lines into the customer's server cart.
    async fn merge_guest_cart(
        &self,
        token: &SecretString,
        request: &MergeGuestCartRequest,
    ) -> Result<MergeGuestCartResponse, CartError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_request_bodies_use_camel_case() {
        let body = serde_json::to_value(MergeGuestCartRequest {
            customer_id: CustomerId::from(4),
            guest_items: vec![GuestItem {
                product_id: ProductId::from(1),
                quantity: 2,
            }],
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"customerId": 4, "guestItems": [{"productId": 1, "quantity": 2}]})
        );

        let body = serde_json::to_value(RemoveQuantityRequest {
            item_id: CartItemId::from("li-9"),
            quantity: 1,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"itemId": "li-9", "quantity": 1}));
    }

    #[test]
    fn test_responses_tolerate_missing_fields() {
        let add: AddItemResponse = serde_json::from_str("{}").unwrap();
        assert!(!add.insufficient_stock);

        let add: AddItemResponse =
            serde_json::from_str(r#"{"insufficientStock": true, "message": "only 2 left"}"#)
                .unwrap();
        assert!(add.insufficient_stock);

        let merge: MergeGuestCartResponse =
            serde_json::from_str(r#"{"clearGuestCart": true}"#).unwrap();
        assert!(merge.clear_guest_cart);
    }
}
