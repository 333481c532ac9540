//! Integration tests for signed-in carts.
//!
//! Every mutation updates the store first and then reaches the mock backend
//! through the HTTP client.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;
use shopfront_cart::{CartError, CartService, Credentials, LocalStorage, MemoryStorage};
use shopfront_core::ProductId;
use shopfront_integration_tests::MockCartApi;

const CUSTOMER: i64 = 42;

/// Signed-in service with an empty server cart.
async fn signed_in(api: &MockCartApi) -> (CartService, Arc<MemoryStorage>) {
    let (cart, storage) = api.memory_cart_service();
    cart.login(MockCartApi::credentials(CUSTOMER)).await;
    (cart, storage)
}

// =============================================================================
// Add
// =============================================================================

#[tokio::test]
async fn test_add_item_refetches_server_cart() {
    let api = MockCartApi::start().await;
    let lamp = api.add_product(1, "Lamp", 300, 5);
    let (cart, _) = signed_in(&api).await;

    let outcome = cart.add_to_cart(&lamp, 2).await.unwrap();
    assert!(outcome.is_synced());

    let adds = api.calls_to("/add-item");
    assert_eq!(adds.len(), 1);
    assert_eq!(
        adds[0].body,
        Some(json!({"customerId": 42, "productId": 1, "quantity": 2}))
    );

    let state = cart.store().snapshot();
    let line = state.get(0).unwrap();
    assert_eq!(line.quantity, 2);
    assert_eq!(line.stock, 5);
    assert!(line.remote_item_id.is_some());
    assert_eq!(api.server_lines(CUSTOMER), vec![(ProductId::from(1), 2)]);
}

#[tokio::test]
async fn test_add_item_insufficient_stock_leaves_cart_unchanged() {
    let api = MockCartApi::start().await;
    let lamp = api.add_product(1, "Lamp", 300, 2);
    api.seed_line(CUSTOMER, 1, 2);
    let (cart, storage) = signed_in(&api).await;
    let before = cart.store().snapshot();
    let stored = storage.get_item("cart").unwrap();

    let err = cart.add_to_cart(&lamp, 1).await.unwrap_err();
    assert!(matches!(err, CartError::InsufficientStock(ref id) if *id == ProductId::from(1)));
    assert!(err.is_user_warning());
    assert_eq!(cart.store().snapshot(), before);
    assert_eq!(storage.get_item("cart").unwrap(), stored);
}

#[tokio::test]
async fn test_add_item_backend_failure_is_reported() {
    let api = MockCartApi::start().await;
    let lamp = api.add_product(1, "Lamp", 300, 5);
    let (cart, _) = signed_in(&api).await;
    api.fail_with(Some(StatusCode::INTERNAL_SERVER_ERROR));

    let outcome = cart.add_to_cart(&lamp, 1).await.unwrap();
    assert_eq!(outcome.error().and_then(CartError::status), Some(500));
    assert!(cart.store().snapshot().is_empty());
}

// =============================================================================
// Quantity Changes
// =============================================================================

#[tokio::test]
async fn test_increase_sends_added_units() {
    let api = MockCartApi::start().await;
    api.add_product(1, "Lamp", 300, 5);
    api.seed_line(CUSTOMER, 1, 1);
    let (cart, _) = signed_in(&api).await;

    let task = cart.increase_quantity(0, 3).unwrap();
    assert_eq!(cart.store().snapshot().get(0).unwrap().quantity, 3);
    assert!(task.outcome().await.is_synced());

    let adds = api.calls_to("/add-item");
    assert_eq!(adds[0].body.as_ref().unwrap()["quantity"], 2);
    assert_eq!(api.server_lines(CUSTOMER), vec![(ProductId::from(1), 3)]);
}

#[tokio::test]
async fn test_increase_above_stock_never_reaches_backend() {
    let api = MockCartApi::start().await;
    api.add_product(1, "Lamp", 300, 2);
    api.seed_line(CUSTOMER, 1, 2);
    let (cart, _) = signed_in(&api).await;

    assert!(cart.increase_quantity(0, 3).is_err());
    assert!(api.calls_to("/add-item").is_empty());
}

#[tokio::test]
async fn test_decrease_sends_removed_units() {
    let api = MockCartApi::start().await;
    api.add_product(1, "Lamp", 300, 5);
    api.seed_line(CUSTOMER, 1, 3);
    let (cart, _) = signed_in(&api).await;
    let item_id = cart.store().snapshot().get(0).unwrap().remote_item_id.clone().unwrap();

    let task = cart.decrease_quantity(0, 1).unwrap();
    assert!(task.outcome().await.is_synced());

    let patches = api.calls_to("/remove-item-quantity");
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].method, "PATCH");
    assert_eq!(
        patches[0].body,
        Some(json!({"itemId": serde_json::to_value(&item_id).unwrap(), "quantity": 2}))
    );
    assert_eq!(api.server_lines(CUSTOMER), vec![(ProductId::from(1), 1)]);
}

#[tokio::test]
async fn test_decrease_to_zero_deletes_server_line() {
    let api = MockCartApi::start().await;
    api.add_product(1, "Lamp", 300, 5);
    api.seed_line(CUSTOMER, 1, 1);
    let (cart, _) = signed_in(&api).await;

    let task = cart.decrease_quantity(0, 0).unwrap();
    assert!(cart.store().snapshot().is_empty());
    assert!(task.outcome().await.is_synced());

    let deletes = api.calls_to("/remove-item");
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].method, "DELETE");
    assert!(api.server_lines(CUSTOMER).is_empty());
}

#[tokio::test]
async fn test_remove_item_deletes_server_line() {
    let api = MockCartApi::start().await;
    api.add_product(1, "Lamp", 300, 5);
    api.add_product(2, "Chair", 450, 5);
    api.seed_line(CUSTOMER, 1, 1);
    api.seed_line(CUSTOMER, 2, 1);
    let (cart, _) = signed_in(&api).await;

    let task = cart.remove_item(1).unwrap();
    assert!(task.outcome().await.is_synced());
    assert_eq!(api.server_lines(CUSTOMER), vec![(ProductId::from(1), 1)]);
    assert_eq!(cart.store().snapshot().len(), 1);
}

#[tokio::test]
async fn test_backend_failure_keeps_optimistic_state() {
    let api = MockCartApi::start().await;
    api.add_product(1, "Lamp", 300, 5);
    api.seed_line(CUSTOMER, 1, 3);
    let (cart, _) = signed_in(&api).await;
    api.fail_with(Some(StatusCode::SERVICE_UNAVAILABLE));

    let task = cart.decrease_quantity(0, 2).unwrap();
    let outcome = task.outcome().await;

    assert_eq!(outcome.error().and_then(CartError::status), Some(503));
    assert_eq!(cart.store().snapshot().get(0).unwrap().quantity, 2);
    assert_eq!(cart.persistence().load_local().get(0).unwrap().quantity, 2);
    assert_eq!(api.server_lines(CUSTOMER), vec![(ProductId::from(1), 3)]);
}

// =============================================================================
// Empty and Refresh
// =============================================================================

#[tokio::test]
async fn test_empty_cart_clears_server_cart() {
    let api = MockCartApi::start().await;
    api.add_product(1, "Lamp", 300, 5);
    api.add_product(2, "Chair", 450, 5);
    api.seed_line(CUSTOMER, 1, 2);
    api.seed_line(CUSTOMER, 2, 1);
    let (cart, storage) = signed_in(&api).await;
    assert_eq!(cart.badge().count, 3);

    let outcome = cart.empty_cart().await;
    assert!(outcome.is_synced());
    assert!(cart.store().snapshot().is_empty());
    assert_eq!(storage.get_item("cart").unwrap(), None);
    assert!(api.server_lines(CUSTOMER).is_empty());

    let clears = api.calls_to("/clear-cart");
    assert_eq!(clears.len(), 1);
    assert_eq!(clears[0].path, "/clear-cart/cart-42");
}

#[tokio::test]
async fn test_checkout_empties_cart() {
    let api = MockCartApi::start().await;
    api.add_product(1, "Lamp", 300, 5);
    api.seed_line(CUSTOMER, 1, 2);
    let (cart, _) = signed_in(&api).await;

    assert!(cart.complete_checkout().await.is_synced());
    assert!(cart.view().is_empty());
    assert!(api.server_lines(CUSTOMER).is_empty());
}

#[tokio::test]
async fn test_refresh_replaces_stale_store() {
    let api = MockCartApi::start().await;
    api.add_product(1, "Lamp", 300, 5);
    let (cart, _) = signed_in(&api).await;
    assert!(cart.store().snapshot().is_empty());

    // Another device added a line
    api.seed_line(CUSTOMER, 1, 4);
    assert!(cart.refresh().await.is_synced());
    assert_eq!(cart.badge().count, 4);
}

#[tokio::test]
async fn test_wrong_token_is_rejected() {
    let api = MockCartApi::start().await;
    let (cart, _) = api.memory_cart_service();
    cart.session().sign_in(Credentials::new(
        CUSTOMER.into(),
        "stolen-token",
    ));

    let outcome = cart.refresh().await;
    assert_eq!(outcome.error().and_then(CartError::status), Some(401));
}

#[tokio::test]
async fn test_logout_drops_server_mirror() {
    let api = MockCartApi::start().await;
    api.add_product(1, "Lamp", 300, 5);
    api.seed_line(CUSTOMER, 1, 2);
    let (cart, storage) = signed_in(&api).await;
    assert_eq!(cart.badge().count, 2);

    cart.logout();
    assert!(!cart.session().is_authenticated());
    assert!(cart.store().snapshot().is_empty());
    assert_eq!(storage.get_item("cart").unwrap(), None);
}
