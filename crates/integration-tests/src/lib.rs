//! Integration tests for Shopfront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `guest_cart` - Guest mutations and local persistence
//! - `authenticated_cart` - Signed-in mutations against the mock backend
//! - `merge` - Guest cart merge on sign-in
//! - `http_backend` - HTTP client wire behavior
//!
//! Every test starts its own [`MockCartApi`], an in-memory cart-management
//! server on an ephemeral port, and points an [`HttpCartBackend`] at it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use shopfront_cart::{CartService, Credentials, HttpCartBackend, LocalStorage, MemoryStorage};
use shopfront_core::{CartId, CustomerId, Product, ProductId};
use tokio::task::JoinHandle;

/// Bearer token the mock accepts.
pub const TEST_TOKEN: &str = "test-token";

/// Path prefix the mock API is mounted under.
const API_PREFIX: &str = "/api";

/// A request the mock received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: &'static str,
    /// Path below `/cart-management`, e.g. `/add-item`.
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug)]
struct MockItem {
    id: u64,
    product_id: ProductId,
    quantity: u32,
}

#[derive(Debug)]
struct MockCart {
    id: CartId,
    items: Vec<MockItem>,
}

#[derive(Debug, Default)]
struct MockState {
    products: HashMap<ProductId, Product>,
    carts: HashMap<CustomerId, MockCart>,
    next_item_id: u64,
    calls: Vec<RecordedCall>,
    failure: Option<StatusCode>,
    keep_guest_cart: bool,
}

type Shared = Arc<Mutex<MockState>>;

fn lock(state: &Shared) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory cart-management server.
pub struct MockCartApi {
    addr: SocketAddr,
    state: Shared,
    server: JoinHandle<()>,
}

impl MockCartApi {
    /// Bind to an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        let state = Shared::default();

        let routes = Router::new()
            .route("/cart-by-customer/{customer_id}", get(cart_by_customer))
            .route("/add-item", post(add_item))
            .route("/remove-item-quantity", patch(remove_item_quantity))
            .route("/remove-item/{item_id}", delete(remove_item))
            .route("/clear-cart/{cart_id}", delete(clear_cart))
            .route("/merge-guest-cart", post(merge_guest_cart))
            .with_state(Arc::clone(&state));
        let app = Router::new().nest(&format!("{API_PREFIX}/cart-management"), routes);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock API");
        let addr = listener.local_addr().expect("Mock API has no address");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// Base URL to hand to [`HttpCartBackend`].
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}{API_PREFIX}", self.addr)
    }

    /// Credentials the mock accepts for `customer_id`.
    #[must_use]
    pub fn credentials(customer_id: i64) -> Credentials {
        Credentials::new(CustomerId::from(customer_id), TEST_TOKEN)
    }

    /// Backend client pointed at this server.
    ///
    /// # Panics
    ///
    /// Panics if the base URL is rejected.
    #[must_use]
    pub fn backend(&self) -> HttpCartBackend {
        HttpCartBackend::new(&self.base_url()).expect("Mock base URL is valid")
    }

    /// Guest cart service over this server and `storage`.
    #[must_use]
    pub fn cart_service(&self, storage: Arc<dyn LocalStorage>) -> CartService {
        let service = CartService::new(Arc::new(self.backend()), storage, "cart");
        service.hydrate();
        service
    }

    /// Guest cart service with fresh in-memory storage.
    #[must_use]
    pub fn memory_cart_service(&self) -> (CartService, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (self.cart_service(storage.clone()), storage)
    }

    /// Add a product to the catalog.
    pub fn add_product(&self, id: i64, name: &str, price: i64, stock: u32) -> Product {
        let product = Product {
            id: ProductId::from(id),
            name: name.to_string(),
            price: Decimal::from(price),
            stock,
        };
        lock(&self.state)
            .products
            .insert(product.id.clone(), product.clone());
        product
    }

    /// Put a line straight into a customer's server cart.
    pub fn seed_line(&self, customer_id: i64, product_id: i64, quantity: u32) {
        let mut state = lock(&self.state);
        let id = state.allocate_item_id();
        state
            .cart_mut(&CustomerId::from(customer_id))
            .items
            .push(MockItem {
                id,
                product_id: ProductId::from(product_id),
                quantity,
            });
    }

    /// `(product, quantity)` pairs of a customer's server cart.
    #[must_use]
    pub fn server_lines(&self, customer_id: i64) -> Vec<(ProductId, u32)> {
        lock(&self.state)
            .carts
            .get(&CustomerId::from(customer_id))
            .map(|cart| {
                cart.items
                    .iter()
                    .map(|item| (item.product_id.clone(), item.quantity))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every request received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.state).calls.clone()
    }

    /// Requests received for one endpoint, e.g. `"/add-item"`.
    #[must_use]
    pub fn calls_to(&self, endpoint: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.path == endpoint || call.path.starts_with(&format!("{endpoint}/")))
            .collect()
    }

    /// Answer every following request with `status`, or resume normal
    /// service with `None`.
    pub fn fail_with(&self, status: Option<StatusCode>) {
        lock(&self.state).failure = status;
    }

    /// Make the merge endpoint answer `clearGuestCart: false`.
    pub fn keep_guest_cart(&self, keep: bool) {
        lock(&self.state).keep_guest_cart = keep;
    }
}

impl Drop for MockCartApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

// =============================================================================
// Mock State
// =============================================================================

enum AddRejection {
    UnknownProduct,
    InsufficientStock(u32),
}

impl MockState {
    /// Record the call, then check injected failures and the bearer token.
    fn admit(
        &mut self,
        method: &'static str,
        path: String,
        headers: &HeaderMap,
        body: Option<&Value>,
    ) -> Result<(), Response> {
        self.calls.push(RecordedCall {
            method,
            path,
            body: body.cloned(),
        });

        if let Some(status) = self.failure {
            return Err((status, "injected failure").into_response());
        }

        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value == format!("Bearer {TEST_TOKEN}"));
        if authorized {
            Ok(())
        } else {
            Err((StatusCode::UNAUTHORIZED, "invalid token").into_response())
        }
    }

    fn allocate_item_id(&mut self) -> u64 {
        self.next_item_id += 1;
        self.next_item_id
    }

    fn cart_mut(&mut self, customer_id: &CustomerId) -> &mut MockCart {
        self.carts
            .entry(customer_id.clone())
            .or_insert_with(|| MockCart {
                id: CartId::from(format!("cart-{customer_id}")),
                items: Vec::new(),
            })
    }

    /// Add units to a line, refusing anything beyond stock unless `cap`.
    fn add_units(
        &mut self,
        customer_id: &CustomerId,
        product_id: &ProductId,
        quantity: u32,
        cap: bool,
    ) -> Result<(), AddRejection> {
        let stock = self
            .products
            .get(product_id)
            .map(|product| product.stock)
            .ok_or(AddRejection::UnknownProduct)?;

        let held = self
            .carts
            .get(customer_id)
            .and_then(|cart| cart.items.iter().find(|item| &item.product_id == product_id))
            .map_or(0, |item| item.quantity);
        let wanted = held.saturating_add(quantity);
        if wanted > stock && !cap {
            return Err(AddRejection::InsufficientStock(stock.saturating_sub(held)));
        }
        let target = wanted.min(stock);

        let new_id = self.allocate_item_id();
        let cart = self.cart_mut(customer_id);
        match cart.items.iter_mut().find(|item| &item.product_id == product_id) {
            Some(item) => item.quantity = target,
            None if target > 0 => cart.items.push(MockItem {
                id: new_id,
                product_id: product_id.clone(),
                quantity: target,
            }),
            None => {}
        }
        Ok(())
    }

    fn cart_json(&mut self, customer_id: &CustomerId) -> Value {
        let products = self.products.clone();
        let cart = self.cart_mut(customer_id);
        let items: Vec<Value> = cart
            .items
            .iter()
            .filter_map(|item| {
                let product = products.get(&item.product_id)?;
                Some(json!({
                    "id": item.id,
                    "quantity": item.quantity,
                    "product": {
                        "id": product.id,
                        "name": product.name,
                        "price": product.price,
                        "stock": product.stock,
                    },
                }))
            })
            .collect();
        json!({ "id": cart.id, "items": items })
    }
}

// =============================================================================
// Route Handlers
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddItemBody {
    customer_id: CustomerId,
    product_id: ProductId,
    quantity: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveQuantityBody {
    item_id: Value,
    quantity: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuestItemBody {
    product_id: ProductId,
    quantity: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MergeBody {
    customer_id: CustomerId,
    guest_items: Vec<GuestItemBody>,
}

fn parse<T: DeserializeOwned>(body: Value) -> Result<T, Response> {
    serde_json::from_value(body)
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response())
}

/// Item ids arrive as JSON numbers in bodies and as strings in paths.
fn id_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

async fn cart_by_customer(
    State(state): State<Shared>,
    Path(customer_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = state.admit(
        "GET",
        format!("/cart-by-customer/{customer_id}"),
        &headers,
        None,
    ) {
        return response;
    }
    Json(state.cart_json(&CustomerId::from(customer_id))).into_response()
}

async fn add_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = state.admit("POST", "/add-item".to_string(), &headers, Some(&body)) {
        return response;
    }
    let request: AddItemBody = match parse(body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state.add_units(&request.customer_id, &request.product_id, request.quantity, false) {
        Ok(()) => Json(json!({ "message": "Item added" })).into_response(),
        Err(AddRejection::InsufficientStock(left)) => Json(json!({
            "insufficientStock": true,
            "message": format!("Only {left} more available"),
        }))
        .into_response(),
        Err(AddRejection::UnknownProduct) => {
            (StatusCode::NOT_FOUND, "product not found").into_response()
        }
    }
}

async fn remove_item_quantity(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = state.admit(
        "PATCH",
        "/remove-item-quantity".to_string(),
        &headers,
        Some(&body),
    ) {
        return response;
    }
    let request: RemoveQuantityBody = match parse(body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let item_id = id_text(&request.item_id);
    for cart in state.carts.values_mut() {
        if let Some(item) = cart.items.iter_mut().find(|i| i.id.to_string() == item_id) {
            item.quantity = item.quantity.saturating_sub(request.quantity);
            cart.items.retain(|i| i.quantity > 0);
            return StatusCode::NO_CONTENT.into_response();
        }
    }
    (StatusCode::NOT_FOUND, "cart item not found").into_response()
}

async fn remove_item(
    State(state): State<Shared>,
    Path(item_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = state.admit("DELETE", format!("/remove-item/{item_id}"), &headers, None)
    {
        return response;
    }

    for cart in state.carts.values_mut() {
        let before = cart.items.len();
        cart.items.retain(|i| i.id.to_string() != item_id);
        if cart.items.len() != before {
            return StatusCode::NO_CONTENT.into_response();
        }
    }
    (StatusCode::NOT_FOUND, "cart item not found").into_response()
}

async fn clear_cart(
    State(state): State<Shared>,
    Path(cart_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = state.admit("DELETE", format!("/clear-cart/{cart_id}"), &headers, None) {
        return response;
    }

    match state
        .carts
        .values_mut()
        .find(|cart| cart.id.to_string() == cart_id)
    {
        Some(cart) => {
            cart.items.clear();
            StatusCode::NO_CONTENT.into_response()
        }
        None => (StatusCode::NOT_FOUND, "cart not found").into_response(),
    }
}

async fn merge_guest_cart(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = state.admit(
        "POST",
        "/merge-guest-cart".to_string(),
        &headers,
        Some(&body),
    ) {
        return response;
    }
    let request: MergeBody = match parse(body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    if state.keep_guest_cart {
        return Json(json!({
            "clearGuestCart": false,
            "message": "Guest cart kept for later",
        }))
        .into_response();
    }

    let mut skipped = 0_usize;
    for item in &request.guest_items {
        if state
            .add_units(&request.customer_id, &item.product_id, item.quantity, true)
            .is_err()
        {
            skipped += 1;
        }
    }
    Json(json!({
        "clearGuestCart": true,
        "message": format!("Merged {} item(s)", request.guest_items.len() - skipped),
    }))
    .into_response()
}
