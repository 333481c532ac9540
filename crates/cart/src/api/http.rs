//! HTTP implementation of [`CartBackend`] using `reqwest`.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use shopfront_core::{CartId, CartItemId, CustomerId};
use tracing::{debug, instrument};
use url::Url;

use super::{
    AddItemRequest, AddItemResponse, CartBackend, MergeGuestCartRequest, MergeGuestCartResponse,
    RemoteCart, RemoveQuantityRequest, remote_cart_from_value,
};
use crate::error::CartError;

const CART_MANAGEMENT: &str = "cart-management/";

/// Longest response excerpt kept in logs and errors.
const BODY_EXCERPT: usize = 500;

/// Client for the cart-management REST API.
///
/// Cheaply cloneable; clones share one connection pool.
#[derive(Clone)]
pub struct HttpCartBackend {
    inner: Arc<HttpCartBackendInner>,
}

struct HttpCartBackendInner {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpCartBackend {
    /// Create a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Url`] if `base_url` is not an absolute URL.
    pub fn new(base_url: &str) -> Result<Self, CartError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client that sends through an existing `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Url`] if `base_url` is not an absolute URL.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, CartError> {
        // Url::join drops the last path segment unless it ends in '/'
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{base_url}/"))?
        };

        Ok(Self {
            inner: Arc::new(HttpCartBackendInner { client, base_url }),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// URL of a cart-management endpoint, with an optional id path segment.
    fn endpoint(&self, path: &str, id: Option<&str>) -> Result<Url, CartError> {
        let mut relative = format!("{CART_MANAGEMENT}{path}");
        if let Some(id) = id {
            relative.push('/');
            relative.push_str(&urlencoding::encode(id));
        }
        Ok(self.inner.base_url.join(&relative)?)
    }

    fn request(&self, method: Method, url: Url, token: &SecretString) -> RequestBuilder {
        self.inner
            .client
            .request(method, url)
            .bearer_auth(token.expose_secret())
    }

    /// Send a request and return the body of a successful response.
    async fn send(&self, request: RequestBuilder) -> Result<String, CartError> {
        let response = request.send().await?;
        let status = response.status();

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            let excerpt: String = body.chars().take(BODY_EXCERPT).collect();
            tracing::error!(
                status = %status,
                body = %excerpt,
                "Cart API returned non-success status"
            );
            return Err(CartError::Status {
                status: status.as_u16(),
                body: excerpt,
            });
        }

        Ok(body)
    }

    /// Send a request and parse its JSON body; an empty body parses as `T::default()`.
    async fn send_json<T>(&self, request: RequestBuilder) -> Result<T, CartError>
    where
        T: DeserializeOwned + Default,
    {
        let body = self.send(request).await?;
        if body.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(BODY_EXCERPT).collect::<String>(),
                "Failed to parse cart API response"
            );
            CartError::Parse(e)
        })
    }
}

impl std::fmt::Debug for HttpCartBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCartBackend")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CartBackend for HttpCartBackend {
    #[instrument(skip(self, token), fields(customer_id = %customer_id))]
    async fn cart_by_customer(
        &self,
        token: &SecretString,
        customer_id: &CustomerId,
    ) -> Result<RemoteCart, CartError> {
        let url = self.endpoint("cart-by-customer", Some(&customer_id.to_string()))?;
        let value: serde_json::Value = self
            .send_json(self.request(Method::GET, url, token))
            .await?;
        let cart = remote_cart_from_value(value)?;
        debug!(lines = cart.state.len(), "Fetched server cart");
        Ok(cart)
    }

    #[instrument(skip(self, token), fields(product_id = %request.product_id, quantity = request.quantity))]
    async fn add_item(
        &self,
        token: &SecretString,
        request: &AddItemRequest,
    ) -> Result<AddItemResponse, CartError> {
        let url = self.endpoint("add-item", None)?;
        self.send_json(self.request(Method::POST, url, token).json(request))
            .await
    }

    #[instrument(skip(self, token), fields(item_id = %request.item_id, quantity = request.quantity))]
    async fn remove_item_quantity(
        &self,
        token: &SecretString,
        request: &RemoveQuantityRequest,
    ) -> Result<(), CartError> {
        let url = self.endpoint("remove-item-quantity", None)?;
        self.send(self.request(Method::PATCH, url, token).json(request))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, token), fields(item_id = %item_id))]
    async fn remove_item(
        &self,
        token: &SecretString,
        item_id: &CartItemId,
    ) -> Result<(), CartError> {
        let url = self.endpoint("remove-item", Some(&item_id.to_string()))?;
        self.send(self.request(Method::DELETE, url, token)).await?;
        Ok(())
    }

    #[instrument(skip(self, token), fields(cart_id = %cart_id))]
    async fn clear_cart(&self, token: &SecretString, cart_id: &CartId) -> Result<(), CartError> {
        let url = self.endpoint("clear-cart", Some(&cart_id.to_string()))?;
        self.send(self.request(Method::DELETE, url, token)).await?;
        Ok(())
    }

    #[instrument(skip(self, token, request), fields(customer_id = %request.customer_id, lines = request.guest_items.len()))]
    async fn merge_guest_cart(
        &self,
        token: &SecretString,
        request: &MergeGuestCartRequest,
    ) -> Result<MergeGuestCartResponse, CartError> {
        let url = self.endpoint("merge-guest-cart", None)?;
        self.send_json(self.request(Method::POST, url, token).json(request))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let backend = HttpCartBackend::new("http://localhost:8080/api").unwrap();
        assert_eq!(
            backend.endpoint("add-item", None).unwrap().as_str(),
            "http://localhost:8080/api/cart-management/add-item"
        );
        assert_eq!(
            backend
                .endpoint("cart-by-customer", Some("42"))
                .unwrap()
                .as_str(),
            "http://localhost:8080/api/cart-management/cart-by-customer/42"
        );
    }

    #[test]
    fn test_endpoint_encodes_ids() {
        let backend = HttpCartBackend::new("http://localhost:8080/").unwrap();
        assert_eq!(
            backend
                .endpoint("remove-item", Some("a/b c"))
                .unwrap()
                .as_str(),
            "http://localhost:8080/cart-management/remove-item/a%2Fb%20c"
        );
    }

    #[test]
    fn test_relative_base_url_is_rejected() {
        assert!(matches!(
            HttpCartBackend::new("not a url"),
            Err(CartError::Url(_))
        ));
    }
}
