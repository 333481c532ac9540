//! Cart error type.
//!
//! Transport and storage failures travel inside [`crate::RemoteOutcome`] or
//! are logged and swallowed; only business-rule rejections reach callers as
//! `Err`. [`CartError::is_user_warning`] tells the two apart.

use shopfront_core::{CustomerId, ProductId};
use thiserror::Error;

use crate::storage::StorageError;

/// Errors that can occur while reading or changing the cart.
#[derive(Debug, Error)]
pub enum CartError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Local storage read or write failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Backend URL could not be built.
    #[error("Invalid backend URL: {0}")]
    Url(#[from] url::ParseError),

    /// Backend refused the add because stock ran out.
    #[error("Not enough stock for product {0}")]
    InsufficientStock(ProductId),

    /// Requested quantity is above the line's available stock.
    #[error("Only {stock} in stock, cannot hold {requested}")]
    ExceedsStock { requested: u32, stock: u32 },

    /// Quantity of zero where at least one unit is required.
    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    /// No line at the given cart position.
    #[error("No cart line at index {0}")]
    LineNotFound(usize),

    /// Operation needs a signed-in customer.
    #[error("Not signed in")]
    NotAuthenticated,

    /// Backend has no cart for the customer.
    #[error("No cart found for customer {0}")]
    CartNotFound(CustomerId),

    /// A background sync task panicked or was aborted.
    #[error("Sync task failed: {0}")]
    TaskJoin(String),
}

impl CartError {
    /// Whether this error is a rejection the shopper should be shown.
    #[must_use]
    pub const fn is_user_warning(&self) -> bool {
        matches!(
            self,
            Self::InsufficientStock(_)
                | Self::ExceedsStock { .. }
                | Self::InvalidQuantity
                | Self::LineNotFound(_)
        )
    }

    /// HTTP status code, if this error came from a backend response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
