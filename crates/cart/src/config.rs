//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPFRONT_API_URL` - Base URL of the cart-management REST API
//!
//! ## Optional
//! - `SHOPFRONT_STORAGE_DIR` - Directory for the local cart blob (default: `.shopfront`)
//! - `SHOPFRONT_CART_KEY` - Local storage key of the cart blob (default: `cart`)
//! - `SHOPFRONT_RECONCILE_SECS` - Periodic server refresh interval in seconds
//! - `SHOPFRONT_CUSTOMER_ID` - Signed-in customer id
//! - `SHOPFRONT_AUTH_TOKEN` - Bearer token of the signed-in customer
//!
//! `SHOPFRONT_CUSTOMER_ID` and `SHOPFRONT_AUTH_TOKEN` must be set together.

use std::path::PathBuf;
use std::time::Duration;

use shopfront_core::CustomerId;
use thiserror::Error;
use url::Url;

use crate::persistence::DEFAULT_CART_KEY;
use crate::session::Credentials;

const DEFAULT_STORAGE_DIR: &str = ".shopfront";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart client configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Base URL of the cart-management API
    pub api_url: Url,
    /// Directory holding the local cart blob
    pub storage_dir: PathBuf,
    /// Local storage key of the cart blob
    pub cart_key: String,
    /// Interval of the periodic server refresh, if enabled
    pub reconcile_interval: Option<Duration>,
    /// Signed-in customer, if any (token redacted in `Debug`)
    pub credentials: Option<Credentials>,
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(lookup);

        let api_url = vars.required("SHOPFRONT_API_URL")?;
        let api_url = Url::parse(&api_url).map_err(|e| {
            ConfigError::InvalidEnvVar("SHOPFRONT_API_URL".to_string(), e.to_string())
        })?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPFRONT_API_URL".to_string(),
                format!("unsupported scheme '{}'", api_url.scheme()),
            ));
        }

        let storage_dir = PathBuf::from(vars.or_default("SHOPFRONT_STORAGE_DIR", DEFAULT_STORAGE_DIR));
        let cart_key = vars.or_default("SHOPFRONT_CART_KEY", DEFAULT_CART_KEY);

        let reconcile_interval = vars
            .optional("SHOPFRONT_RECONCILE_SECS")
            .map(|raw| {
                raw.parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs)
                    .ok_or_else(|| {
                        ConfigError::InvalidEnvVar(
                            "SHOPFRONT_RECONCILE_SECS".to_string(),
                            format!("expected a positive number of seconds, got '{raw}'"),
                        )
                    })
            })
            .transpose()?;

        let credentials = match (
            vars.optional("SHOPFRONT_CUSTOMER_ID"),
            vars.optional("SHOPFRONT_AUTH_TOKEN"),
        ) {
            (Some(customer_id), Some(token)) => {
                Some(Credentials::new(CustomerId::from(customer_id), token))
            }
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::MissingEnvVar("SHOPFRONT_AUTH_TOKEN".to_string()));
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingEnvVar("SHOPFRONT_CUSTOMER_ID".to_string()));
            }
        };

        Ok(Self {
            api_url,
            storage_dir,
            cart_key,
            reconcile_interval,
            credentials,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    /// Get an optional variable; blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<CartConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        CartConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("SHOPFRONT_API_URL", "http://localhost:8080/api")]).unwrap();
        assert_eq!(config.api_url.as_str(), "http://localhost:8080/api");
        assert_eq!(config.storage_dir, PathBuf::from(".shopfront"));
        assert_eq!(config.cart_key, "cart");
        assert!(config.reconcile_interval.is_none());
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_missing_api_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "SHOPFRONT_API_URL"));
    }

    #[test]
    fn test_invalid_api_url() {
        assert!(matches!(
            load(&[("SHOPFRONT_API_URL", "nope")]),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(matches!(
            load(&[("SHOPFRONT_API_URL", "ftp://example.com")]),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_reconcile_interval() {
        let config = load(&[
            ("SHOPFRONT_API_URL", "http://localhost"),
            ("SHOPFRONT_RECONCILE_SECS", "30"),
        ])
        .unwrap();
        assert_eq!(config.reconcile_interval, Some(Duration::from_secs(30)));

        assert!(
            load(&[
                ("SHOPFRONT_API_URL", "http://localhost"),
                ("SHOPFRONT_RECONCILE_SECS", "0"),
            ])
            .is_err()
        );
    }

    #[test]
    fn test_credentials_must_be_paired() {
        let config = load(&[
            ("SHOPFRONT_API_URL", "http://localhost"),
            ("SHOPFRONT_CUSTOMER_ID", "12"),
            ("SHOPFRONT_AUTH_TOKEN", "tok"),
        ])
        .unwrap();
        assert_eq!(
            config.credentials.map(|c| c.customer_id),
            Some(CustomerId::from(12))
        );

        let err = load(&[
            ("SHOPFRONT_API_URL", "http://localhost"),
            ("SHOPFRONT_CUSTOMER_ID", "12"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "SHOPFRONT_AUTH_TOKEN"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = load(&[
            ("SHOPFRONT_API_URL", "http://localhost"),
            ("SHOPFRONT_CUSTOMER_ID", "12"),
            ("SHOPFRONT_AUTH_TOKEN", "very-private-token"),
        ])
        .unwrap();
        assert!(!format!("{config:?}").contains("very-private-token"));
    }
}
