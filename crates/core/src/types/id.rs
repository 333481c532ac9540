//! Newtype IDs for type-safe entity references.
//!
//! The cart backend hands out identifiers as either JSON numbers or JSON
//! strings depending on the entity. [`IdValue`] keeps whichever form arrived
//! so it serializes back unchanged, while comparing and hashing by its
//! canonical text so `1` and `"1"` name the same entity.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Raw identifier as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdValue {
    Number(i64),
    Text(String),
}

impl IdValue {
    /// Parse an identifier typed by a human or read from a URL.
    ///
    /// Canonical integers (`"42"`, not `"042"`) become [`IdValue::Number`] so
    /// they serialize the way the backend emits numeric keys.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(n) if n.to_string() == raw => Self::Number(n),
            _ => Self::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for IdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl PartialEq for IdValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => self.to_string() == other.to_string(),
        }
    }
}

impl Eq for IdValue {}

impl Hash for IdValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

impl From<i64> for IdValue {
    fn from(id: i64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for IdValue {
    fn from(id: &str) -> Self {
        Self::parse(id)
    }
}

impl From<String> for IdValue {
    fn from(id: String) -> Self {
        Self::parse(&id)
    }
}

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around [`IdValue`] with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - `Display` and `FromStr` (infallible, for CLI arguments)
/// - `From<i64>`, `From<&str>` and `From<String>` implementations
///
/// # Example
///
/// ```rust
/// # use shopfront_core::define_id;
/// define_id!(WidgetId);
/// define_id!(GadgetId);
///
/// let widget = WidgetId::from(1);
/// let gadget = GadgetId::from("1");
/// assert_eq!(widget.to_string(), gadget.to_string());
///
/// // These are different types, so this won't compile:
/// // let _: WidgetId = gadget;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name($crate::types::id::IdValue);

        impl $name {
            /// Create a new ID from anything convertible to an [`IdValue`].
            #[must_use]
            pub fn new(id: impl Into<$crate::types::id::IdValue>) -> Self {
                Self(id.into())
            }

            /// Get the underlying wire value.
            #[must_use]
            pub const fn value(&self) -> &$crate::types::id::IdValue {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::convert::Infallible;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Ok(Self($crate::types::id::IdValue::parse(s)))
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id.into())
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.into())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id.into())
            }
        }
    };
}

// Define standard entity IDs
define_id!(ProductId);
define_id!(CustomerId);
define_id!(CartId);
define_id!(CartItemId);
