//! Shopfront Core - Shared types library.
//!
//! This crate provides the types shared by every Shopfront component:
//! - `cart` - Cart state store, persistence and backend reconciliation
//! - `cli` - Command-line driver for the cart
//!
//! # Architecture
//!
//! The core crate contains only types and pure transformations - no I/O, no
//! storage access, no HTTP clients. This keeps it lightweight and allows it to
//! be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, prices, products and cart state

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
