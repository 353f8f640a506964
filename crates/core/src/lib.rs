//! Shopfront Core - Shared domain types for the storefront client.
//!
//! This crate provides the types exchanged between the commerce gateway, the
//! cart/checkout session, and whatever presentation layer renders them:
//! - `shopfront` - Gateway client and cart/checkout session state machine
//! - `shopfront-cli` - Terminal front end
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no async.
//! Every aggregate the gateway computes (cart subtotal, item counts, order
//! value) is carried as data and never recomputed here.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, catalog, cart, and checkout types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
