//! Shopfront storefront client library.
//!
//! Keeps a client-held cart in sync with a remote commerce gateway and
//! drives the checkout session on top of it:
//!
//! - [`gateway`] - `CommerceGateway` trait, Chec REST client, timeout decorator
//! - [`catalog`] - Cached product list
//! - [`cart`] - Serialized cart mutations with wholesale snapshot replacement
//! - [`checkout`] - Token resolution, shipping resolution pipeline, step sequencing
//! - [`session`] - `Storefront` facade tying them together
//! - [`config`] - Environment configuration
//! - [`error`] - Error taxonomy

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod gateway;
pub mod session;

pub use error::{ErrorKind, StorefrontError, ValidationError};
pub use session::{LiveGateway, Storefront};
