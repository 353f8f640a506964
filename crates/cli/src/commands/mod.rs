//! CLI command implementations.
//!
//! Commands are generic over the gateway so they run the same against the
//! live API and the in-memory gateway.

pub mod cart;
pub mod checkout;
pub mod products;
