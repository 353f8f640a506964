//! Checkout: token resolution, shipping resolution, and step sequencing.
//!
//! # Flow
//!
//! 1. [`TokenResolver`] exchanges the cart snapshot for a checkout token
//! 2. [`ShippingPipeline`] resolves country, subdivision, and shipping option
//!    against that token
//! 3. [`Checkout`] walks Address, Payment, and Confirmation, then captures
//!    the order

mod orchestrator;
pub mod shipping;
mod token;

pub use orchestrator::{
    AddressInput, Checkout, Navigation, advance_address, advance_payment, build_order_payload,
};
pub use shipping::{
    FetchKey, FetchTag, PipelineEvent, PipelineState, Resolution, ShippingPipeline, Stage,
    StageStatus, Transition,
};
pub use token::TokenResolver;
