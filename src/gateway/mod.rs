//! Typed HTTP gateway to the primary API and the agent service.

mod client;
mod error;
mod filter;
pub mod recipes;
pub mod types;

pub use client::{Gateway, GatewayResult};
pub use error::GatewayError;
pub use filter::ListFilter;
