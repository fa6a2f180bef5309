/// AEGIS Bridge Rust SDK
///
/// Call the inter-instance bridge with correctly signed envelopes.

pub mod client;

pub use client::{BridgeClient, ContextResponse, DelegationResponse, HealthResponse};
