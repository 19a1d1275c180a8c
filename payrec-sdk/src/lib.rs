//! Shared wire types for payrec.
//!
//! [`objects`] holds every JSON shape that crosses a process boundary: the
//! payment provider's callback body, the payout API request/response and the
//! admin API responses. The `client` feature adds a typed payout API client.

pub mod config;
pub mod objects;

#[cfg(feature = "client")]
pub mod client;
