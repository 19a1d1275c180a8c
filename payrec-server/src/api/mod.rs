//! HTTP API surface.
//!
//! - `callbacks`: payment-provider callbacks, unauthenticated
//! - `admin`: operator endpoints behind the admin secret

pub mod admin;
pub mod callbacks;
pub mod extractors;
