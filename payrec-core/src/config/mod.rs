//! Configuration types for payrec.
//!
//! These types represent the validated runtime configuration used by the
//! reconciliation processors. The actual config loading/parsing is handled
//! by the server crate.

mod chain;
mod reconciler;

pub use chain::ChainConfig;
pub use reconciler::ReconcilerConfig;
