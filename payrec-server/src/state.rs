//! Application state shared across all request handlers.

use crate::config::runtime::AdminConfig;
use payrec_core::processors::{CallbackRouter, PayoutInitiator};
use payrec_core::store::EntityStore;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Persistence for purchases and escrows.
    pub store: Arc<dyn EntityStore>,
    /// Reconciles inbound provider callbacks.
    pub callbacks: Arc<CallbackRouter>,
    /// Shared with the escrow watcher; the admin trigger retries through it.
    pub initiator: Arc<PayoutInitiator>,
    pub admin: Arc<AdminConfig>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn EntityStore>,
        callbacks: Arc<CallbackRouter>,
        initiator: Arc<PayoutInitiator>,
        admin: AdminConfig,
    ) -> Self {
        Self {
            store,
            callbacks,
            initiator,
            admin: Arc::new(admin),
        }
    }
}
