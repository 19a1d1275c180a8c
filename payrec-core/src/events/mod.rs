//! Events flowing into the reconciliation pipeline.
//!
//! # Event Flow
//!
//! 1. A provider callback is classified into [`CallbackEvent`]s, handled
//!    inline by `CallbackRouter`.
//! 2. Every escrow write publishes an [`EscrowChanged`] notification. The
//!    `EscrowWatcher` classifies it into an [`EscrowTransition`] and hands
//!    completed fiat escrows to `PayoutInitiator`.
//!
//! Events carry identifiers and a minimal snapshot. Processors re-read the
//! entity before acting.

pub mod channels;
pub mod classify;
pub mod types;

pub use channels::{
    DEFAULT_CHANNEL_BUFFER, EscrowChangedReceiver, EscrowChangedSender, escrow_changed_channel,
};
pub use classify::{classify_callback, classify_escrow_change};
pub use types::{
    CallbackEvent, DepositCompleted, EscrowChanged, EscrowSnapshot, EscrowTransition,
    PayoutTerminal,
};
