//! Event channel factories and handles.

use super::types::EscrowChanged;
use tokio::sync::mpsc;

/// Default buffer size for event channels.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for EscrowChanged events.
pub type EscrowChangedSender = mpsc::Sender<EscrowChanged>;
/// Receiver handle for EscrowChanged events.
pub type EscrowChangedReceiver = mpsc::Receiver<EscrowChanged>;

/// Create a new EscrowChanged channel.
///
/// The store's change listener owns the sender, the `EscrowWatcher` the receiver.
pub fn escrow_changed_channel() -> (EscrowChangedSender, EscrowChangedReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
