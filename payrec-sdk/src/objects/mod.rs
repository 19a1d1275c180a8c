pub mod admin;
pub mod callback;
pub mod payout;

pub use admin::{
    ADMIN_AUTH_HEADER, EscrowResponse, EscrowStatus, PaymentType, PayoutTriggerOutcome,
    PayoutTriggerResponse, PurchaseResponse, PurchaseStatus,
};
pub use callback::{CallbackAck, CallbackPayload};
pub use payout::{
    AccountDetails, FailureReason, PayoutAcceptance, PayoutRecipient, PayoutRequest,
    PayoutResponse, PayoutStatus,
};
