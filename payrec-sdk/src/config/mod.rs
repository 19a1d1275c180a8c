//! Configuration types shared between the server and SDK consumers.

mod payout;

pub use payout::PayoutEnvironment;
