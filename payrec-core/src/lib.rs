#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod entities;
pub mod events;
pub mod framework;
pub mod payout;
pub mod processors;
pub mod store;
pub mod transfer;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
