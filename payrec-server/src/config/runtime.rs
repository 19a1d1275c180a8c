//! Validated runtime configuration.

use std::net::SocketAddr;
use std::time::Duration;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use payrec_sdk::config::PayoutEnvironment;

pub use payrec_core::config::{ChainConfig, ReconcilerConfig};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}

/// Admin configuration with hashed secret.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// The argon2 hashed admin secret.
    pub secret_hash: String,
}

impl AdminConfig {
    pub fn new(secret_hash: String) -> Self {
        Self { secret_hash }
    }

    /// Verify a plaintext secret against the stored hash.
    pub fn verify_secret(&self, plaintext: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(&self.secret_hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct PayoutSettings {
    pub environment: PayoutEnvironment,
    /// Timeout of the provider HTTP client. It trails the initiator's own
    /// bound so a slow provider defers the payout instead of failing it.
    pub http_timeout: Duration,
}

impl PayoutSettings {
    const HTTP_SLACK: Duration = Duration::from_secs(5);

    pub fn new(environment: PayoutEnvironment, payout_timeout: Duration) -> Self {
        Self {
            environment,
            http_timeout: payout_timeout + Self::HTTP_SLACK,
        }
    }
}
