//! Configuration module for payrec-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables. Also handles admin secret hashing.

pub mod file;
pub mod runtime;

use crate::config::file::FileConfig;
use crate::config::runtime::{
    AdminConfig, ChainConfig, PayoutSettings, ReconcilerConfig, ServerConfig,
};
use payrec_core::transfer::TokenRegistry;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("password hashing error: {0}")]
    HashError(String),

    #[error("{0} environment variable not set")]
    MissingEnv(&'static str),
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub payout: PayoutSettings,
    pub chain: ChainConfig,
    pub reconciler: ReconcilerConfig,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Hash the admin secret if it's plaintext (and rewrite the file)
    /// 5. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        self.validate(&file_config)?;

        let secret_hash = if file_config.is_admin_secret_hashed() {
            file_config.admin.secret.clone()
        } else {
            let hash = self.hash_secret(&file_config.admin.secret)?;
            file_config.admin.secret = hash.clone();
            // The listen override is a runtime choice and must not be persisted.
            self.rewrite_config(&file_config)?;
            tracing::info!("Admin secret hashed and config file updated");
            hash
        };

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        self.build_loaded_config(file_config, secret_hash)
    }

    fn validate(&self, config: &FileConfig) -> Result<(), ConfigError> {
        if config.admin.secret.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "admin secret must not be empty".to_string(),
            ));
        }
        if config.payout.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "payout.timeout_secs must be positive".to_string(),
            ));
        }
        if config.chain.transfer_timeout_secs == 0 || config.chain.confirm_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "chain.transfer_timeout_secs and chain.confirm_timeout_secs must be positive"
                    .to_string(),
            ));
        }
        let longest_call = config
            .chain
            .transfer_timeout_secs
            .max(config.payout.timeout_secs);
        if config.claims.lease_secs <= longest_call {
            return Err(ConfigError::ValidationError(format!(
                "claims.lease_secs must exceed the transfer and payout timeouts ({longest_call}s)"
            )));
        }
        if config.payout.default_currency.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "payout.default_currency must not be empty".to_string(),
            ));
        }
        if let Some(Err(e)) = config.chain.rpc_url.as_deref().map(Url::parse) {
            return Err(ConfigError::ValidationError(format!(
                "chain.rpc_url is not a valid url: {e}"
            )));
        }
        for token in &config.chain.tokens {
            if token.symbol.trim().is_empty() || token.address.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "chain.tokens entries need a symbol and an address".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn hash_secret(&self, plaintext: &str) -> Result<String, ConfigError> {
        use argon2::{
            Argon2, PasswordHasher,
            password_hash::{SaltString, rand_core::OsRng},
        };

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ConfigError::HashError(e.to_string()))
    }

    fn rewrite_config(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(config)?;

        // Write atomically: write to temp file, then rename
        let temp_path = self.config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, toml_string)?;
        std::fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }

    fn build_loaded_config(
        &self,
        file_config: FileConfig,
        secret_hash: String,
    ) -> Result<LoadedConfig, ConfigError> {
        let FileConfig {
            server,
            payout,
            chain,
            claims,
            ..
        } = file_config;

        let rpc_url = chain
            .rpc_url
            .as_deref()
            .unwrap_or(chain.network.default_rpc_url());
        let rpc_url = Url::parse(rpc_url).map_err(|e| {
            ConfigError::ValidationError(format!("chain.rpc_url is not a valid url: {e}"))
        })?;
        let tokens = chain
            .tokens
            .iter()
            .fold(TokenRegistry::for_network(chain.network), |registry, token| {
                registry.with_contract(&token.symbol, &token.address)
            });

        Ok(LoadedConfig {
            server: ServerConfig {
                listen: server.listen,
            },
            admin: AdminConfig::new(secret_hash),
            payout: PayoutSettings::new(
                payout.environment,
                Duration::from_secs(payout.timeout_secs),
            ),
            chain: ChainConfig {
                network: chain.network,
                rpc_url,
                confirmations: chain.confirmations,
                tokens,
            },
            reconciler: ReconcilerConfig {
                default_currency: payout.default_currency.trim().to_string(),
                transfer_timeout: Duration::from_secs(chain.transfer_timeout_secs),
                confirm_timeout: Duration::from_secs(chain.confirm_timeout_secs),
                payout_timeout: Duration::from_secs(payout.timeout_secs),
                claim_lease: Duration::from_secs(claims.lease_secs),
            },
        })
    }
}

/// Secrets read from the environment.
pub struct Secrets {
    pub database_url: String,
    pub payout_api_key: String,
    /// Absent means token purchases fail with a configuration error.
    pub hot_wallet_private_key: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingEnv(name))
        };
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            payout_api_key: required("PAWAPAY_API_KEY")?,
            hot_wallet_private_key: required("HOT_WALLET_PRIVATE_KEY").ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payrec_core::transfer::Network;

    fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payrec-config.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_plaintext_secret_is_hashed_and_persisted() {
        let (_dir, path) = write_config(
            r#"
[admin]
secret = "hunter2"

[chain]
network = "testnet"

[[chain.tokens]]
symbol = "usdt"
address = "0x0000000000000000000000000000000000000001"
"#,
        );
        let loader = ConfigLoader::new(&path, Some("127.0.0.1:9999".parse().unwrap()));
        let loaded = loader.load().unwrap();

        assert!(loaded.admin.verify_secret("hunter2"));
        assert_eq!(loaded.server.listen.port(), 9999);
        assert_eq!(loaded.chain.network, Network::Testnet);
        assert_eq!(
            loaded.chain.rpc_url.as_str(),
            "https://rpc-amoy.polygon.technology/"
        );
        assert_eq!(
            loaded.chain.tokens.resolve("USDT"),
            Some("0x0000000000000000000000000000000000000001")
        );
        assert_eq!(loaded.reconciler.default_currency, "RWF");
        assert_eq!(loaded.reconciler.claim_lease, Duration::from_secs(900));
        assert_eq!(loaded.reconciler.confirm_timeout, Duration::from_secs(180));

        let rewritten: FileConfig =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(rewritten.is_admin_secret_hashed());
        assert_eq!(rewritten.server.listen.port(), 8080);

        // loading again keeps the stored hash
        let reloaded = ConfigLoader::new(&path, None).load().unwrap();
        assert_eq!(reloaded.admin.secret_hash, rewritten.admin.secret);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let (_dir, path) = write_config("[admin]\nsecret = \"s\"\n[payout]\ntimeout_secs = 0\n");
        assert!(matches!(
            ConfigLoader::new(&path, None).load(),
            Err(ConfigError::ValidationError(_))
        ));

        let (_dir, path) =
            write_config("[admin]\nsecret = \"s\"\n[chain]\nrpc_url = \"not a url\"\n");
        assert!(matches!(
            ConfigLoader::new(&path, None).load(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_claim_lease_must_outlast_external_calls() {
        let (_dir, path) = write_config(
            r#"
[admin]
secret = "s"

[chain]
transfer_timeout_secs = 300

[claims]
lease_secs = 300
"#,
        );
        assert!(matches!(
            ConfigLoader::new(&path, None).load(),
            Err(ConfigError::ValidationError(_))
        ));

        let (_dir, path) = write_config(
            r#"
[admin]
secret = "s"

[payout]
timeout_secs = 60

[chain]
transfer_timeout_secs = 120

[claims]
lease_secs = 121
"#,
        );
        let loaded = ConfigLoader::new(&path, None).load().unwrap();
        assert_eq!(loaded.reconciler.claim_lease, Duration::from_secs(121));
        assert_eq!(loaded.reconciler.payout_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_payout_http_timeout_follows_configured_timeout() {
        let (_dir, path) = write_config(
            r#"
[admin]
secret = "s"

[payout]
timeout_secs = 90
"#,
        );
        let loaded = ConfigLoader::new(&path, None).load().unwrap();
        assert_eq!(loaded.reconciler.payout_timeout, Duration::from_secs(90));
        assert!(loaded.payout.http_timeout > loaded.reconciler.payout_timeout);
    }
}
