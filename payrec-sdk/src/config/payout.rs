//! Payout provider environment.

use serde::{Deserialize, Serialize};
use url::Url;

const SANDBOX_BASE_URL: &str = "https://api.sandbox.pawapay.io";
const PRODUCTION_BASE_URL: &str = "https://api.pawapay.io";

/// Which payout provider deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl PayoutEnvironment {
    /// Root URL of the provider API for this environment.
    pub fn base_url(&self) -> &'static str {
        match self {
            PayoutEnvironment::Sandbox => SANDBOX_BASE_URL,
            PayoutEnvironment::Production => PRODUCTION_BASE_URL,
        }
    }

    /// Parsed form of [`base_url`](Self::base_url).
    pub fn url(&self) -> Result<Url, url::ParseError> {
        Url::parse(self.base_url())
    }
}

impl std::fmt::Display for PayoutEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayoutEnvironment::Sandbox => write!(f, "sandbox"),
            PayoutEnvironment::Production => write!(f, "production"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_urls() {
        assert_eq!(
            PayoutEnvironment::Sandbox.url().unwrap().as_str(),
            "https://api.sandbox.pawapay.io/"
        );
        assert_eq!(
            PayoutEnvironment::Production.base_url(),
            "https://api.pawapay.io"
        );
    }

    #[test]
    fn test_environment_parsing() {
        #[derive(Deserialize)]
        struct Wrapper {
            environment: PayoutEnvironment,
        }
        let w: Wrapper = serde_json::from_str(r#"{"environment": "production"}"#).unwrap();
        assert_eq!(w.environment, PayoutEnvironment::Production);
    }
}
