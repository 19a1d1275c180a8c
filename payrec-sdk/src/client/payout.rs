//! Payout API client (payrec server → payment provider).
//!
//! Requests are authenticated with a bearer token and bounded by a timeout,
//! 30 seconds unless configured otherwise.

use std::time::Duration;

use reqwest::Client;
use url::Url;

use super::ClientError;
use crate::config::PayoutEnvironment;
use crate::objects::payout::{PayoutRequest, PayoutResponse};

/// Typed HTTP client for the provider's **Payout API**.
#[derive(Clone)]
pub struct PayoutClient {
    http: Client,
    base_url: Url,
    api_key: String,
    timeout: Duration,
}

impl std::fmt::Debug for PayoutClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayoutClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PayoutClient {
    /// Request timeout applied to every call unless overridden.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a new `PayoutClient`.
    ///
    /// * `base_url` – root URL of the provider API.
    /// * `api_key` – bearer token.
    pub fn new(base_url: Url, api_key: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(Self::DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        })
    }

    /// Create a client for one of the provider's public environments.
    pub fn for_environment(
        environment: PayoutEnvironment,
        api_key: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Self::new(environment.url()?, api_key)
    }

    /// Rebuild the HTTP client with a different request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ClientError> {
        self.http = Client::builder().timeout(timeout).build()?;
        self.timeout = timeout;
        Ok(self)
    }

    /// Request timeout of the built-in HTTP client.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// The API root this client talks to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `POST /v2/payouts` – initiate a payout.
    pub async fn create_payout(
        &self,
        request: &PayoutRequest,
    ) -> Result<PayoutResponse, ClientError> {
        let url = self.base_url.join("/v2/payouts")?;

        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        parse_response(resp).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
