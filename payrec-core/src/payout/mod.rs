//! Seller payouts over the provider's mobile-money API.

use async_trait::async_trait;
use payrec_sdk::client::{ClientError, PayoutClient};
use payrec_sdk::objects::{PayoutAcceptance, PayoutRecipient, PayoutRequest};
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

/// Everything needed to send one payout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutCommand {
    /// Idempotency key, reused when retrying an attempt with an unknown outcome.
    pub request_id: Uuid,
    /// Digits only.
    pub phone_number: String,
    pub provider: String,
    /// Whole currency units.
    pub amount: String,
    pub currency: String,
    pub client_reference_id: String,
}

/// Provider acknowledgement of a payout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutReceipt {
    /// Provider payout id, when the response carried one.
    pub payout_id: Option<String>,
    /// The provider had already seen this idempotency key.
    pub duplicate: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum PayoutError {
    #[error("payout rejected: {0}")]
    Rejected(String),
    #[error("unrecognized payout response status")]
    Unrecognized,
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl PayoutError {
    /// Whether the provider may have created the payout despite the error.
    pub fn is_ambiguous(&self) -> bool {
        match self {
            PayoutError::Rejected(_) => false,
            PayoutError::Unrecognized => true,
            PayoutError::Client(e) => e.is_ambiguous(),
        }
    }
}

#[async_trait]
pub trait PayoutApi: Send + Sync {
    async fn initiate(&self, command: &PayoutCommand) -> Result<PayoutReceipt, PayoutError>;
}

#[async_trait]
impl PayoutApi for PayoutClient {
    #[tracing::instrument(skip_all, err, fields(request_id = %command.request_id))]
    async fn initiate(&self, command: &PayoutCommand) -> Result<PayoutReceipt, PayoutError> {
        let request = PayoutRequest {
            payout_id: command.request_id,
            amount: command.amount.clone(),
            currency: command.currency.clone(),
            recipient: PayoutRecipient::mobile_money(
                command.phone_number.clone(),
                command.provider.clone(),
            ),
            client_reference_id: Some(command.client_reference_id.clone()),
        };
        let response = self.create_payout(&request).await?;
        match response.status {
            Some(PayoutAcceptance::Rejected) => {
                let reason = response
                    .failure_reason
                    .map(|reason| reason.to_string())
                    .unwrap_or_else(|| "no failure reason given".to_string());
                Err(PayoutError::Rejected(reason))
            }
            Some(PayoutAcceptance::Unknown) => Err(PayoutError::Unrecognized),
            Some(PayoutAcceptance::DuplicateIgnored) => Ok(PayoutReceipt {
                payout_id: response.payout_id,
                duplicate: true,
            }),
            Some(PayoutAcceptance::Accepted) | None => Ok(PayoutReceipt {
                payout_id: response.payout_id,
                duplicate: false,
            }),
        }
    }
}

/// Strip everything but ASCII digits from a phone number.
pub fn digits_only(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// Round to whole currency units, half away from zero.
pub fn whole_units(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}
