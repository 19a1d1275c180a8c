//! Payout API request and response types (`POST /v2/payouts`).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Recipient type for mobile-money operator accounts.
pub const MOBILE_MONEY_RECIPIENT: &str = "MMO";

/// Request body for initiating a payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRequest {
    /// Client-generated idempotency key. The provider ignores a second
    /// request carrying the same id.
    pub payout_id: Uuid,
    /// Whole currency units, no fractional part.
    pub amount: String,
    pub currency: String,
    pub recipient: PayoutRecipient,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_reference_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRecipient {
    #[serde(rename = "type")]
    pub kind: String,
    pub account_details: AccountDetails,
}

impl PayoutRecipient {
    /// A mobile-money recipient.
    pub fn mobile_money(phone_number: String, provider: String) -> Self {
        Self {
            kind: MOBILE_MONEY_RECIPIENT.to_string(),
            account_details: AccountDetails {
                phone_number,
                provider,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetails {
    /// Digits only, international format without `+`.
    pub phone_number: String,
    /// Mobile-money operator code, e.g. `MTN_MOMO_RWA`.
    pub provider: String,
}

/// Response to a payout initiation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutResponse {
    #[serde(default)]
    pub payout_id: Option<String>,
    #[serde(default)]
    pub status: Option<PayoutAcceptance>,
    #[serde(default)]
    pub failure_reason: Option<FailureReason>,
}

/// Whether the provider accepted the payout for processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutAcceptance {
    Accepted,
    Rejected,
    /// A payout with the same id was already submitted.
    DuplicateIgnored,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReason {
    #[serde(default)]
    pub failure_code: Option<String>,
    #[serde(default)]
    pub failure_message: Option<String>,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.failure_code, &self.failure_message) {
            (Some(code), Some(message)) => write!(f, "{code}: {message}"),
            (Some(code), None) => write!(f, "{code}"),
            (None, Some(message)) => write!(f, "{message}"),
            (None, None) => write!(f, "unspecified failure"),
        }
    }
}

/// Terminal payout status reported by payout callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
    Completed,
    Failed,
    Rejected,
}

impl PayoutStatus {
    /// Parse a provider status string; non-terminal statuses yield `None`.
    pub fn from_terminal(status: &str) -> Option<Self> {
        match status {
            "COMPLETED" => Some(PayoutStatus::Completed),
            "FAILED" => Some(PayoutStatus::Failed),
            "REJECTED" => Some(PayoutStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayoutStatus::Completed => write!(f, "COMPLETED"),
            PayoutStatus::Failed => write!(f, "FAILED"),
            PayoutStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let payout_id = Uuid::nil();
        let request = PayoutRequest {
            payout_id,
            amount: "10000".to_string(),
            currency: "RWF".to_string(),
            recipient: PayoutRecipient::mobile_money(
                "250788123456".to_string(),
                "MTN_MOMO_RWA".to_string(),
            ),
            client_reference_id: Some("escrow-1".to_string()),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "payoutId": "00000000-0000-0000-0000-000000000000",
                "amount": "10000",
                "currency": "RWF",
                "recipient": {
                    "type": "MMO",
                    "accountDetails": {
                        "phoneNumber": "250788123456",
                        "provider": "MTN_MOMO_RWA"
                    }
                },
                "clientReferenceId": "escrow-1"
            })
        );
    }

    #[test]
    fn test_client_reference_is_omitted_when_absent() {
        let request = PayoutRequest {
            payout_id: Uuid::nil(),
            amount: "1".to_string(),
            currency: "RWF".to_string(),
            recipient: PayoutRecipient::mobile_money("1".to_string(), "P".to_string()),
            client_reference_id: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("clientReferenceId").is_none());
    }

    #[test]
    fn test_rejected_response_parsing() {
        let json = r#"{
            "payoutId": "f4401bd2-1568-4140-bf2d-eb77d2b2b639",
            "status": "REJECTED",
            "failureReason": {
                "failureCode": "PAYOUTS_NOT_ALLOWED",
                "failureMessage": "Payouts are not enabled"
            }
        }"#;
        let response: PayoutResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.status, Some(PayoutAcceptance::Rejected));
        assert_eq!(
            response.failure_reason.unwrap().to_string(),
            "PAYOUTS_NOT_ALLOWED: Payouts are not enabled"
        );
    }

    #[test]
    fn test_unknown_acceptance_status() {
        let response: PayoutResponse =
            serde_json::from_str(r#"{"status": "IN_RECONCILIATION"}"#).unwrap();
        assert_eq!(response.status, Some(PayoutAcceptance::Unknown));
        assert!(response.payout_id.is_none());
    }

    #[test]
    fn test_terminal_status_parsing() {
        assert_eq!(
            PayoutStatus::from_terminal("COMPLETED"),
            Some(PayoutStatus::Completed)
        );
        assert_eq!(PayoutStatus::from_terminal("FAILED"), Some(PayoutStatus::Failed));
        assert_eq!(
            PayoutStatus::from_terminal("REJECTED"),
            Some(PayoutStatus::Rejected)
        );
        assert_eq!(PayoutStatus::from_terminal("ACCEPTED"), None);
        assert_eq!(PayoutStatus::from_terminal("completed"), None);
    }
}
