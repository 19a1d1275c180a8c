//! Inbound payment-provider callback types.

use serde::{Deserialize, Deserializer, Serialize};

/// Body of a payment-provider callback.
///
/// Deposit and payout callbacks share one endpoint and carry different
/// subsets of these fields, so every field is optional. Each field is
/// accepted both as a JSON string and as a JSON number (`"10000"` or
/// `10000`); any other JSON type reads as absent, so a well-formed body is
/// never refused over a field type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub deposit_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub payout_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub currency: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Acknowledgement returned for every parsed callback.
///
/// The provider redelivers based on the transport-level response, so this is
/// sent regardless of the business outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackAck {
    pub received: bool,
}

impl CallbackAck {
    pub const RECEIVED: CallbackAck = CallbackAck { received: true };
}
