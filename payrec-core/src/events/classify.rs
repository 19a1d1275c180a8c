//! Pure classification of raw inputs into events.

use rust_decimal::Decimal;
use payrec_sdk::objects::{CallbackPayload, PayoutStatus as SdkPayoutStatus};

use super::types::{
    CallbackEvent, DepositCompleted, EscrowChanged, EscrowTransition, PayoutTerminal,
};
use crate::entities::{EscrowStatus, PaymentType};

const COMPLETED: &str = "COMPLETED";

/// Turn a provider callback into the events it carries.
///
/// An empty result means the callback is ignored: non-terminal statuses,
/// missing identifiers and unknown shapes all end up here.
pub fn classify_callback(payload: &CallbackPayload) -> Vec<CallbackEvent> {
    let status = payload.status.as_deref().map(str::trim);
    let mut events = Vec::with_capacity(2);

    if let Some(deposit_id) = non_empty(payload.deposit_id.as_deref())
        && status == Some(COMPLETED)
    {
        events.push(CallbackEvent::DepositCompleted(DepositCompleted {
            deposit_id: deposit_id.to_string(),
            amount: payload.amount.as_deref().and_then(parse_amount),
            currency: non_empty(payload.currency.as_deref()).map(str::to_string),
        }));
    }

    if let Some(payout_id) = non_empty(payload.payout_id.as_deref())
        && let Some(status) = status.and_then(SdkPayoutStatus::from_terminal)
    {
        events.push(CallbackEvent::PayoutTerminal(PayoutTerminal {
            payout_id: payout_id.to_string(),
            status: status.into(),
        }));
    }

    events
}

/// Detect a fiat escrow moving into `completed`.
///
/// Inserts and deletes never qualify, and neither does a write that leaves
/// an already completed escrow completed.
pub fn classify_escrow_change(change: &EscrowChanged) -> Option<EscrowTransition> {
    let before = change.before?;
    let after = change.after?;
    if before.status == EscrowStatus::Completed
        || after.status != EscrowStatus::Completed
        || after.payment_type != PaymentType::Fiat
    {
        return None;
    }
    Some(EscrowTransition::Completed {
        escrow_id: change.escrow_id,
        snapshot: after,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_amount(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    raw.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(raw).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::PayoutStatus;
    use crate::events::EscrowSnapshot;
    use uuid::Uuid;

    fn payload(json: &str) -> CallbackPayload {
        serde_json::from_str(json).unwrap()
    }

    fn snapshot(status: EscrowStatus, payment_type: PaymentType) -> EscrowSnapshot {
        EscrowSnapshot {
            status,
            payment_type,
        }
    }

    #[test]
    fn test_completed_deposit() {
        let events = classify_callback(&payload(
            r#"{"depositId": "d1", "status": "COMPLETED", "amount": "10000", "currency": "RWF"}"#,
        ));
        assert_eq!(
            events,
            vec![CallbackEvent::DepositCompleted(DepositCompleted {
                deposit_id: "d1".to_string(),
                amount: Some(Decimal::from(10000)),
                currency: Some("RWF".to_string()),
            })]
        );
    }

    #[test]
    fn test_deposit_with_unparseable_amount_keeps_event() {
        let events = classify_callback(&payload(
            r#"{"depositId": "d1", "status": "COMPLETED", "amount": "ten"}"#,
        ));
        assert_eq!(
            events,
            vec![CallbackEvent::DepositCompleted(DepositCompleted {
                deposit_id: "d1".to_string(),
                amount: None,
                currency: None,
            })]
        );
    }

    #[test]
    fn test_non_terminal_statuses_are_ignored() {
        assert!(classify_callback(&payload(r#"{"depositId": "d1", "status": "ACCEPTED"}"#)).is_empty());
        assert!(classify_callback(&payload(r#"{"depositId": "d1", "status": "FAILED"}"#)).is_empty());
        assert!(classify_callback(&payload(r#"{"payoutId": "p1", "status": "ENQUEUED"}"#)).is_empty());
        assert!(classify_callback(&payload(r#"{"depositId": "", "status": "COMPLETED"}"#)).is_empty());
        assert!(classify_callback(&payload("{}")).is_empty());
    }

    #[test]
    fn test_payout_terminal_statuses() {
        for (raw, expected) in [
            ("COMPLETED", PayoutStatus::Completed),
            ("FAILED", PayoutStatus::Failed),
            ("REJECTED", PayoutStatus::Rejected),
        ] {
            let json = format!(r#"{{"payoutId": "p1", "status": "{raw}"}}"#);
            assert_eq!(
                classify_callback(&payload(&json)),
                vec![CallbackEvent::PayoutTerminal(PayoutTerminal {
                    payout_id: "p1".to_string(),
                    status: expected,
                })]
            );
        }
    }

    #[test]
    fn test_payload_with_both_sections_yields_both_events() {
        let events = classify_callback(&payload(
            r#"{"depositId": "d1", "payoutId": "p1", "status": "COMPLETED"}"#,
        ));
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], CallbackEvent::DepositCompleted(_)));
        assert!(matches!(events[1], CallbackEvent::PayoutTerminal(_)));
    }

    #[test]
    fn test_escrow_completion_is_detected() {
        let escrow_id = Uuid::new_v4();
        let change = EscrowChanged {
            escrow_id,
            before: Some(snapshot(EscrowStatus::Funded, PaymentType::Fiat)),
            after: Some(snapshot(EscrowStatus::Completed, PaymentType::Fiat)),
        };
        assert_eq!(
            classify_escrow_change(&change),
            Some(EscrowTransition::Completed {
                escrow_id,
                snapshot: snapshot(EscrowStatus::Completed, PaymentType::Fiat),
            })
        );
    }

    #[test]
    fn test_escrow_changes_that_do_not_qualify() {
        let escrow_id = Uuid::new_v4();
        let cases = [
            // already completed before the write
            (
                Some(snapshot(EscrowStatus::Completed, PaymentType::Fiat)),
                Some(snapshot(EscrowStatus::Completed, PaymentType::Fiat)),
            ),
            // crypto escrow
            (
                Some(snapshot(EscrowStatus::Funded, PaymentType::Crypto)),
                Some(snapshot(EscrowStatus::Completed, PaymentType::Crypto)),
            ),
            // not completed
            (
                Some(snapshot(EscrowStatus::Created, PaymentType::Fiat)),
                Some(snapshot(EscrowStatus::Funded, PaymentType::Fiat)),
            ),
            // insert
            (None, Some(snapshot(EscrowStatus::Completed, PaymentType::Fiat))),
            // delete
            (Some(snapshot(EscrowStatus::Funded, PaymentType::Fiat)), None),
        ];
        for (before, after) in cases {
            let change = EscrowChanged {
                escrow_id,
                before,
                after,
            };
            assert_eq!(classify_escrow_change(&change), None, "{change:?}");
        }
    }

    #[test]
    fn test_notification_payload_parsing() {
        let json = r#"{
            "escrow_id": "5f0c6d8e-8f57-4b6e-9d43-3f1f4d7a2b10",
            "before": {"status": "funded", "payment_type": "fiat"},
            "after": {"status": "completed", "payment_type": "fiat"}
        }"#;
        let change: EscrowChanged = serde_json::from_str(json).unwrap();
        assert!(classify_escrow_change(&change).is_some());

        let insert: EscrowChanged = serde_json::from_str(
            r#"{"escrow_id": "5f0c6d8e-8f57-4b6e-9d43-3f1f4d7a2b10", "before": null, "after": {"status": "created", "payment_type": "crypto"}}"#,
        )
        .unwrap();
        assert!(insert.before.is_none());
    }
}
