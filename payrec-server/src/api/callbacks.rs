//! Payment-provider callback endpoint.
//!
//! - `POST /pawapay` – deposit and payout callbacks
//!
//! The provider redelivers on a non-2xx answer, so once the body parses as a
//! JSON object the answer is always `{"received": true}`, whatever
//! reconciliation did. Only a body that is not JSON at all gets a 400.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use kanau::processor::Processor;
use payrec_core::processors::CallbackOutcome;
use payrec_sdk::objects::{CallbackAck, CallbackPayload};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/pawapay", post(receive_callback))
}

/// `POST /callbacks/pawapay`
pub async fn receive_callback(State(state): State<AppState>, body: Bytes) -> Response {
    let payload: CallbackPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable callback body");
            return (StatusCode::BAD_REQUEST, "invalid JSON body").into_response();
        }
    };

    let Ok(outcomes) = state.callbacks.process(payload).await;
    for outcome in &outcomes {
        match outcome {
            CallbackOutcome::Errored(error) => {
                tracing::error!(%error, "Callback left unreconciled")
            }
            other => tracing::debug!(outcome = ?other, "Callback reconciled"),
        }
    }

    (StatusCode::OK, Json(CallbackAck::RECEIVED)).into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use payrec_core::entities::{EscrowStatus, PurchaseStatus};
    use payrec_core::store::EntityStore;
    use payrec_core::testkit::{PayoutBehavior, fiat_escrow, pending_purchase};
    use payrec_sdk::objects::CallbackAck;
    use rust_decimal::Decimal;
    use tower::ServiceExt;

    use crate::api::admin::tests::{body_json, test_app};
    use crate::server::build_router;

    fn callback(body: &str) -> Request<Body> {
        Request::post("/callbacks/pawapay")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_deposit_callback_fulfils_purchase_once() {
        let app = test_app(PayoutBehavior::Ambiguous);
        app.store
            .insert_purchase(pending_purchase(
                "dep-1",
                Some("0x00000000000000000000000000000000000000aa"),
                Some("USDT"),
                Some(Decimal::from(25)),
            ))
            .await;
        let router = build_router(app.state);
        let body = r#"{"depositId": "dep-1", "status": "COMPLETED", "amount": "30000", "currency": "RWF"}"#;

        for _ in 0..2 {
            let response = router.clone().oneshot(callback(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let ack: CallbackAck = body_json(response).await;
            assert_eq!(ack, CallbackAck::RECEIVED);
        }

        assert_eq!(app.transfer.orders().await.len(), 1);
        let purchase = app.store.purchase("dep-1").await.unwrap().unwrap();
        assert_eq!(purchase.status, PurchaseStatus::Completed);
    }

    #[tokio::test]
    async fn test_deposit_callback_funds_escrow() {
        let app = test_app(PayoutBehavior::Ambiguous);
        let escrow = fiat_escrow("dep-2", EscrowStatus::Created);
        let escrow_id = escrow.escrow_id;
        app.store.insert_escrow(escrow).await;

        let response = build_router(app.state)
            .oneshot(callback(
                r#"{"depositId": "dep-2", "status": "COMPLETED", "amount": 10000}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let escrow = app.store.escrow(escrow_id).await.unwrap().unwrap();
        assert_eq!(escrow.status, EscrowStatus::Funded);
        assert_eq!(escrow.fiat_amount_paid, Some(Decimal::from(10000)));
        assert_eq!(escrow.fiat_currency_paid.as_deref(), Some("RWF"));
    }

    #[tokio::test]
    async fn test_unmatched_callback_is_acknowledged() {
        let app = test_app(PayoutBehavior::Ambiguous);
        let response = build_router(app.state)
            .oneshot(callback(r#"{"payoutId": "unknown", "status": "FAILED"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_numeric_deposit_id_is_reconciled() {
        let app = test_app(PayoutBehavior::Ambiguous);
        let escrow = fiat_escrow("40017", EscrowStatus::Created);
        let escrow_id = escrow.escrow_id;
        app.store.insert_escrow(escrow).await;

        let response = build_router(app.state)
            .oneshot(callback(r#"{"depositId": 40017, "status": "COMPLETED"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let ack: CallbackAck = body_json(response).await;
        assert_eq!(ack, CallbackAck::RECEIVED);

        let escrow = app.store.escrow(escrow_id).await.unwrap().unwrap();
        assert_eq!(escrow.status, EscrowStatus::Funded);
    }

    #[tokio::test]
    async fn test_wrongly_typed_fields_are_acknowledged() {
        let app = test_app(PayoutBehavior::Ambiguous);
        let response = build_router(app.state)
            .oneshot(callback(r#"{"depositId": true, "status": ["COMPLETED"]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let app = test_app(PayoutBehavior::Ambiguous);
        let response = build_router(app.state)
            .oneshot(callback("{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_other_methods_are_405() {
        let app = test_app(PayoutBehavior::Ambiguous);
        let response = build_router(app.state)
            .oneshot(
                Request::get("/callbacks/pawapay")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
