use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use payrec_core::processors::{PayoutOutcome, SkipReason};
use payrec_sdk::objects::{PayoutTriggerOutcome, PayoutTriggerResponse};
use uuid::Uuid;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::{AdminApiError, escrow_to_response};

/// `POST /escrows/{escrow_id}/payout`: run the seller payout again.
///
/// Goes through the same guard and claim as a detected completion, so an
/// escrow that already has a payout, or one in flight, is left alone.
pub async fn trigger_payout(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(escrow_id): Path<Uuid>,
) -> Result<impl IntoResponse, AdminApiError> {
    let outcome = state.initiator.initiate(escrow_id).await?;
    tracing::info!(%escrow_id, ?outcome, "Manual payout trigger");

    let outcome = match outcome {
        PayoutOutcome::Skipped(SkipReason::NotFound) => return Err(AdminApiError::NotFound),
        PayoutOutcome::Initiated { .. } => PayoutTriggerOutcome::Initiated,
        PayoutOutcome::Skipped(_) => PayoutTriggerOutcome::Skipped,
        PayoutOutcome::InvalidInput { .. } => PayoutTriggerOutcome::InvalidInput,
        PayoutOutcome::Failed { .. } => PayoutTriggerOutcome::Failed,
        PayoutOutcome::Deferred => PayoutTriggerOutcome::Deferred,
    };

    let escrow = state
        .store
        .escrow(escrow_id)
        .await?
        .ok_or(AdminApiError::NotFound)?;

    Ok(Json(PayoutTriggerResponse {
        outcome,
        escrow: escrow_to_response(&escrow),
    }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;
    use payrec_core::config::ReconcilerConfig;
    use payrec_core::entities::{EscrowStatus, utc_now};
    use payrec_core::testkit::{PayoutBehavior, fiat_escrow};
    use payrec_sdk::objects::{PayoutTriggerOutcome, PayoutTriggerResponse};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::super::tests::{admin_request, body_json, test_app, test_app_with_config};
    use crate::server::build_router;

    #[tokio::test]
    async fn test_retries_failed_payout_once() {
        let app = test_app(PayoutBehavior::Accept {
            payout_id: Some("po-1".to_string()),
        });
        let mut escrow = fiat_escrow("dep-1", EscrowStatus::Completed);
        escrow.payout_error = Some("earlier failure".to_string());
        let escrow_id = escrow.escrow_id;
        app.store.insert_escrow(escrow).await;

        let router = build_router(app.state);
        let uri = format!("/admin/escrows/{escrow_id}/payout");

        let response = router
            .clone()
            .oneshot(admin_request("POST", &uri))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: PayoutTriggerResponse = body_json(response).await;
        assert_eq!(body.outcome, PayoutTriggerOutcome::Initiated);
        assert_eq!(body.escrow.payout_id.as_deref(), Some("po-1"));
        assert!(body.escrow.payout_error.is_none());

        let response = router.oneshot(admin_request("POST", &uri)).await.unwrap();
        let body: PayoutTriggerResponse = body_json(response).await;
        assert_eq!(body.outcome, PayoutTriggerOutcome::Skipped);
        assert_eq!(app.payout.commands().await.len(), 1);
    }

    #[tokio::test]
    async fn test_reports_rejection() {
        let app = test_app(PayoutBehavior::Reject("PAYOUTS_NOT_ALLOWED".to_string()));
        let escrow = fiat_escrow("dep-1", EscrowStatus::Completed);
        let escrow_id = escrow.escrow_id;
        app.store.insert_escrow(escrow).await;

        let response = build_router(app.state)
            .oneshot(admin_request(
                "POST",
                &format!("/admin/escrows/{escrow_id}/payout"),
            ))
            .await
            .unwrap();
        let body: PayoutTriggerResponse = body_json(response).await;
        assert_eq!(body.outcome, PayoutTriggerOutcome::Failed);
        assert!(body.escrow.payout_error.is_some());
        assert!(body.escrow.payout_id.is_none());
    }

    #[tokio::test]
    async fn test_not_completed_escrow_is_skipped() {
        let app = test_app(PayoutBehavior::Ambiguous);
        let escrow = fiat_escrow("dep-1", EscrowStatus::Funded);
        let escrow_id = escrow.escrow_id;
        app.store.insert_escrow(escrow).await;

        let response = build_router(app.state)
            .oneshot(admin_request(
                "POST",
                &format!("/admin/escrows/{escrow_id}/payout"),
            ))
            .await
            .unwrap();
        let body: PayoutTriggerResponse = body_json(response).await;
        assert_eq!(body.outcome, PayoutTriggerOutcome::Skipped);
        assert!(app.payout.commands().await.is_empty());
    }

    #[tokio::test]
    async fn test_recovers_payout_claim_left_by_crashed_worker() {
        let config = ReconcilerConfig {
            claim_lease: Duration::from_secs(60),
            ..ReconcilerConfig::default()
        };
        let app = test_app_with_config(
            PayoutBehavior::Accept {
                payout_id: Some("po-1".to_string()),
            },
            &config,
        );
        let mut live = fiat_escrow("dep-1", EscrowStatus::Completed);
        live.payout_claimed_at = Some(utc_now());
        let live_id = live.escrow_id;
        let mut stuck = fiat_escrow("dep-2", EscrowStatus::Completed);
        stuck.payout_claimed_at = Some(utc_now() - time::Duration::minutes(10));
        stuck.payout_request_id = Some(Uuid::new_v4());
        let stuck_id = stuck.escrow_id;
        let stuck_key = stuck.payout_request_id;
        app.store.insert_escrow(live).await;
        app.store.insert_escrow(stuck).await;
        let router = build_router(app.state);

        let response = router
            .clone()
            .oneshot(admin_request("POST", &format!("/admin/escrows/{live_id}/payout")))
            .await
            .unwrap();
        let body: PayoutTriggerResponse = body_json(response).await;
        assert_eq!(body.outcome, PayoutTriggerOutcome::Skipped);

        let response = router
            .oneshot(admin_request("POST", &format!("/admin/escrows/{stuck_id}/payout")))
            .await
            .unwrap();
        let body: PayoutTriggerResponse = body_json(response).await;
        assert_eq!(body.outcome, PayoutTriggerOutcome::Initiated);
        assert_eq!(body.escrow.payout_id.as_deref(), Some("po-1"));

        let commands = app.payout.commands().await;
        assert_eq!(commands.len(), 1);
        assert_eq!(Some(commands[0].request_id), stuck_key);
    }

    #[tokio::test]
    async fn test_unknown_escrow_is_404() {
        let app = test_app(PayoutBehavior::Ambiguous);
        let response = build_router(app.state)
            .oneshot(admin_request(
                "POST",
                &format!("/admin/escrows/{}/payout", Uuid::new_v4()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
