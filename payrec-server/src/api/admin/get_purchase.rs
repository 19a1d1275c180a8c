use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::{AdminApiError, purchase_to_response};

/// `GET /purchases/{deposit_id}`: purchase state, including the transfer
/// hash or the recorded error.
pub async fn get_purchase(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(deposit_id): Path<String>,
) -> Result<impl IntoResponse, AdminApiError> {
    let purchase = state
        .store
        .purchase(&deposit_id)
        .await?
        .ok_or(AdminApiError::NotFound)?;

    Ok(Json(purchase_to_response(&purchase)))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use payrec_core::testkit::{PayoutBehavior, pending_purchase};
    use payrec_sdk::objects::{PurchaseResponse, PurchaseStatus};
    use rust_decimal::Decimal;
    use tower::ServiceExt;

    use super::super::tests::{admin_request, body_json, test_app};
    use crate::server::build_router;

    #[tokio::test]
    async fn test_returns_purchase() {
        let app = test_app(PayoutBehavior::Ambiguous);
        app.store
            .insert_purchase(pending_purchase(
                "dep-1",
                Some("0x00000000000000000000000000000000000000aa"),
                Some("USDT"),
                Some(Decimal::new(125, 1)),
            ))
            .await;

        let response = build_router(app.state)
            .oneshot(admin_request("GET", "/admin/purchases/dep-1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let purchase: PurchaseResponse = body_json(response).await;
        assert_eq!(purchase.deposit_id, "dep-1");
        assert_eq!(purchase.status, PurchaseStatus::Pending);
        assert_eq!(purchase.crypto_amount, Some(Decimal::new(125, 1)));
    }

    #[tokio::test]
    async fn test_unknown_purchase_is_404() {
        let app = test_app(PayoutBehavior::Ambiguous);
        let response = build_router(app.state)
            .oneshot(admin_request("GET", "/admin/purchases/nope"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_requires_admin_secret() {
        let app = test_app(PayoutBehavior::Ambiguous);
        let router = build_router(app.state);

        let missing = Request::get("/admin/purchases/dep-1")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(missing).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let wrong = Request::get("/admin/purchases/dep-1")
            .header(payrec_sdk::objects::ADMIN_AUTH_HEADER, "guess")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(wrong).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
