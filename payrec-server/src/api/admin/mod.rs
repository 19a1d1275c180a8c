//! Admin API handlers.
//!
//! These endpoints are for operators and require the
//! `Payrec-Admin-Authorization` header with the plaintext admin secret.
//!
//! # Endpoints
//!
//! - `GET  /purchases/{deposit_id}`      – purchase state
//! - `GET  /escrows/{escrow_id}`         – escrow state with payout fields
//! - `POST /escrows/{escrow_id}/payout`  – retry the seller payout

use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use payrec_core::entities::{Escrow, Purchase};
use payrec_core::processors::ReconcileError;
use payrec_core::store::StoreError;
use payrec_sdk::objects::{EscrowResponse, PurchaseResponse};
use time::PrimitiveDateTime;

use crate::state::AppState;

mod get_escrow;
mod get_purchase;
mod trigger_payout;

/// Build the Admin API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/purchases/{deposit_id}", get(get_purchase::get_purchase))
        .route("/escrows/{escrow_id}", get(get_escrow::get_escrow))
        .route(
            "/escrows/{escrow_id}/payout",
            post(trigger_payout::trigger_payout),
        )
}

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

/// Errors that can occur in Admin API handlers.
#[derive(Debug)]
pub(crate) enum AdminApiError {
    Store(StoreError),
    NotFound,
}

impl From<StoreError> for AdminApiError {
    fn from(e: StoreError) -> Self {
        AdminApiError::Store(e)
    }
}

impl From<ReconcileError> for AdminApiError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::Store(e) => AdminApiError::Store(e),
        }
    }
}

impl IntoResponse for AdminApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AdminApiError::Store(e) => {
                tracing::error!(error = %e, "Admin API store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            AdminApiError::NotFound => {
                (StatusCode::NOT_FOUND, "resource not found").into_response()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

fn unix(t: PrimitiveDateTime) -> i64 {
    t.assume_utc().unix_timestamp()
}

pub(crate) fn purchase_to_response(p: &Purchase) -> PurchaseResponse {
    PurchaseResponse {
        deposit_id: p.deposit_id.clone(),
        wallet_address: p.wallet_address.clone(),
        token: p.token.clone(),
        crypto_amount: p.crypto_amount,
        status: p.status.into(),
        tx_hash: p.tx_hash.clone(),
        error: p.error.clone(),
        created_at: unix(p.created_at),
        claimed_at: p.claimed_at.map(unix),
        submitted_at: p.submitted_at.map(unix),
        completed_at: p.completed_at.map(unix),
        failed_at: p.failed_at.map(unix),
    }
}

pub(crate) fn escrow_to_response(e: &Escrow) -> EscrowResponse {
    EscrowResponse {
        escrow_id: e.escrow_id.to_string(),
        payment_type: e.payment_type.into(),
        status: e.status.into(),
        deposit_id: e.deposit_id.clone(),
        amount: e.amount,
        fiat_currency: e.fiat_currency.clone(),
        fiat_amount_paid: e.fiat_amount_paid,
        fiat_currency_paid: e.fiat_currency_paid.clone(),
        seller_phone: e.seller_phone.clone(),
        seller_provider: e.seller_provider.clone(),
        payout_id: e.payout_id.clone(),
        payout_request_id: e.payout_request_id.map(|id| id.to_string()),
        payout_status: e.payout_status.map(Into::into),
        payout_error: e.payout_error.clone(),
        funded_at: e.funded_at.map(unix),
        payout_claimed_at: e.payout_claimed_at.map(unix),
        payout_initiated_at: e.payout_initiated_at.map(unix),
        payout_attempted_at: e.payout_attempted_at.map(unix),
        payout_updated_at: e.payout_updated_at.map(unix),
    }
}
