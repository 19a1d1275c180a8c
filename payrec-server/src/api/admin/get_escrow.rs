use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::{AdminApiError, escrow_to_response};

/// `GET /escrows/{escrow_id}`: escrow state with payout bookkeeping.
pub async fn get_escrow(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(escrow_id): Path<Uuid>,
) -> Result<impl IntoResponse, AdminApiError> {
    let escrow = state
        .store
        .escrow(escrow_id)
        .await?
        .ok_or(AdminApiError::NotFound)?;

    Ok(Json(escrow_to_response(&escrow)))
}
