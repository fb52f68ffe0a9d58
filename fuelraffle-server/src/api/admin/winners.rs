use axum::{
    Json,
    extract::{Path, State},
};
use fuelraffle_sdk::objects::{DisqualifyRequest, WinnerResponse};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::extractors::AdminAuth;
use crate::api::winner_to_response;
use crate::state::AppState;

/// `POST /winners/{winner_id}/disqualify`: terminal; needs a reason.
pub async fn disqualify(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(winner_id): Path<Uuid>,
    Json(request): Json<DisqualifyRequest>,
) -> Result<Json<WinnerResponse>, ApiError> {
    let winner = state
        .claims
        .disqualify(
            winner_id,
            &request.reason,
            &request.decided_by,
            OffsetDateTime::now_utc(),
        )
        .await?;
    Ok(Json(winner_to_response(&winner)))
}
