use axum::{
    Json,
    extract::{Path, State},
};
use fuelraffle_core::processors::VoidRedemption;
use fuelraffle_sdk::objects::{RedemptionVoidResponse, VoidRedemptionRequest};
use kanau::processor::Processor;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::extractors::AdminAuth;
use crate::state::AppState;

/// `POST /redemptions/{redemption_id}/void`: void a redemption so its coupon
/// can be redeemed again. The redemption record itself is kept.
pub async fn void_redemption(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(redemption_id): Path<Uuid>,
    Json(request): Json<VoidRedemptionRequest>,
) -> Result<Json<RedemptionVoidResponse>, ApiError> {
    let void = state
        .redemptions
        .process(VoidRedemption {
            redemption_id,
            reason: request.reason,
            voided_by: request.voided_by,
            now: OffsetDateTime::now_utc(),
        })
        .await?;

    Ok(Json(RedemptionVoidResponse {
        void_id: void.id,
        redemption_id: void.redemption_id,
        voided_at: void.voided_at.unix_timestamp(),
    }))
}
