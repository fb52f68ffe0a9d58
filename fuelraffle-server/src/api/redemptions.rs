//! Coupon redemption.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use fuelraffle_core::processors::{RedeemCommand, RedemptionReceipt};
use fuelraffle_sdk::objects::{RedeemRequest, RedemptionOutcomeKind, RedemptionResponse};
use kanau::processor::Processor;
use time::OffsetDateTime;

use crate::api::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/redemptions", post(redeem))
}

fn to_response(receipt: &RedemptionReceipt) -> RedemptionResponse {
    let r = &receipt.redemption;
    RedemptionResponse {
        redemption_id: r.id,
        idempotency_key: r.idempotency_key.clone(),
        tickets_eligible: u32::try_from(r.tickets_eligible).unwrap_or(0),
        outcome: receipt.outcome,
        created_at: r.created_at.unix_timestamp(),
    }
}

/// `POST /redemptions`: redeem a coupon against a scanned QR token.
///
/// Responds `201` for a new redemption, `202` when it is stored but its event
/// is still waiting to be published, and `200` with the original record for a
/// rescan.
async fn redeem(
    State(state): State<AppState>,
    Json(request): Json<RedeemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state
        .redemptions
        .process(RedeemCommand {
            qr_content: request.qr_content,
            coupon_id: request.coupon_id,
            user_id: request.user_id,
            fuel_amount: request.fuel_amount,
            fuel_price: request.fuel_price,
            now: OffsetDateTime::now_utc(),
        })
        .await?;

    let status = match receipt.outcome {
        RedemptionOutcomeKind::Completed => StatusCode::CREATED,
        RedemptionOutcomeKind::NotificationPending => StatusCode::ACCEPTED,
        RedemptionOutcomeKind::Duplicate => StatusCode::OK,
    };
    Ok((status, Json(to_response(&receipt))))
}
