//! Ad engagements, ticket balances and raffle entry.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use fuelraffle_core::events::PipelineEvent;
use fuelraffle_core::store::TicketLedger;
use fuelraffle_core::utils::ad_multiplier::{calculate_bonus_tickets, qualifies_for_rewards};
use fuelraffle_core::utils::idempotency::engagement_key;
use fuelraffle_sdk::objects::{
    AdEngagementCompletedPayload, JoinRaffleResponse, RecordEngagementRequest,
    RecordEngagementResponse, TicketBalanceResponse,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/engagements", post(record_engagement))
        .route("/users/{user_id}/tickets/balance", get(ticket_balance))
        .route("/users/{user_id}/raffles/{raffle_id}/join", post(join_raffle))
}

/// `POST /engagements`: turn a completed ad engagement into an
/// `ad.engagement.completed` event.
///
/// Engagements that do not qualify are acknowledged without publishing.
async fn record_engagement(
    State(state): State<AppState>,
    Json(request): Json<RecordEngagementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rewards = state.pipeline.read().await.ad_rewards.clone();
    if request.base_tickets > rewards.max_tickets_per_engagement {
        return Err(ApiError::BadRequest(format!(
            "base_tickets must be at most {}",
            rewards.max_tickets_per_engagement
        )));
    }
    let qualifies = qualifies_for_rewards(&rewards, &request.engagement);
    let bonus_tickets = if qualifies {
        calculate_bonus_tickets(&rewards, request.base_tickets, &request.engagement)
    } else {
        0
    };

    if qualifies {
        let event = PipelineEvent::AdEngagementCompleted(AdEngagementCompletedPayload {
            engagement_id: request.engagement_id,
            user_id: request.user_id,
            advertisement_id: request.advertisement_id,
            base_tickets: request.base_tickets,
            bonus_tickets,
            idempotency_key: engagement_key(request.engagement_id, request.user_id),
            occurred_at: OffsetDateTime::now_utc().unix_timestamp(),
            engagement: request.engagement,
        });
        state.publisher.publish(&event).await?;
        tracing::info!(
            engagement_id = %request.engagement_id,
            user_id = %request.user_id,
            base_tickets = request.base_tickets,
            bonus_tickets,
            "Ad engagement recorded"
        );
    } else {
        tracing::debug!(
            engagement_id = %request.engagement_id,
            "Ad engagement does not qualify for tickets"
        );
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(RecordEngagementResponse {
            qualifies,
            base_tickets: request.base_tickets,
            bonus_tickets,
        }),
    ))
}

/// `GET /users/{user_id}/tickets/balance`
async fn ticket_balance(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<TicketBalanceResponse>, ApiError> {
    let active_tickets = state.store.balance(user_id).await?;
    Ok(Json(TicketBalanceResponse {
        user_id,
        active_tickets,
    }))
}

/// `POST /users/{user_id}/raffles/{raffle_id}/join`: enter tickets that were
/// minted while no raffle had room for them.
async fn join_raffle(
    State(state): State<AppState>,
    Path((user_id, raffle_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<JoinRaffleResponse>, ApiError> {
    let tickets_moved = state
        .draws
        .join(user_id, raffle_id, OffsetDateTime::now_utc())
        .await?;
    Ok(Json(JoinRaffleResponse {
        user_id,
        raffle_id,
        tickets_moved,
    }))
}
