use crate::entities::WinnerStatus;
use crate::framework::DatabaseProcessor;
use fuelraffle_sdk::objects::DeliveryStatus;
use kanau::processor::Processor;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// One append-only entry of a winner's delivery log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryEntry {
    Info {
        recipient: String,
        address: String,
        method: String,
        tracking_reference: Option<String>,
        at: i64,
    },
    Status {
        status: DeliveryStatus,
        note: Option<String>,
        at: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RaffleWinner {
    pub id: Uuid,
    pub raffle_id: Uuid,
    pub user_id: Uuid,
    pub ticket_id: Uuid,
    pub prize_id: Uuid,
    pub status: WinnerStatus,
    pub won_at: time::OffsetDateTime,
    pub claim_deadline: time::OffsetDateTime,
    pub is_verified: bool,
    pub verified_by: Option<String>,
    pub verified_at: Option<time::OffsetDateTime>,
    pub identity_document_ref: Option<String>,
    pub claimed_at: Option<time::OffsetDateTime>,
    pub processed_by: Option<String>,
    pub disqualification_reason: Option<String>,
    #[sqlx(json)]
    pub delivery_log: Vec<DeliveryEntry>,
    pub updated_at: time::OffsetDateTime,
}

impl RaffleWinner {
    /// A fresh PENDING_CLAIM winner.
    pub fn pending(
        raffle_id: Uuid,
        user_id: Uuid,
        ticket_id: Uuid,
        prize_id: Uuid,
        won_at: time::OffsetDateTime,
        claim_deadline: time::OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            raffle_id,
            user_id,
            ticket_id,
            prize_id,
            status: WinnerStatus::PendingClaim,
            won_at,
            claim_deadline,
            is_verified: false,
            verified_by: None,
            verified_at: None,
            identity_document_ref: None,
            claimed_at: None,
            processed_by: None,
            disqualification_reason: None,
            delivery_log: Vec::new(),
            updated_at: won_at,
        }
    }

    /// Whether delivery information has been recorded.
    pub fn has_delivery_info(&self) -> bool {
        self.delivery_log
            .iter()
            .any(|entry| matches!(entry, DeliveryEntry::Info { .. }))
    }
}

const WINNER_COLUMNS: &str = "id, raffle_id, user_id, ticket_id, prize_id, status, won_at, \
    claim_deadline, is_verified, verified_by, verified_at, identity_document_ref, claimed_at, \
    processed_by, disqualification_reason, delivery_log, updated_at";

#[derive(Debug, Clone)]
pub struct GetWinnerById {
    pub winner_id: Uuid,
}

impl Processor<GetWinnerById> for DatabaseProcessor {
    type Output = Option<RaffleWinner>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetWinnerById")]
    async fn process(&self, query: GetWinnerById) -> Result<Option<RaffleWinner>, sqlx::Error> {
        sqlx::query_as::<_, RaffleWinner>(&format!(
            "SELECT {WINNER_COLUMNS} FROM raffle_winners WHERE id = $1"
        ))
        .bind(query.winner_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// PENDING_CLAIM winners whose claim deadline has passed.
pub struct ListOverdueWinners {
    pub now: time::OffsetDateTime,
    pub limit: i64,
}

impl Processor<ListOverdueWinners> for DatabaseProcessor {
    type Output = Vec<RaffleWinner>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListOverdueWinners")]
    async fn process(&self, query: ListOverdueWinners) -> Result<Vec<RaffleWinner>, sqlx::Error> {
        sqlx::query_as::<_, RaffleWinner>(&format!(
            r#"
            SELECT {WINNER_COLUMNS}
            FROM raffle_winners
            WHERE status = 'pending_claim' AND claim_deadline <= $1
            ORDER BY claim_deadline ASC
            LIMIT $2
            "#
        ))
        .bind(query.now)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
    }
}

impl RaffleWinner {
    /// Insert winners created by a draw.
    ///
    /// The unique constraints on (ticket_id, prize_id) and (ticket_id, raffle_id)
    /// reject a second draw of the same ticket.
    pub async fn insert_many_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        winners: &[RaffleWinner],
    ) -> Result<u64, sqlx::Error> {
        if winners.is_empty() {
            return Ok(0);
        }

        let mut query_builder = sqlx::QueryBuilder::new(
            "INSERT INTO raffle_winners \
            (id, raffle_id, user_id, ticket_id, prize_id, status, won_at, claim_deadline, \
            is_verified, delivery_log, updated_at) ",
        );

        query_builder.push_values(winners, |mut b, winner| {
            b.push_bind(winner.id)
                .push_bind(winner.raffle_id)
                .push_bind(winner.user_id)
                .push_bind(winner.ticket_id)
                .push_bind(winner.prize_id)
                .push_bind(winner.status)
                .push_bind(winner.won_at)
                .push_bind(winner.claim_deadline)
                .push_bind(winner.is_verified)
                .push_bind(Json(winner.delivery_log.clone()))
                .push_bind(winner.updated_at);
        });

        let result = query_builder.build().execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }

    /// Persist a transitioned winner if its stored status is still `expected`.
    pub async fn compare_and_set(
        pool: &sqlx::PgPool,
        winner: &RaffleWinner,
        expected: WinnerStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE raffle_winners
            SET status = $3,
                is_verified = $4,
                verified_by = $5,
                verified_at = $6,
                identity_document_ref = $7,
                claimed_at = $8,
                processed_by = $9,
                disqualification_reason = $10,
                delivery_log = $11,
                updated_at = $12
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(winner.id)
        .bind(expected)
        .bind(winner.status)
        .bind(winner.is_verified)
        .bind(&winner.verified_by)
        .bind(winner.verified_at)
        .bind(&winner.identity_document_ref)
        .bind(winner.claimed_at)
        .bind(&winner.processed_by)
        .bind(&winner.disqualification_reason)
        .bind(Json(&winner.delivery_log))
        .bind(winner.updated_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
