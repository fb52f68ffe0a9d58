//! Prize reference data. Read-only from the pipeline's point of view.

use crate::entities::PrizeDelivery;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Prize {
    pub id: Uuid,
    pub raffle_id: Uuid,
    pub name: String,
    /// 1 is the most valuable tier.
    pub tier: i32,
    pub quantity: i32,
    pub delivery: PrizeDelivery,
    pub requires_identity_verification: bool,
}

const PRIZE_COLUMNS: &str =
    "id, raffle_id, name, tier, quantity, delivery, requires_identity_verification";

#[derive(Debug, Clone)]
pub struct GetPrizesForRaffle {
    pub raffle_id: Uuid,
}

impl Processor<GetPrizesForRaffle> for DatabaseProcessor {
    type Output = Vec<Prize>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetPrizesForRaffle")]
    async fn process(&self, query: GetPrizesForRaffle) -> Result<Vec<Prize>, sqlx::Error> {
        sqlx::query_as::<_, Prize>(&format!(
            "SELECT {PRIZE_COLUMNS} FROM prizes WHERE raffle_id = $1 ORDER BY tier ASC, id ASC"
        ))
        .bind(query.raffle_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct GetPrizeById {
    pub prize_id: Uuid,
}

impl Processor<GetPrizeById> for DatabaseProcessor {
    type Output = Option<Prize>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetPrizeById")]
    async fn process(&self, query: GetPrizeById) -> Result<Option<Prize>, sqlx::Error> {
        sqlx::query_as::<_, Prize>(&format!("SELECT {PRIZE_COLUMNS} FROM prizes WHERE id = $1"))
            .bind(query.prize_id)
            .fetch_optional(&self.pool)
            .await
    }
}
