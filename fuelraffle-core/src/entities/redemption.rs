use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use uuid::Uuid;

/// An immutable redemption audit record.
///
/// `published_at` and `publish_attempts` are outbox bookkeeping for the
/// `redemption.completed` event, not part of the business record.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Redemption {
    pub id: Uuid,
    pub idempotency_key: String,
    pub coupon_id: Uuid,
    pub station_id: Uuid,
    pub dispenser_id: Uuid,
    pub user_id: Uuid,
    pub fuel_amount: Decimal,
    pub fuel_price: Decimal,
    pub tickets_eligible: i32,
    pub token_issued_at: time::OffsetDateTime,
    pub created_at: time::OffsetDateTime,
    pub published_at: Option<time::OffsetDateTime>,
    pub publish_attempts: i32,
}

/// Data for inserting a new redemption.
#[derive(Debug, Clone)]
pub struct NewRedemption {
    pub id: Uuid,
    pub idempotency_key: String,
    pub coupon_id: Uuid,
    pub station_id: Uuid,
    pub dispenser_id: Uuid,
    pub user_id: Uuid,
    pub fuel_amount: Decimal,
    pub fuel_price: Decimal,
    pub tickets_eligible: i32,
    pub token_issued_at: time::OffsetDateTime,
    pub created_at: time::OffsetDateTime,
}

impl NewRedemption {
    pub fn into_record(self) -> Redemption {
        Redemption {
            id: self.id,
            idempotency_key: self.idempotency_key,
            coupon_id: self.coupon_id,
            station_id: self.station_id,
            dispenser_id: self.dispenser_id,
            user_id: self.user_id,
            fuel_amount: self.fuel_amount,
            fuel_price: self.fuel_price,
            tickets_eligible: self.tickets_eligible,
            token_issued_at: self.token_issued_at,
            created_at: self.created_at,
            published_at: None,
            publish_attempts: 0,
        }
    }
}

/// A void record superseding a redemption.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RedemptionVoid {
    pub id: Uuid,
    pub redemption_id: Uuid,
    pub reason: String,
    pub voided_by: String,
    pub voided_at: time::OffsetDateTime,
}

const REDEMPTION_COLUMNS: &str = "id, idempotency_key, coupon_id, station_id, dispenser_id, \
    user_id, fuel_amount, fuel_price, tickets_eligible, token_issued_at, created_at, \
    published_at, publish_attempts";

#[derive(Debug, Clone)]
pub struct GetRedemptionByKey {
    pub idempotency_key: String,
}

impl Processor<GetRedemptionByKey> for DatabaseProcessor {
    type Output = Option<Redemption>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetRedemptionByKey")]
    async fn process(&self, query: GetRedemptionByKey) -> Result<Option<Redemption>, sqlx::Error> {
        sqlx::query_as::<_, Redemption>(&format!(
            "SELECT {REDEMPTION_COLUMNS} FROM redemptions WHERE idempotency_key = $1"
        ))
        .bind(query.idempotency_key)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Committed redemptions whose event has not been published yet, oldest first.
///
/// Rows that already failed `max_attempts` times are left for manual reconciliation.
pub struct ListUnpublishedRedemptions {
    pub limit: i64,
    pub max_attempts: i32,
}

impl Processor<ListUnpublishedRedemptions> for DatabaseProcessor {
    type Output = Vec<Redemption>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListUnpublishedRedemptions")]
    async fn process(
        &self,
        query: ListUnpublishedRedemptions,
    ) -> Result<Vec<Redemption>, sqlx::Error> {
        sqlx::query_as::<_, Redemption>(&format!(
            r#"
            SELECT {REDEMPTION_COLUMNS}
            FROM redemptions
            WHERE published_at IS NULL AND publish_attempts < $2
            ORDER BY created_at ASC
            LIMIT $1
            "#
        ))
        .bind(query.limit)
        .bind(query.max_attempts)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct MarkRedemptionPublished {
    pub redemption_id: Uuid,
    pub published_at: time::OffsetDateTime,
}

impl Processor<MarkRedemptionPublished> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:MarkRedemptionPublished")]
    async fn process(&self, cmd: MarkRedemptionPublished) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE redemptions
            SET published_at = $2, publish_attempts = publish_attempts + 1
            WHERE id = $1 AND published_at IS NULL
            "#,
        )
        .bind(cmd.redemption_id)
        .bind(cmd.published_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
pub struct RecordRedemptionPublishFailure {
    pub redemption_id: Uuid,
}

impl Processor<RecordRedemptionPublishFailure> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:RecordRedemptionPublishFailure")]
    async fn process(&self, cmd: RecordRedemptionPublishFailure) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE redemptions
            SET publish_attempts = publish_attempts + 1
            WHERE id = $1 AND published_at IS NULL
            "#,
        )
        .bind(cmd.redemption_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

impl Redemption {
    /// Insert a redemption unless its idempotency key exists.
    ///
    /// Returns `None` when another request with the same key got there first.
    pub async fn insert_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        new: &NewRedemption,
    ) -> Result<Option<Redemption>, sqlx::Error> {
        sqlx::query_as::<_, Redemption>(&format!(
            r#"
            INSERT INTO redemptions
            (id, idempotency_key, coupon_id, station_id, dispenser_id, user_id,
             fuel_amount, fuel_price, tickets_eligible, token_issued_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (idempotency_key) DO NOTHING
            RETURNING {REDEMPTION_COLUMNS}
            "#
        ))
        .bind(new.id)
        .bind(&new.idempotency_key)
        .bind(new.coupon_id)
        .bind(new.station_id)
        .bind(new.dispenser_id)
        .bind(new.user_id)
        .bind(new.fuel_amount)
        .bind(new.fuel_price)
        .bind(new.tickets_eligible)
        .bind(new.token_issued_at)
        .bind(new.created_at)
        .fetch_optional(&mut **tx)
        .await
    }

    pub async fn lock_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        redemption_id: Uuid,
    ) -> Result<Option<Redemption>, sqlx::Error> {
        sqlx::query_as::<_, Redemption>(&format!(
            "SELECT {REDEMPTION_COLUMNS} FROM redemptions WHERE id = $1 FOR UPDATE"
        ))
        .bind(redemption_id)
        .fetch_optional(&mut **tx)
        .await
    }

    pub async fn is_voided_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        redemption_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM redemption_voids WHERE redemption_id = $1)",
        )
        .bind(redemption_id)
        .fetch_one(&mut **tx)
        .await
    }

    /// Bind a coupon to a redemption.
    ///
    /// Returns `false` if the coupon already backs a live redemption.
    pub async fn claim_coupon_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        coupon_id: Uuid,
        redemption_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO coupon_redemptions (coupon_id, redemption_id)
            VALUES ($1, $2)
            ON CONFLICT (coupon_id) DO NOTHING
            "#,
        )
        .bind(coupon_id)
        .bind(redemption_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Append a void record and release the coupon it held.
    pub async fn void_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        void: &RedemptionVoid,
    ) -> Result<RedemptionVoid, sqlx::Error> {
        let record = sqlx::query_as::<_, RedemptionVoid>(
            r#"
            INSERT INTO redemption_voids (id, redemption_id, reason, voided_by, voided_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, redemption_id, reason, voided_by, voided_at
            "#,
        )
        .bind(void.id)
        .bind(void.redemption_id)
        .bind(&void.reason)
        .bind(&void.voided_by)
        .bind(void.voided_at)
        .fetch_one(&mut **tx)
        .await?;

        sqlx::query("DELETE FROM coupon_redemptions WHERE redemption_id = $1")
            .bind(void.redemption_id)
            .execute(&mut **tx)
            .await?;

        Ok(record)
    }
}
