//! Coupons as seen by the redemption pipeline.
//!
//! Coupon CRUD belongs to the campaign service; this side only reads.

use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Coupon {
    pub id: Uuid,
    /// Coupons issued to a specific user may only be redeemed by that user.
    pub owner_user_id: Option<Uuid>,
    pub active: bool,
    pub expires_at: Option<time::OffsetDateTime>,
    pub tickets_per_redemption: i32,
}

impl Coupon {
    /// Whether the coupon has expired at `now`.
    pub fn is_expired_at(&self, now: time::OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Debug, Clone)]
pub struct GetCouponById {
    pub coupon_id: Uuid,
}

impl Processor<GetCouponById> for DatabaseProcessor {
    type Output = Option<Coupon>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetCouponById")]
    async fn process(&self, query: GetCouponById) -> Result<Option<Coupon>, sqlx::Error> {
        sqlx::query_as::<_, Coupon>(
            r#"
            SELECT id, owner_user_id, active, expires_at, tickets_per_redemption
            FROM coupons
            WHERE id = $1
            "#,
        )
        .bind(query.coupon_id)
        .fetch_optional(&self.pool)
        .await
    }
}
