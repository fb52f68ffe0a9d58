use crate::entities::RaffleStatus;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Raffle {
    pub id: Uuid,
    pub name: String,
    pub status: RaffleStatus,
    pub registration_start: time::OffsetDateTime,
    pub registration_end: time::OffsetDateTime,
    pub draw_at: time::OffsetDateTime,
    /// Distinct users allowed to hold tickets in this raffle. `None` is unlimited.
    pub max_participants: Option<i32>,
    pub min_tickets_to_participate: i32,
    pub allow_multiple_wins: bool,
    /// Hex SHA-256 of the draw reveal, fixed on activation.
    pub seed_commitment: Option<String>,
    pub draw_seed: Option<i64>,
    pub completed_at: Option<time::OffsetDateTime>,
}

impl Raffle {
    /// Whether `at` falls inside the registration window.
    pub fn accepts_registration_at(&self, at: time::OffsetDateTime) -> bool {
        self.status == RaffleStatus::Active
            && at >= self.registration_start
            && at < self.registration_end
    }

    /// Whether the scheduler should attempt a draw at `now`.
    pub fn is_due_at(&self, now: time::OffsetDateTime) -> bool {
        self.status == RaffleStatus::Active && now >= self.draw_at && now >= self.registration_end
    }
}

pub(crate) const RAFFLE_COLUMNS: &str = "id, name, status, registration_start, registration_end, \
    draw_at, max_participants, min_tickets_to_participate, allow_multiple_wins, \
    seed_commitment, draw_seed, completed_at";

#[derive(Debug, Clone)]
pub struct GetRaffleById {
    pub raffle_id: Uuid,
}

impl Processor<GetRaffleById> for DatabaseProcessor {
    type Output = Option<Raffle>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetRaffleById")]
    async fn process(&self, query: GetRaffleById) -> Result<Option<Raffle>, sqlx::Error> {
        sqlx::query_as::<_, Raffle>(&format!(
            "SELECT {RAFFLE_COLUMNS} FROM raffles WHERE id = $1"
        ))
        .bind(query.raffle_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// ACTIVE raffles whose draw time and registration end have both passed.
pub struct GetDueRaffles {
    pub now: time::OffsetDateTime,
}

impl Processor<GetDueRaffles> for DatabaseProcessor {
    type Output = Vec<Raffle>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetDueRaffles")]
    async fn process(&self, query: GetDueRaffles) -> Result<Vec<Raffle>, sqlx::Error> {
        sqlx::query_as::<_, Raffle>(&format!(
            r#"
            SELECT {RAFFLE_COLUMNS}
            FROM raffles
            WHERE status = 'active' AND draw_at <= $1 AND registration_end <= $1
            ORDER BY draw_at ASC
            "#
        ))
        .bind(query.now)
        .fetch_all(&self.pool)
        .await
    }
}

impl Raffle {
    /// Lock a raffle row for the rest of the transaction.
    pub async fn lock_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        raffle_id: Uuid,
    ) -> Result<Option<Raffle>, sqlx::Error> {
        sqlx::query_as::<_, Raffle>(&format!(
            "SELECT {RAFFLE_COLUMNS} FROM raffles WHERE id = $1 FOR UPDATE"
        ))
        .bind(raffle_id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// The raffle new tickets generated at `at` should join, locked.
    ///
    /// Picks the ACTIVE raffle with the earliest draw whose registration window
    /// contains `at`.
    pub async fn lock_open_for_registration_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        at: time::OffsetDateTime,
    ) -> Result<Option<Raffle>, sqlx::Error> {
        sqlx::query_as::<_, Raffle>(&format!(
            r#"
            SELECT {RAFFLE_COLUMNS}
            FROM raffles
            WHERE status = 'active' AND registration_start <= $1 AND registration_end > $1
            ORDER BY draw_at ASC, id ASC
            LIMIT 1
            FOR UPDATE
            "#
        ))
        .bind(at)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Compare-and-set the status. Returns `false` if the row was not in `from`.
    pub async fn update_status_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        raffle_id: Uuid,
        from: RaffleStatus,
        to: RaffleStatus,
        seed_commitment: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE raffles
            SET status = $3, seed_commitment = COALESCE($4, seed_commitment)
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(raffle_id)
        .bind(from)
        .bind(to)
        .bind(seed_commitment)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// ACTIVE -> COMPLETED, recording the seed the draw used.
    pub async fn complete_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        raffle_id: Uuid,
        draw_seed: i64,
        completed_at: time::OffsetDateTime,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE raffles
            SET status = 'completed', draw_seed = $2, completed_at = $3
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(raffle_id)
        .bind(draw_seed)
        .bind(completed_at)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn raffle() -> Raffle {
        Raffle {
            id: Uuid::now_v7(),
            name: "Monthly".to_string(),
            status: RaffleStatus::Active,
            registration_start: datetime!(2026-01-01 00:00 UTC),
            registration_end: datetime!(2026-01-31 00:00 UTC),
            draw_at: datetime!(2026-02-01 12:00 UTC),
            max_participants: None,
            min_tickets_to_participate: 1,
            allow_multiple_wins: false,
            seed_commitment: None,
            draw_seed: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_registration_window_is_half_open() {
        let r = raffle();
        assert!(r.accepts_registration_at(datetime!(2026-01-01 00:00 UTC)));
        assert!(r.accepts_registration_at(datetime!(2026-01-30 23:59 UTC)));
        assert!(!r.accepts_registration_at(datetime!(2026-01-31 00:00 UTC)));
    }

    #[test]
    fn test_due_requires_active_and_draw_time() {
        let mut r = raffle();
        assert!(!r.is_due_at(datetime!(2026-02-01 11:59 UTC)));
        assert!(r.is_due_at(datetime!(2026-02-01 12:00 UTC)));
        r.status = RaffleStatus::Paused;
        assert!(!r.is_due_at(datetime!(2026-02-02 00:00 UTC)));
    }
}
