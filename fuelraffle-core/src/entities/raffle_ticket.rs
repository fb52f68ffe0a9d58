use crate::entities::{TicketSource, TicketStatus};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

/// Counter scope used for tickets that are not assigned to a raffle yet.
pub const UNASSIGNED_SCOPE: Uuid = Uuid::nil();

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RaffleTicket {
    pub id: Uuid,
    pub user_id: Uuid,
    pub raffle_id: Option<Uuid>,
    /// Unique within `raffle_id` (unassigned tickets share one numbering).
    pub ticket_number: i64,
    pub status: TicketStatus,
    pub source_type: TicketSource,
    pub source_event_id: String,
    pub batch_id: Uuid,
    pub generated_at: time::OffsetDateTime,
}

/// The idempotent-inbox row: one per (source_type, source_event_id).
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TicketBatch {
    pub id: Uuid,
    pub source_type: TicketSource,
    pub source_event_id: String,
    pub user_id: Uuid,
    pub raffle_id: Option<Uuid>,
    pub ticket_count: i32,
    pub created_at: time::OffsetDateTime,
}

const TICKET_COLUMNS: &str = "id, user_id, raffle_id, ticket_number, status, source_type, \
    source_event_id, batch_id, generated_at";

#[derive(Debug, Clone)]
/// Count a user's ACTIVE tickets across all raffles.
pub struct GetActiveTicketBalance {
    pub user_id: Uuid,
}

impl Processor<GetActiveTicketBalance> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetActiveTicketBalance")]
    async fn process(&self, query: GetActiveTicketBalance) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM raffle_tickets WHERE user_id = $1 AND status = 'active'",
        )
        .bind(query.user_id)
        .fetch_one(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Snapshot of ACTIVE tickets in a raffle, ordered by ticket number.
pub struct GetActiveTicketsForRaffle {
    pub raffle_id: Uuid,
}

impl Processor<GetActiveTicketsForRaffle> for DatabaseProcessor {
    type Output = Vec<RaffleTicket>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetActiveTicketsForRaffle")]
    async fn process(
        &self,
        query: GetActiveTicketsForRaffle,
    ) -> Result<Vec<RaffleTicket>, sqlx::Error> {
        sqlx::query_as::<_, RaffleTicket>(&format!(
            r#"
            SELECT {TICKET_COLUMNS}
            FROM raffle_tickets
            WHERE raffle_id = $1 AND status = 'active'
            ORDER BY ticket_number ASC
            "#
        ))
        .bind(query.raffle_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Expire ACTIVE tickets generated before `cutoff` or left over in completed raffles.
pub struct ExpireTickets {
    pub cutoff: time::OffsetDateTime,
}

impl Processor<ExpireTickets> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ExpireTickets")]
    async fn process(&self, cmd: ExpireTickets) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE raffle_tickets AS t
            SET status = 'expired'
            WHERE t.status = 'active'
              AND (
                t.generated_at < $1
                OR EXISTS (
                    SELECT 1 FROM raffles r
                    WHERE r.id = t.raffle_id AND r.status = 'completed'
                )
              )
            "#,
        )
        .bind(cmd.cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

impl RaffleTicket {
    /// Record the inbox row for a source event.
    ///
    /// Returns `false` if the event was already handled.
    pub async fn insert_batch_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        batch: &TicketBatch,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO ticket_batches
            (id, source_type, source_event_id, user_id, raffle_id, ticket_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_type, source_event_id) DO NOTHING
            "#,
        )
        .bind(batch.id)
        .bind(batch.source_type)
        .bind(&batch.source_event_id)
        .bind(batch.user_id)
        .bind(batch.raffle_id)
        .bind(batch.ticket_count)
        .bind(batch.created_at)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Reserve `count` consecutive ticket numbers in a scope and return the first.
    ///
    /// The counter row is locked by the upsert until the transaction ends, which
    /// serializes concurrent grants into the same raffle.
    pub async fn allocate_numbers_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        raffle_id: Option<Uuid>,
        count: i64,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO ticket_number_counters (scope, next_number)
            VALUES ($1, $2 + 1)
            ON CONFLICT (scope) DO UPDATE
            SET next_number = ticket_number_counters.next_number + $2
            RETURNING next_number - $2
            "#,
        )
        .bind(raffle_id.unwrap_or(UNASSIGNED_SCOPE))
        .bind(count)
        .fetch_one(&mut **tx)
        .await
    }

    /// Insert many tickets in one statement.
    ///
    /// A ticket number collision aborts the statement with a unique violation.
    pub async fn insert_many_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        tickets: &[RaffleTicket],
    ) -> Result<u64, sqlx::Error> {
        if tickets.is_empty() {
            return Ok(0);
        }

        let mut query_builder = sqlx::QueryBuilder::new(
            "INSERT INTO raffle_tickets \
            (id, user_id, raffle_id, ticket_number, status, source_type, source_event_id, batch_id, generated_at) ",
        );

        query_builder.push_values(tickets, |mut b, ticket| {
            b.push_bind(ticket.id)
                .push_bind(ticket.user_id)
                .push_bind(ticket.raffle_id)
                .push_bind(ticket.ticket_number)
                .push_bind(ticket.status)
                .push_bind(ticket.source_type)
                .push_bind(ticket.source_event_id.clone())
                .push_bind(ticket.batch_id)
                .push_bind(ticket.generated_at);
        });

        let result = query_builder.build().execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }

    /// ACTIVE -> CONSUMED for the given tickets of one raffle.
    pub async fn consume_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        ticket_ids: &[Uuid],
        raffle_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE raffle_tickets
            SET status = 'consumed'
            WHERE id = ANY($1) AND raffle_id = $2 AND status = 'active'
            "#,
        )
        .bind(ticket_ids)
        .bind(raffle_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    /// Lock the tickets among `ticket_ids` that are ACTIVE in `raffle_id`.
    pub async fn lock_active_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        ticket_ids: &[Uuid],
        raffle_id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM raffle_tickets
            WHERE id = ANY($1) AND raffle_id = $2 AND status = 'active'
            FOR UPDATE
            "#,
        )
        .bind(ticket_ids)
        .bind(raffle_id)
        .fetch_all(&mut **tx)
        .await
    }

    /// CONSUMED -> WON for one ticket of one raffle.
    pub async fn mark_won_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        ticket_id: Uuid,
        raffle_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE raffle_tickets
            SET status = 'won'
            WHERE id = $1 AND raffle_id = $2 AND status = 'consumed'
            "#,
        )
        .bind(ticket_id)
        .bind(raffle_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    /// ACTIVE -> CANCELLED for every ticket of a cancelled raffle.
    pub async fn cancel_for_raffle_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        raffle_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE raffle_tickets SET status = 'cancelled' WHERE raffle_id = $1 AND status = 'active'",
        )
        .bind(raffle_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn is_participant_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        raffle_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM raffle_tickets WHERE raffle_id = $1 AND user_id = $2)",
        )
        .bind(raffle_id)
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn participant_count_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        raffle_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(DISTINCT user_id) FROM raffle_tickets WHERE raffle_id = $1",
        )
        .bind(raffle_id)
        .fetch_one(&mut **tx)
        .await
    }

    /// Lock a user's unassigned ACTIVE tickets, ordered by pool number.
    pub async fn lock_unassigned_for_user_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM raffle_tickets
            WHERE user_id = $1 AND raffle_id IS NULL AND status = 'active'
            ORDER BY ticket_number ASC
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut **tx)
        .await
    }

    /// Move tickets into a raffle with freshly allocated numbers.
    pub async fn assign_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        raffle_id: Uuid,
        ticket_ids: &[Uuid],
        ticket_numbers: &[i64],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE raffle_tickets AS t
            SET raffle_id = $1, ticket_number = u.ticket_number
            FROM UNNEST($2::uuid[], $3::bigint[]) AS u(id, ticket_number)
            WHERE t.id = u.id
            "#,
        )
        .bind(raffle_id)
        .bind(ticket_ids)
        .bind(ticket_numbers)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }
}
