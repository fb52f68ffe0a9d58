//! DrawEngine and DrawScheduler.
//!
//! The engine owns the raffle lifecycle and the draw itself. A draw:
//! 1. checks the raffle is ACTIVE with its registration window closed
//! 2. recomputes the seed reveal (or takes an external one) and checks it
//!    against the commitment stored at activation
//! 3. snapshots the ACTIVE tickets and selects one ticket per prize unit
//! 4. commits tickets, winners and the COMPLETED status in one transaction
//! 5. publishes `raffle.winner.selected` per winner
//!
//! The scheduler runs the same draw for every raffle whose draw time has come.

use crate::config::{ConfigStore, PipelineConfig};
use crate::entities::RaffleStatus;
use crate::entities::raffle::Raffle;
use crate::entities::raffle_winner::RaffleWinner;
use crate::error::{EligibilityError, PipelineError};
use crate::events::{EventPublisher, PipelineEvent};
use crate::lifecycle::RaffleAction;
use crate::store::{DrawCommit, RaffleStore, RaffleTransition, TicketLedger};
use crate::utils::draw_selection::{
    Candidate, DrawRules, PrizeSlot, commitment, derive_reveal, derive_seed,
    eligible_participants, reveal_matches, select_winners,
};
use fuelraffle_sdk::objects::WinnerSelectedPayload;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A committed draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawOutcome {
    pub raffle_id: Uuid,
    pub seed: u64,
    /// ACTIVE tickets in the snapshot the winners were drawn from.
    pub eligible_tickets: usize,
    pub winners: Vec<RaffleWinner>,
}

pub struct DrawEngine<S: ?Sized> {
    store: Arc<S>,
    publisher: Arc<dyn EventPublisher>,
    config: ConfigStore<PipelineConfig>,
}

impl<S> DrawEngine<S>
where
    S: RaffleStore + TicketLedger + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        publisher: Arc<dyn EventPublisher>,
        config: ConfigStore<PipelineConfig>,
    ) -> Self {
        Self {
            store,
            publisher,
            config,
        }
    }

    async fn load(&self, raffle_id: Uuid) -> Result<Raffle, PipelineError> {
        self.store
            .raffle(raffle_id)
            .await?
            .ok_or(PipelineError::NotFound("raffle", raffle_id))
    }

    async fn seed_commitment(&self, raffle_id: Uuid) -> String {
        let config = self.config.read().await;
        commitment(&derive_reveal(config.draw.seed_secret_bytes(), raffle_id))
    }

    #[tracing::instrument(skip(self), err)]
    async fn apply(&self, raffle_id: Uuid, action: RaffleAction) -> Result<Raffle, PipelineError> {
        let raffle = self.load(raffle_id).await?;
        let to = action.apply(raffle.id, raffle.status)?;
        let seed_commitment = match (action, &raffle.seed_commitment) {
            (RaffleAction::Activate, None) => Some(self.seed_commitment(raffle.id).await),
            _ => None,
        };

        let updated = self
            .store
            .transition_raffle(RaffleTransition {
                raffle_id: raffle.id,
                from: raffle.status,
                to,
                seed_commitment,
            })
            .await?;
        info!(
            raffle_id = %updated.id,
            from = %raffle.status,
            to = %updated.status,
            "Raffle status changed"
        );
        Ok(updated)
    }

    /// DRAFT -> ACTIVE. Stores the seed commitment if the raffle has none.
    pub async fn activate(&self, raffle_id: Uuid) -> Result<Raffle, PipelineError> {
        self.apply(raffle_id, RaffleAction::Activate).await
    }

    pub async fn pause(&self, raffle_id: Uuid) -> Result<Raffle, PipelineError> {
        self.apply(raffle_id, RaffleAction::Pause).await
    }

    pub async fn resume(&self, raffle_id: Uuid) -> Result<Raffle, PipelineError> {
        self.apply(raffle_id, RaffleAction::Resume).await
    }

    /// Cancelling also cancels the raffle's ACTIVE tickets.
    pub async fn cancel(&self, raffle_id: Uuid) -> Result<Raffle, PipelineError> {
        self.apply(raffle_id, RaffleAction::Cancel).await
    }

    /// Move the user's unassigned ACTIVE tickets into `raffle_id`.
    ///
    /// Only allowed while the raffle's registration window is open. Returns
    /// how many tickets moved.
    pub async fn join(
        &self,
        user_id: Uuid,
        raffle_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<u64, PipelineError> {
        let raffle = self.load(raffle_id).await?;
        if raffle.status != RaffleStatus::Active {
            return Err(EligibilityError::RaffleNotActive {
                raffle_id,
                status: raffle.status,
            }
            .into());
        }
        if !raffle.accepts_registration_at(now) {
            return Err(EligibilityError::RegistrationClosed(raffle_id).into());
        }

        let moved = self.store.associate(user_id, raffle_id).await?;
        info!(%user_id, %raffle_id, moved, "User joined raffle");
        Ok(moved)
    }

    /// Draw winners for `raffle_id`.
    ///
    /// `reveal` comes from an external beacon when one is used; otherwise the
    /// reveal is derived from the configured seed secret.
    #[tracing::instrument(skip(self, reveal), err)]
    pub async fn draw(
        &self,
        raffle_id: Uuid,
        reveal: Option<Vec<u8>>,
        now: OffsetDateTime,
    ) -> Result<DrawOutcome, PipelineError> {
        let raffle = self.load(raffle_id).await?;
        match raffle.status {
            RaffleStatus::Active => {}
            RaffleStatus::Completed => {
                return Err(PipelineError::conflict(
                    "raffle",
                    raffle.id,
                    RaffleStatus::Completed,
                    RaffleStatus::Completed,
                ));
            }
            status => {
                return Err(EligibilityError::RaffleNotActive {
                    raffle_id: raffle.id,
                    status,
                }
                .into());
            }
        }
        if now < raffle.registration_end {
            return Err(EligibilityError::RegistrationOpen {
                raffle_id: raffle.id,
                closes_at: raffle.registration_end.unix_timestamp(),
            }
            .into());
        }

        let (secret_reveal, grace) = {
            let config = self.config.read().await;
            (
                derive_reveal(config.draw.seed_secret_bytes(), raffle.id).to_vec(),
                config.draw.claim_grace_period,
            )
        };
        let reveal = reveal.unwrap_or(secret_reveal);
        match &raffle.seed_commitment {
            Some(expected) if !reveal_matches(&reveal, expected) => {
                return Err(PipelineError::InvalidSeedReveal(raffle.id));
            }
            Some(_) => {}
            None => warn!(raffle_id = %raffle.id, "Raffle has no seed commitment"),
        }
        let seed = derive_seed(raffle.id, raffle.draw_at.unix_timestamp(), &reveal);

        let candidates: Vec<Candidate> = self
            .store
            .active_tickets(raffle.id)
            .await?
            .into_iter()
            .map(|t| Candidate {
                ticket_id: t.id,
                user_id: t.user_id,
                ticket_number: t.ticket_number,
            })
            .collect();
        let rules = DrawRules {
            allow_multiple_wins: raffle.allow_multiple_wins,
            min_tickets_to_participate: u32::try_from(raffle.min_tickets_to_participate)
                .unwrap_or(0),
        };
        if eligible_participants(&candidates, &rules) == 0 {
            return Err(EligibilityError::NoParticipants(raffle.id).into());
        }

        let prizes = self.store.prizes(raffle.id).await?;
        if prizes.is_empty() {
            return Err(PipelineError::InvalidInput(format!(
                "raffle {} has no prizes",
                raffle.id
            )));
        }
        let slots: Vec<PrizeSlot> = prizes
            .iter()
            .flat_map(|p| {
                let units = usize::try_from(p.quantity).unwrap_or(0);
                std::iter::repeat_n(
                    PrizeSlot {
                        prize_id: p.id,
                        tier: p.tier,
                    },
                    units,
                )
            })
            .collect();

        let winners: Vec<RaffleWinner> = select_winners(&candidates, &slots, &rules, seed)
            .into_iter()
            .map(|s| {
                RaffleWinner::pending(raffle.id, s.user_id, s.ticket_id, s.prize_id, now, now + grace)
            })
            .collect();
        debug!(
            raffle_id = %raffle.id,
            tickets = candidates.len(),
            slots = slots.len(),
            selected = winners.len(),
            "Winners selected, committing"
        );

        let winners = self
            .store
            .commit_draw(DrawCommit {
                raffle_id: raffle.id,
                seed,
                completed_at: now,
                winners,
            })
            .await?;
        info!(
            raffle_id = %raffle.id,
            seed,
            winners = winners.len(),
            "Raffle drawn"
        );

        for winner in &winners {
            let event = PipelineEvent::WinnerSelected(WinnerSelectedPayload {
                raffle_id: winner.raffle_id,
                winner_id: winner.id,
                user_id: winner.user_id,
                prize_id: winner.prize_id,
                ticket_id: winner.ticket_id,
                won_at: winner.won_at.unix_timestamp(),
                claim_deadline: winner.claim_deadline.unix_timestamp(),
            });
            if let Err(e) = self.publisher.publish(&event).await {
                warn!(winner_id = %winner.id, error = %e, "Failed to publish raffle.winner.selected");
            }
        }

        Ok(DrawOutcome {
            raffle_id: raffle.id,
            seed,
            eligible_tickets: candidates.len(),
            winners,
        })
    }

    /// Draw every raffle that is due at `now`. One raffle failing does not
    /// stop the others.
    pub async fn draw_due(&self, now: OffsetDateTime) -> Result<Vec<DrawOutcome>, PipelineError> {
        let due = self.store.due_raffles(now).await?;
        let mut drawn = Vec::with_capacity(due.len());
        for raffle in due {
            match self.draw(raffle.id, None, now).await {
                Ok(outcome) => drawn.push(outcome),
                Err(e) => error!(raffle_id = %raffle.id, error = %e, "Scheduled draw failed"),
            }
        }
        Ok(drawn)
    }
}

/// Runs [`DrawEngine::draw_due`] on the configured interval.
pub struct DrawScheduler<S: ?Sized> {
    engine: Arc<DrawEngine<S>>,
    config: ConfigStore<PipelineConfig>,
}

impl<S> DrawScheduler<S>
where
    S: RaffleStore + TicketLedger + ?Sized,
{
    pub fn new(engine: Arc<DrawEngine<S>>, config: ConfigStore<PipelineConfig>) -> Self {
        Self { engine, config }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("DrawScheduler started");
        let mut config_watcher = self.config.subscribe();
        loop {
            let interval = self.config.read().await.draw.scheduler_interval;
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("DrawScheduler received shutdown signal");
                        break;
                    }
                }

                Ok(()) = config_watcher.changed() => {
                    debug!("DrawScheduler rescheduled after config reload");
                }

                _ = tokio::time::sleep(interval) => {
                    match self.engine.draw_due(OffsetDateTime::now_utc()).await {
                        Ok(drawn) if !drawn.is_empty() => {
                            info!(count = drawn.len(), "Scheduled draws completed");
                        }
                        Ok(_) => debug!("No raffles due"),
                        Err(e) => error!(error = %e, "Failed to list due raffles"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{PrizeDelivery, TicketSource, TicketStatus, WinnerStatus};
    use crate::store::{IssueTickets, MemoryStore};
    use crate::test_support::{
        RecordingPublisher, SECRET, after_draw, during_registration, prize, raffle,
    };
    use fuelraffle_sdk::objects::topics;
    use std::collections::HashSet;

    struct Harness {
        store: Arc<MemoryStore>,
        publisher: Arc<RecordingPublisher>,
        engine: DrawEngine<MemoryStore>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let engine = DrawEngine::new(
            Arc::clone(&store),
            Arc::clone(&publisher) as Arc<dyn EventPublisher>,
            ConfigStore::new(PipelineConfig::with_seed_secret(SECRET)),
        );
        Harness {
            store,
            publisher,
            engine,
        }
    }

    async fn give_tickets(store: &MemoryStore, user_id: Uuid, count: u32) {
        store
            .issue(IssueTickets {
                source_type: TicketSource::Promotional,
                source_event_id: Uuid::now_v7().to_string(),
                user_id,
                count,
                generated_at: during_registration(),
            })
            .await
            .unwrap();
    }

    /// An active raffle with three single-unit prize tiers and three players.
    async fn ready_raffle(h: &Harness) -> (Raffle, Vec<Uuid>) {
        let draft = raffle(RaffleStatus::Draft);
        h.store.insert_raffle(draft.clone()).await;
        for tier in 1..=3 {
            h.store
                .insert_prize(prize(draft.id, tier, PrizeDelivery::Digital))
                .await;
        }
        let active = h.engine.activate(draft.id).await.unwrap();
        let users: Vec<Uuid> = (0..3).map(|_| Uuid::now_v7()).collect();
        for user in &users {
            give_tickets(&h.store, *user, 2).await;
        }
        (active, users)
    }

    #[tokio::test]
    async fn test_activation_commits_to_the_seed() {
        let h = harness();
        let (active, _) = ready_raffle(&h).await;
        let expected = commitment(&derive_reveal(SECRET, active.id));
        assert_eq!(active.status, RaffleStatus::Active);
        assert_eq!(active.seed_commitment.as_deref(), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn test_draw_selects_one_winner_per_tier_and_completes() {
        let h = harness();
        let (active, users) = ready_raffle(&h).await;

        let outcome = h.engine.draw(active.id, None, after_draw()).await.unwrap();
        assert_eq!(outcome.eligible_tickets, 6);
        assert_eq!(outcome.winners.len(), 3);
        let winners: HashSet<Uuid> = outcome.winners.iter().map(|w| w.user_id).collect();
        assert_eq!(winners, users.iter().copied().collect());
        let prizes: HashSet<Uuid> = outcome.winners.iter().map(|w| w.prize_id).collect();
        assert_eq!(prizes.len(), 3);

        for winner in &outcome.winners {
            assert_eq!(winner.status, WinnerStatus::PendingClaim);
            assert_eq!(winner.claim_deadline, after_draw() + time::Duration::days(7));
            let ticket = h.store.ticket(winner.ticket_id).await.unwrap();
            assert_eq!(ticket.status, TicketStatus::Won);
        }

        let completed = h.store.raffle(active.id).await.unwrap().unwrap();
        assert_eq!(completed.status, RaffleStatus::Completed);
        assert_eq!(
            completed.draw_seed,
            Some(i64::from_be_bytes(outcome.seed.to_be_bytes()))
        );
        assert_eq!(
            h.publisher.topics().await,
            vec![topics::WINNER_SELECTED; 3]
        );

        assert!(matches!(
            h.engine.draw(active.id, None, after_draw()).await,
            Err(PipelineError::StateConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_draw_is_reproducible_from_the_reveal() {
        let h = harness();
        let (active, _) = ready_raffle(&h).await;
        let reveal = derive_reveal(SECRET, active.id).to_vec();

        let outcome = h
            .engine
            .draw(active.id, Some(reveal.clone()), after_draw())
            .await
            .unwrap();
        assert_eq!(
            outcome.seed,
            derive_seed(active.id, active.draw_at.unix_timestamp(), &reveal)
        );
    }

    #[tokio::test]
    async fn test_draw_preconditions() {
        let h = harness();
        let (active, _) = ready_raffle(&h).await;

        assert!(matches!(
            h.engine.draw(active.id, None, during_registration()).await,
            Err(PipelineError::Eligibility(
                EligibilityError::RegistrationOpen { .. }
            ))
        ));
        assert!(matches!(
            h.engine
                .draw(active.id, Some(vec![7u8; 32]), after_draw())
                .await,
            Err(PipelineError::InvalidSeedReveal(_))
        ));

        h.engine.pause(active.id).await.unwrap();
        assert!(matches!(
            h.engine.draw(active.id, None, after_draw()).await,
            Err(PipelineError::Eligibility(
                EligibilityError::RaffleNotActive {
                    status: RaffleStatus::Paused,
                    ..
                }
            ))
        ));
        h.engine.resume(active.id).await.unwrap();

        let empty = raffle(RaffleStatus::Draft);
        h.store.insert_raffle(empty.clone()).await;
        h.engine.activate(empty.id).await.unwrap();
        assert!(matches!(
            h.engine.draw(empty.id, None, after_draw()).await,
            Err(PipelineError::Eligibility(EligibilityError::NoParticipants(_)))
        ));

        assert!(matches!(
            h.engine.draw(Uuid::now_v7(), None, after_draw()).await,
            Err(PipelineError::NotFound("raffle", _))
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_rejects_illegal_moves_and_cancel_voids_tickets() {
        let h = harness();
        let (active, users) = ready_raffle(&h).await;

        assert!(matches!(
            h.engine.resume(active.id).await,
            Err(PipelineError::StateConflict { .. })
        ));
        assert!(matches!(
            h.engine.activate(active.id).await,
            Err(PipelineError::StateConflict { .. })
        ));

        let cancelled = h.engine.cancel(active.id).await.unwrap();
        assert_eq!(cancelled.status, RaffleStatus::Cancelled);
        for user in users {
            assert!(
                h.store
                    .tickets_for_user(user)
                    .await
                    .iter()
                    .all(|t| t.status == TicketStatus::Cancelled)
            );
        }
        assert!(matches!(
            h.engine.pause(active.id).await,
            Err(PipelineError::StateConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_draw_due_skips_raffles_that_are_not_due() {
        let h = harness();
        let (active, _) = ready_raffle(&h).await;

        assert!(h.engine.draw_due(during_registration()).await.unwrap().is_empty());
        let drawn = h.engine.draw_due(after_draw()).await.unwrap();
        assert_eq!(drawn.len(), 1);
        assert_eq!(drawn[0].raffle_id, active.id);
        assert!(h.engine.draw_due(after_draw()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_join_moves_unassigned_tickets_while_registration_is_open() {
        let h = harness();
        let user = Uuid::now_v7();
        // No raffle yet, so the tickets are minted unassigned.
        give_tickets(&h.store, user, 3).await;

        let draft = raffle(RaffleStatus::Draft);
        h.store.insert_raffle(draft.clone()).await;
        assert!(matches!(
            h.engine.join(user, draft.id, during_registration()).await,
            Err(PipelineError::Eligibility(EligibilityError::RaffleNotActive { .. }))
        ));

        let active = h.engine.activate(draft.id).await.unwrap();
        assert!(matches!(
            h.engine.join(user, active.id, after_draw()).await,
            Err(PipelineError::Eligibility(EligibilityError::RegistrationClosed(_)))
        ));
        assert_eq!(
            h.engine.join(user, active.id, during_registration()).await.unwrap(),
            3
        );
        assert_eq!(
            h.engine.join(user, active.id, during_registration()).await.unwrap(),
            0
        );
        assert_eq!(h.store.active_tickets(active.id).await.unwrap().len(), 3);
    }
}
