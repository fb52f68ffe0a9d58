use crate::entities::prize::Prize;
use crate::entities::raffle_winner::{DeliveryEntry, RaffleWinner};
use crate::entities::{PrizeDelivery, WinnerStatus};
use crate::error::{EligibilityError, ExpiredKind, PipelineError};
use crate::events::PipelineEvent;
use fuelraffle_sdk::objects::{DeliveryStatus, WinnerUpdatedPayload};
use time::OffsetDateTime;

/// Statuses reachable from `from` in one step.
pub fn allowed_next(from: WinnerStatus) -> &'static [WinnerStatus] {
    use WinnerStatus::*;
    match from {
        PendingClaim => &[Claimed, Expired, Forfeited, Disqualified],
        Claimed => &[Delivered, Disqualified],
        Expired | Forfeited | Disqualified | Delivered => &[],
    }
}

pub fn is_terminal(status: WinnerStatus) -> bool {
    allowed_next(status).is_empty()
}

fn ensure_transition(winner: &RaffleWinner, to: WinnerStatus) -> Result<(), PipelineError> {
    if allowed_next(winner.status).contains(&to) {
        Ok(())
    } else {
        Err(PipelineError::conflict("winner", winner.id, winner.status, to))
    }
}

/// Result of a winner operation, ready to persist and publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinnerUpdate {
    pub winner: RaffleWinner,
    /// Status the stored row must still have for the update to apply.
    pub expected_status: WinnerStatus,
    pub events: Vec<PipelineEvent>,
}

impl WinnerUpdate {
    fn new(before: &RaffleWinner, mut after: RaffleWinner, now: OffsetDateTime) -> Self {
        after.updated_at = now;
        let event = PipelineEvent::WinnerUpdated(WinnerUpdatedPayload {
            winner_id: after.id,
            raffle_id: after.raffle_id,
            user_id: after.user_id,
            status: after.status.into(),
            is_verified: after.is_verified,
            at: now.unix_timestamp(),
        });
        Self {
            winner: after,
            expected_status: before.status,
            events: vec![event],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryInfo {
    pub recipient: String,
    pub address: String,
    pub method: String,
    pub tracking_reference: Option<String>,
}

/// PENDING_CLAIM -> CLAIMED, before the deadline and after verification when
/// the prize requires it.
pub fn claim(
    winner: &RaffleWinner,
    prize: &Prize,
    processed_by: &str,
    now: OffsetDateTime,
) -> Result<WinnerUpdate, PipelineError> {
    ensure_transition(winner, WinnerStatus::Claimed)?;
    if now >= winner.claim_deadline {
        return Err(PipelineError::Expired(ExpiredKind::ClaimDeadline(winner.id)));
    }
    if prize.requires_identity_verification && !winner.is_verified {
        return Err(EligibilityError::VerificationRequired(winner.id).into());
    }

    let mut next = winner.clone();
    next.status = WinnerStatus::Claimed;
    next.claimed_at = Some(now);
    next.processed_by = Some(processed_by.to_string());
    Ok(WinnerUpdate::new(winner, next, now))
}

/// Record identity verification. The status does not change.
pub fn verify(
    winner: &RaffleWinner,
    verified_by: &str,
    identity_document_ref: &str,
    now: OffsetDateTime,
) -> Result<WinnerUpdate, PipelineError> {
    if is_terminal(winner.status) {
        return Err(PipelineError::conflict(
            "winner",
            winner.id,
            winner.status,
            "verified",
        ));
    }

    let mut next = winner.clone();
    next.is_verified = true;
    next.verified_by = Some(verified_by.to_string());
    next.verified_at = Some(now);
    next.identity_document_ref = Some(identity_document_ref.to_string());
    Ok(WinnerUpdate::new(winner, next, now))
}

/// The winner gives the prize up.
pub fn forfeit(winner: &RaffleWinner, now: OffsetDateTime) -> Result<WinnerUpdate, PipelineError> {
    ensure_transition(winner, WinnerStatus::Forfeited)?;
    let mut next = winner.clone();
    next.status = WinnerStatus::Forfeited;
    Ok(WinnerUpdate::new(winner, next, now))
}

pub fn disqualify(
    winner: &RaffleWinner,
    reason: &str,
    decided_by: &str,
    now: OffsetDateTime,
) -> Result<WinnerUpdate, PipelineError> {
    ensure_transition(winner, WinnerStatus::Disqualified)?;
    let mut next = winner.clone();
    next.status = WinnerStatus::Disqualified;
    next.disqualification_reason = Some(reason.to_string());
    next.processed_by = Some(decided_by.to_string());
    Ok(WinnerUpdate::new(winner, next, now))
}

/// PENDING_CLAIM -> EXPIRED once the deadline has passed.
pub fn expire(winner: &RaffleWinner, now: OffsetDateTime) -> Result<WinnerUpdate, PipelineError> {
    ensure_transition(winner, WinnerStatus::Expired)?;
    if now < winner.claim_deadline {
        return Err(PipelineError::conflict(
            "winner",
            winner.id,
            "within claim window",
            WinnerStatus::Expired,
        ));
    }
    let mut next = winner.clone();
    next.status = WinnerStatus::Expired;
    Ok(WinnerUpdate::new(winner, next, now))
}

pub fn set_delivery_info(
    winner: &RaffleWinner,
    info: DeliveryInfo,
    now: OffsetDateTime,
) -> Result<WinnerUpdate, PipelineError> {
    ensure_claimed(winner, "delivery info")?;
    let mut next = winner.clone();
    next.delivery_log.push(DeliveryEntry::Info {
        recipient: info.recipient,
        address: info.address,
        method: info.method,
        tracking_reference: info.tracking_reference,
        at: now.unix_timestamp(),
    });
    Ok(WinnerUpdate::new(winner, next, now))
}

/// Append a delivery status. `DELIVERED` moves the winner to DELIVERED.
///
/// Physical prizes need delivery info on record first.
pub fn update_delivery_status(
    winner: &RaffleWinner,
    prize: &Prize,
    status: DeliveryStatus,
    note: Option<String>,
    now: OffsetDateTime,
) -> Result<WinnerUpdate, PipelineError> {
    ensure_claimed(winner, "delivery status")?;
    if prize.delivery == PrizeDelivery::Physical && !winner.has_delivery_info() {
        return Err(EligibilityError::DeliveryInfoMissing(winner.id).into());
    }

    let mut next = winner.clone();
    next.delivery_log.push(DeliveryEntry::Status {
        status,
        note,
        at: now.unix_timestamp(),
    });
    if status == DeliveryStatus::Delivered {
        ensure_transition(winner, WinnerStatus::Delivered)?;
        next.status = WinnerStatus::Delivered;
    }
    Ok(WinnerUpdate::new(winner, next, now))
}

fn ensure_claimed(winner: &RaffleWinner, what: &'static str) -> Result<(), PipelineError> {
    if winner.status == WinnerStatus::Claimed {
        Ok(())
    } else {
        Err(PipelineError::conflict("winner", winner.id, winner.status, what))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use uuid::Uuid;

    const DRAWN: OffsetDateTime = datetime!(2026-03-01 12:00 UTC);

    fn winner() -> RaffleWinner {
        RaffleWinner::pending(
            Uuid::now_v7(),
            Uuid::now_v7(),
            Uuid::now_v7(),
            Uuid::now_v7(),
            DRAWN,
            DRAWN + time::Duration::days(7),
        )
    }

    fn prize(requires_identity_verification: bool, delivery: PrizeDelivery) -> Prize {
        Prize {
            id: Uuid::now_v7(),
            raffle_id: Uuid::now_v7(),
            name: "Full tank".to_string(),
            tier: 1,
            quantity: 1,
            delivery,
            requires_identity_verification,
        }
    }

    #[test]
    fn test_claim_before_deadline() {
        let w = winner();
        let now = DRAWN + time::Duration::days(6);
        let update = claim(&w, &prize(false, PrizeDelivery::Digital), "desk-1", now).unwrap();

        assert_eq!(update.expected_status, WinnerStatus::PendingClaim);
        assert_eq!(update.winner.status, WinnerStatus::Claimed);
        assert_eq!(update.winner.claimed_at, Some(now));
        assert_eq!(update.winner.processed_by.as_deref(), Some("desk-1"));
        assert_eq!(update.events.len(), 1);
        assert!(matches!(
            &update.events[0],
            PipelineEvent::WinnerUpdated(p) if p.status == fuelraffle_sdk::objects::WinnerStatus::Claimed
        ));
    }

    #[test]
    fn test_claim_at_deadline_is_expired() {
        let w = winner();
        let result = claim(
            &w,
            &prize(false, PrizeDelivery::Digital),
            "desk-1",
            w.claim_deadline,
        );
        assert!(matches!(
            result,
            Err(PipelineError::Expired(ExpiredKind::ClaimDeadline(id))) if id == w.id
        ));
    }

    #[test]
    fn test_claim_on_terminal_or_claimed_conflicts() {
        let p = prize(false, PrizeDelivery::Digital);
        let now = DRAWN + time::Duration::days(1);

        let claimed = claim(&winner(), &p, "desk", now).unwrap().winner;
        assert!(matches!(
            claim(&claimed, &p, "desk", now),
            Err(PipelineError::StateConflict { .. })
        ));

        let mut expired = winner();
        expired.status = WinnerStatus::Expired;
        assert!(matches!(
            claim(&expired, &p, "desk", now),
            Err(PipelineError::StateConflict { .. })
        ));
    }

    #[test]
    fn test_claim_requires_verification_when_prize_does() {
        let p = prize(true, PrizeDelivery::Physical);
        let now = DRAWN + time::Duration::hours(1);
        let w = winner();

        assert!(matches!(
            claim(&w, &p, "desk", now),
            Err(PipelineError::Eligibility(EligibilityError::VerificationRequired(_)))
        ));

        let verified = verify(&w, "kyc-officer", "doc-123", now).unwrap();
        assert_eq!(verified.winner.status, WinnerStatus::PendingClaim);
        assert!(verified.winner.is_verified);

        assert!(claim(&verified.winner, &p, "desk", now).is_ok());
    }

    #[test]
    fn test_expire_only_after_deadline() {
        let w = winner();
        assert!(expire(&w, DRAWN + time::Duration::days(1)).is_err());
        let update = expire(&w, w.claim_deadline).unwrap();
        assert_eq!(update.winner.status, WinnerStatus::Expired);
        assert!(verify(&update.winner, "x", "y", w.claim_deadline).is_err());
    }

    #[test]
    fn test_delivery_flow() {
        let p = prize(false, PrizeDelivery::Physical);
        let now = DRAWN + time::Duration::days(1);
        let claimed = claim(&winner(), &p, "desk", now).unwrap().winner;

        assert!(matches!(
            update_delivery_status(&claimed, &p, DeliveryStatus::Shipped, None, now),
            Err(PipelineError::Eligibility(EligibilityError::DeliveryInfoMissing(_)))
        ));

        let info = DeliveryInfo {
            recipient: "A. Driver".to_string(),
            address: "1 Main St".to_string(),
            method: "courier".to_string(),
            tracking_reference: None,
        };
        let with_info = set_delivery_info(&claimed, info, now).unwrap().winner;
        let shipped =
            update_delivery_status(&with_info, &p, DeliveryStatus::Shipped, None, now).unwrap();
        assert_eq!(shipped.winner.status, WinnerStatus::Claimed);

        let delivered = update_delivery_status(
            &shipped.winner,
            &p,
            DeliveryStatus::Delivered,
            Some("signed".to_string()),
            now,
        )
        .unwrap();
        assert_eq!(delivered.winner.status, WinnerStatus::Delivered);
        assert_eq!(delivered.winner.delivery_log.len(), 3);
    }

    #[test]
    fn test_forfeit_and_disqualify() {
        let w = winner();
        let now = DRAWN + time::Duration::days(1);
        assert_eq!(forfeit(&w, now).unwrap().winner.status, WinnerStatus::Forfeited);

        let p = prize(false, PrizeDelivery::Digital);
        let claimed = claim(&w, &p, "desk", now).unwrap().winner;
        assert!(forfeit(&claimed, now).is_err());
        let dq = disqualify(&claimed, "duplicate account", "fraud-team", now).unwrap();
        assert_eq!(dq.winner.status, WinnerStatus::Disqualified);
        assert_eq!(
            dq.winner.disqualification_reason.as_deref(),
            Some("duplicate account")
        );
        assert!(disqualify(&dq.winner, "again", "fraud-team", now).is_err());
    }
}
