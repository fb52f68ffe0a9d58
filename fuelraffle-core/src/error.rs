//! Error taxonomy shared by every pipeline component.
//!
//! Signature and expiration errors are boundary rejections and are never retried.
//! `DuplicateEvent` is not a failure: consumers swallow it. Eligibility and state
//! conflicts always reach the caller as typed failures.

use crate::entities::{RaffleStatus, TicketSource};
use fuelraffle_sdk::objects::ErrorCode;
use fuelraffle_sdk::signature::QrError;
use thiserror::Error;
use uuid::Uuid;

/// What ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiredKind {
    QrToken,
    Coupon(Uuid),
    ClaimDeadline(Uuid),
}

impl std::fmt::Display for ExpiredKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpiredKind::QrToken => write!(f, "QR token"),
            ExpiredKind::Coupon(id) => write!(f, "coupon {id}"),
            ExpiredKind::ClaimDeadline(id) => write!(f, "claim window of winner {id}"),
        }
    }
}

/// Preconditions that are not met yet, or not met at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EligibilityError {
    #[error("raffle {raffle_id} is {status}, not active")]
    RaffleNotActive { raffle_id: Uuid, status: RaffleStatus },
    #[error("raffle {raffle_id} registration closes at {closes_at}")]
    RegistrationOpen { raffle_id: Uuid, closes_at: i64 },
    #[error("raffle {0} is not accepting registrations")]
    RegistrationClosed(Uuid),
    #[error("raffle {0} has no eligible participants")]
    NoParticipants(Uuid),
    #[error("ticket {0} is not active")]
    TicketNotActive(Uuid),
    #[error("winner {0} must verify identity before claiming")]
    VerificationRequired(Uuid),
    #[error("coupon {0} is not active")]
    CouponInactive(Uuid),
    #[error("coupon {coupon_id} does not belong to user {user_id}")]
    CouponNotOwned { coupon_id: Uuid, user_id: Uuid },
    #[error("winner {0} has no delivery information")]
    DeliveryInfoMissing(Uuid),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Forged, tampered or unparseable QR token.
    #[error("invalid QR token: {0}")]
    Signature(QrError),

    #[error("{0} expired")]
    Expired(ExpiredKind),

    /// The event was already handled. Safe to acknowledge.
    #[error("event {source_type}:{source_event_id} already processed")]
    DuplicateEvent {
        source_type: TicketSource,
        source_event_id: String,
    },

    /// The coupon already backs another redemption.
    #[error("coupon {coupon_id} already redeemed")]
    AlreadyUsed { coupon_id: Uuid },

    #[error("not eligible: {0}")]
    Eligibility(#[from] EligibilityError),

    #[error("{entity} {id}: cannot move from {from} to {to}")]
    StateConflict {
        entity: &'static str,
        id: Uuid,
        from: String,
        to: String,
    },

    #[error("constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("revealed seed does not match the commitment of raffle {0}")]
    InvalidSeedReveal(Uuid),

    #[error("{0} not found: {1}")]
    NotFound(&'static str, Uuid),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<QrError> for PipelineError {
    fn from(err: QrError) -> Self {
        match err {
            QrError::Expired => Self::Expired(ExpiredKind::QrToken),
            other => Self::Signature(other),
        }
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                let constraint = db.constraint().unwrap_or("unique").to_owned();
                return Self::ConstraintViolation(constraint);
            }
        }
        Self::Database(err)
    }
}

impl PipelineError {
    /// Shorthand for building a state conflict from two displayable states.
    pub fn conflict(
        entity: &'static str,
        id: Uuid,
        from: impl std::fmt::Display,
        to: impl std::fmt::Display,
    ) -> Self {
        Self::StateConflict {
            entity,
            id,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// The code front-ends switch on.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            PipelineError::Signature(_) => ErrorCode::InvalidCode,
            PipelineError::Expired(_) => ErrorCode::ExpiredCode,
            PipelineError::DuplicateEvent { .. } | PipelineError::AlreadyUsed { .. } => {
                ErrorCode::AlreadyUsed
            }
            PipelineError::Eligibility(_) => ErrorCode::NotYetEligible,
            PipelineError::StateConflict { .. } | PipelineError::ConstraintViolation(_) => {
                ErrorCode::StateConflict
            }
            PipelineError::InvalidSeedReveal(_) | PipelineError::InvalidInput(_) => {
                ErrorCode::BadRequest
            }
            PipelineError::NotFound(..) => ErrorCode::NotFound,
            PipelineError::Database(_) => ErrorCode::Internal,
        }
    }

    /// Whether retrying the same operation could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::Database(_))
    }
}
