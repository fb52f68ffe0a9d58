use crate::entities::RaffleStatus;
use crate::error::PipelineError;
use uuid::Uuid;

/// Statuses reachable from `from` in one step.
pub fn allowed_next(from: RaffleStatus) -> &'static [RaffleStatus] {
    use RaffleStatus::*;
    match from {
        Draft => &[Active, Cancelled],
        Active => &[Paused, Completed, Cancelled],
        Paused => &[Active, Cancelled],
        Completed | Cancelled => &[],
    }
}

pub fn is_terminal(status: RaffleStatus) -> bool {
    allowed_next(status).is_empty()
}

pub fn ensure_transition(
    raffle_id: Uuid,
    from: RaffleStatus,
    to: RaffleStatus,
) -> Result<(), PipelineError> {
    if allowed_next(from).contains(&to) {
        Ok(())
    } else {
        Err(PipelineError::conflict("raffle", raffle_id, from, to))
    }
}

/// Administrative lifecycle commands. Completion only happens through a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaffleAction {
    Activate,
    Pause,
    Resume,
    Cancel,
}

impl RaffleAction {
    /// The status this action moves a raffle out of `from` into.
    ///
    /// `Activate` only applies to drafts and `Resume` only to paused raffles,
    /// even though both land on ACTIVE.
    pub fn apply(self, raffle_id: Uuid, from: RaffleStatus) -> Result<RaffleStatus, PipelineError> {
        let to = match (self, from) {
            (RaffleAction::Activate, RaffleStatus::Draft) => RaffleStatus::Active,
            (RaffleAction::Resume, RaffleStatus::Paused) => RaffleStatus::Active,
            (RaffleAction::Pause, _) => RaffleStatus::Paused,
            (RaffleAction::Cancel, _) => RaffleStatus::Cancelled,
            (RaffleAction::Activate | RaffleAction::Resume, _) => {
                return Err(PipelineError::conflict(
                    "raffle",
                    raffle_id,
                    from,
                    RaffleStatus::Active,
                ));
            }
        };
        ensure_transition(raffle_id, from, to)?;
        Ok(to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        let id = Uuid::now_v7();
        assert!(ensure_transition(id, RaffleStatus::Draft, RaffleStatus::Active).is_ok());
        assert!(ensure_transition(id, RaffleStatus::Active, RaffleStatus::Completed).is_ok());
        assert!(ensure_transition(id, RaffleStatus::Draft, RaffleStatus::Completed).is_err());
        assert!(ensure_transition(id, RaffleStatus::Paused, RaffleStatus::Completed).is_err());
        assert!(is_terminal(RaffleStatus::Completed));
        assert!(is_terminal(RaffleStatus::Cancelled));
        assert!(!is_terminal(RaffleStatus::Paused));
    }

    #[test]
    fn test_actions() {
        let id = Uuid::now_v7();
        assert_eq!(
            RaffleAction::Activate.apply(id, RaffleStatus::Draft).unwrap(),
            RaffleStatus::Active
        );
        assert_eq!(
            RaffleAction::Resume.apply(id, RaffleStatus::Paused).unwrap(),
            RaffleStatus::Active
        );
        assert!(RaffleAction::Resume.apply(id, RaffleStatus::Draft).is_err());
        assert!(RaffleAction::Activate.apply(id, RaffleStatus::Paused).is_err());
        assert!(RaffleAction::Pause.apply(id, RaffleStatus::Draft).is_err());
        assert_eq!(
            RaffleAction::Cancel.apply(id, RaffleStatus::Paused).unwrap(),
            RaffleStatus::Cancelled
        );
        assert!(matches!(
            RaffleAction::Cancel.apply(id, RaffleStatus::Completed),
            Err(PipelineError::StateConflict { .. })
        ));
    }
}
