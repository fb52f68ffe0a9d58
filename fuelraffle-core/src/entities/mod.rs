pub mod coupon;
pub mod prize;
pub mod raffle;
pub mod raffle_ticket;
pub mod raffle_winner;
pub mod redemption;

use fuelraffle_sdk::objects::{
    RaffleStatus as SdkRaffleStatus, TicketSource as SdkTicketSource,
    WinnerStatus as SdkWinnerStatus,
};

/// Ticket status for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "ticket_status")]
pub enum TicketStatus {
    Active,
    Consumed,
    Won,
    Expired,
    Cancelled,
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Ticket source for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `fuelraffle_sdk::objects::TicketSource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "ticket_source")]
pub enum TicketSource {
    Redemption,
    AdEngagement,
    Promotional,
}

impl std::fmt::Display for TicketSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        SdkTicketSource::from(*self).fmt(f)
    }
}

impl From<TicketSource> for SdkTicketSource {
    fn from(value: TicketSource) -> Self {
        match value {
            TicketSource::Redemption => SdkTicketSource::Redemption,
            TicketSource::AdEngagement => SdkTicketSource::AdEngagement,
            TicketSource::Promotional => SdkTicketSource::Promotional,
        }
    }
}

impl From<SdkTicketSource> for TicketSource {
    fn from(value: SdkTicketSource) -> Self {
        match value {
            SdkTicketSource::Redemption => TicketSource::Redemption,
            SdkTicketSource::AdEngagement => TicketSource::AdEngagement,
            SdkTicketSource::Promotional => TicketSource::Promotional,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "raffle_status")]
pub enum RaffleStatus {
    Draft,
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl std::fmt::Display for RaffleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl From<RaffleStatus> for SdkRaffleStatus {
    fn from(value: RaffleStatus) -> Self {
        match value {
            RaffleStatus::Draft => SdkRaffleStatus::Draft,
            RaffleStatus::Active => SdkRaffleStatus::Active,
            RaffleStatus::Paused => SdkRaffleStatus::Paused,
            RaffleStatus::Completed => SdkRaffleStatus::Completed,
            RaffleStatus::Cancelled => SdkRaffleStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "winner_status")]
pub enum WinnerStatus {
    PendingClaim,
    Claimed,
    Expired,
    Forfeited,
    Disqualified,
    Delivered,
}

impl std::fmt::Display for WinnerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl From<WinnerStatus> for SdkWinnerStatus {
    fn from(value: WinnerStatus) -> Self {
        match value {
            WinnerStatus::PendingClaim => SdkWinnerStatus::PendingClaim,
            WinnerStatus::Claimed => SdkWinnerStatus::Claimed,
            WinnerStatus::Expired => SdkWinnerStatus::Expired,
            WinnerStatus::Forfeited => SdkWinnerStatus::Forfeited,
            WinnerStatus::Disqualified => SdkWinnerStatus::Disqualified,
            WinnerStatus::Delivered => SdkWinnerStatus::Delivered,
        }
    }
}

/// How a prize reaches the winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "prize_delivery")]
pub enum PrizeDelivery {
    Physical,
    Digital,
}
