//! Ad engagement reward rules.

/// Rules for turning an ad engagement into bonus tickets.
///
/// Every bonus is a whole number of tickets. The global multiplier is a
/// percentage so the calculation stays in integers and replays identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdRewardConfig {
    /// Engagements shorter than this never earn tickets.
    pub min_duration_seconds: u32,
    /// Only completed views earn tickets.
    pub require_completion: bool,
    pub completion_bonus: u32,
    pub click_bonus: u32,
    pub per_interaction_bonus: u32,
    /// Cap on the sum of per-interaction bonuses.
    pub max_interaction_bonus: u32,
    pub extended_view_seconds: u32,
    pub extended_view_bonus: u32,
    /// Quality score (0-100) at or above which `quality_bonus` applies.
    pub quality_threshold: u8,
    pub quality_bonus: u32,
    /// Engagements per day at or above which `frequency_bonus` applies.
    pub frequency_threshold: u32,
    pub frequency_bonus: u32,
    /// Applied to the summed bonus, in percent. 100 leaves it unchanged.
    pub global_multiplier_percent: u32,
    /// Upper bound on base plus bonus tickets for a single engagement.
    pub max_tickets_per_engagement: u32,
}

impl Default for AdRewardConfig {
    fn default() -> Self {
        Self {
            min_duration_seconds: 15,
            require_completion: false,
            completion_bonus: 1,
            click_bonus: 1,
            per_interaction_bonus: 1,
            max_interaction_bonus: 3,
            extended_view_seconds: 30,
            extended_view_bonus: 1,
            quality_threshold: 80,
            quality_bonus: 1,
            frequency_threshold: 3,
            frequency_bonus: 1,
            global_multiplier_percent: 100,
            max_tickets_per_engagement: 10,
        }
    }
}
