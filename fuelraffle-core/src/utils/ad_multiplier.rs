//! Bonus tickets for ad engagements.
//!
//! Both functions are pure: the issuance consumer recomputes the bonus from the
//! engagement details on every delivery, so a redelivered event always mints the
//! same number of tickets.

use crate::config::AdRewardConfig;
use fuelraffle_sdk::objects::EngagementDetails;

/// Whether an engagement earns any tickets at all.
pub fn qualifies_for_rewards(config: &AdRewardConfig, details: &EngagementDetails) -> bool {
    if details.duration_seconds < config.min_duration_seconds {
        return false;
    }
    !config.require_completion || details.completed
}

/// Bonus tickets on top of `base_tickets`.
///
/// The result is clamped so that `base_tickets + bonus` never exceeds
/// `max_tickets_per_engagement`.
pub fn calculate_bonus_tickets(
    config: &AdRewardConfig,
    base_tickets: u32,
    details: &EngagementDetails,
) -> u32 {
    let mut bonus: u64 = 0;

    if details.completed {
        bonus += u64::from(config.completion_bonus);
    }
    if details.clicked {
        bonus += u64::from(config.click_bonus);
    }

    let interaction_bonus =
        u64::from(details.interactions) * u64::from(config.per_interaction_bonus);
    bonus += interaction_bonus.min(u64::from(config.max_interaction_bonus));

    if details.duration_seconds >= config.extended_view_seconds {
        bonus += u64::from(config.extended_view_bonus);
    }
    if details.quality_score >= config.quality_threshold {
        bonus += u64::from(config.quality_bonus);
    }
    if details.engagements_today >= config.frequency_threshold {
        bonus += u64::from(config.frequency_bonus);
    }

    // Rounds down.
    let scaled = bonus.saturating_mul(u64::from(config.global_multiplier_percent)) / 100;

    let headroom = config.max_tickets_per_engagement.saturating_sub(base_tickets);
    u32::try_from(scaled)
        .unwrap_or(u32::MAX)
        .min(headroom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engaged() -> EngagementDetails {
        EngagementDetails {
            duration_seconds: 45,
            completed: true,
            clicked: true,
            interactions: 5,
            quality_score: 90,
            engagements_today: 4,
        }
    }

    #[test]
    fn test_short_engagement_does_not_qualify() {
        let config = AdRewardConfig::default();
        let details = EngagementDetails {
            duration_seconds: config.min_duration_seconds - 1,
            ..engaged()
        };
        assert!(!qualifies_for_rewards(&config, &details));
        assert!(qualifies_for_rewards(&config, &engaged()));
    }

    #[test]
    fn test_mandatory_completion() {
        let config = AdRewardConfig {
            require_completion: true,
            ..AdRewardConfig::default()
        };
        let details = EngagementDetails {
            completed: false,
            ..engaged()
        };
        assert!(!qualifies_for_rewards(&config, &details));
    }

    #[test]
    fn test_every_component_adds_up() {
        let config = AdRewardConfig::default();
        // completion 1 + click 1 + interactions min(5, 3) + extended 1 + quality 1 + frequency 1
        assert_eq!(calculate_bonus_tickets(&config, 1, &engaged()), 8);
    }

    #[test]
    fn test_idle_engagement_earns_nothing() {
        let config = AdRewardConfig::default();
        let details = EngagementDetails {
            duration_seconds: 20,
            ..EngagementDetails::default()
        };
        assert_eq!(calculate_bonus_tickets(&config, 1, &details), 0);
    }

    #[test]
    fn test_multiplier_applies_before_clamp() {
        let config = AdRewardConfig {
            global_multiplier_percent: 150,
            max_tickets_per_engagement: 100,
            ..AdRewardConfig::default()
        };
        assert_eq!(calculate_bonus_tickets(&config, 1, &engaged()), 12);
    }

    #[test]
    fn test_clamped_to_engagement_maximum() {
        let config = AdRewardConfig {
            max_tickets_per_engagement: 5,
            ..AdRewardConfig::default()
        };
        assert_eq!(calculate_bonus_tickets(&config, 2, &engaged()), 3);
        // Base already above the maximum leaves no headroom.
        assert_eq!(calculate_bonus_tickets(&config, 9, &engaged()), 0);
    }

    #[test]
    fn test_extreme_rules_stay_within_cap() {
        let details = EngagementDetails {
            duration_seconds: u32::MAX,
            completed: true,
            clicked: true,
            interactions: u32::MAX,
            quality_score: u8::MAX,
            engagements_today: u32::MAX,
        };
        let config = AdRewardConfig {
            completion_bonus: u32::MAX,
            click_bonus: u32::MAX,
            per_interaction_bonus: u32::MAX,
            max_interaction_bonus: u32::MAX,
            extended_view_bonus: u32::MAX,
            quality_bonus: u32::MAX,
            frequency_bonus: u32::MAX,
            global_multiplier_percent: u32::MAX,
            ..AdRewardConfig::default()
        };
        assert_eq!(calculate_bonus_tickets(&config, 3, &details), 7);

        let uncapped = AdRewardConfig {
            max_tickets_per_engagement: u32::MAX,
            ..config
        };
        assert_eq!(calculate_bonus_tickets(&uncapped, 0, &details), u32::MAX);
    }

    #[test]
    fn test_deterministic() {
        let config = AdRewardConfig::default();
        let first = calculate_bonus_tickets(&config, 2, &engaged());
        for _ in 0..10 {
            assert_eq!(calculate_bonus_tickets(&config, 2, &engaged()), first);
        }
    }
}
