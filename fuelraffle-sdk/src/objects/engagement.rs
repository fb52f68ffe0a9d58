//! Ad engagement details carried on `ad.engagement.completed`.

use serde::{Deserialize, Serialize};

/// What the user did with an advertisement.
///
/// All fields are facts reported by the ad service; the ticket multiplier turns
/// them into bonus tickets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementDetails {
    /// How long the ad was engaged with, in seconds.
    pub duration_seconds: u32,
    /// Whether the ad was watched to the end.
    pub completed: bool,
    /// Whether the call-to-action was clicked.
    pub clicked: bool,
    /// Number of in-ad interactions (taps, swipes, answers).
    pub interactions: u32,
    /// Engagement quality score from 0 to 100.
    pub quality_score: u8,
    /// Number of engagements this user completed today, including this one.
    pub engagements_today: u32,
}
