//! Losing-streak risk index
//!
//! Global invariants enforced:
//! - Deterministic: pure function of the history (recency per `model::by_recency`)
//! - Score is the clamped sum of rule contributions, always within [0, 100]
//! - Reasons are emitted in fixed rule order: streak, win rate, density

use crate::model::{by_recency, MatchRecord, MatchResult};
use serde::{Deserialize, Serialize};

/// Histories shorter than this are not scored
pub const MIN_SAMPLE: usize = 3;

/// Number of most recent games used for the win-rate rule
pub const WIN_RATE_WINDOW: usize = 10;

/// Number of most recent games used for the density rule
pub const DENSITY_WINDOW: usize = 5;

/// Losses within `DENSITY_WINDOW` that trigger the density rule
pub const DENSITY_LOSSES: usize = 4;

pub const REASON_VERY_LOW_WIN_RATE: &str = "extremely low recent win rate (<=20% in last 10)";
pub const REASON_LOW_WIN_RATE: &str = "low recent win rate (<=40% in last 10)";
pub const REASON_DENSE_LOSSES: &str = "4+ losses in last 5 games";

pub const DESCRIPTION_INSUFFICIENT: &str =
    "Insufficient sample: record at least 3 games before the risk index is meaningful.";
pub const DESCRIPTION_HEALTHY: &str =
    "Environment healthy: the account looks like it is in a normal matchmaking pool.";
pub const DESCRIPTION_MILD: &str = "Mild risk: keep a steady mindset and watch the next few games.";
pub const DESCRIPTION_WARNING: &str =
    "High risk: recent results suggest matchmaking is balancing against you. \
     Play with caution and consider stopping while ahead.";
pub const DESCRIPTION_DANGER: &str =
    "Extreme risk: the account appears stuck in a losing-streak pool. \
     Stop ranked play immediately and rest for at least 24 hours.";

/// Authoritative risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Safe,
    Warning,
    Danger,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Warning => "warning",
            RiskLevel::Danger => "danger",
        }
    }
}

/// Description band (presentation only)
///
/// Finer than `RiskLevel`: `Mild` sits inside the `Safe` level. Never branch
/// on this for anything but choosing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskBand {
    Healthy,
    Mild,
    Warning,
    Danger,
}

impl RiskBand {
    pub fn description(&self) -> &'static str {
        match self {
            RiskBand::Healthy => DESCRIPTION_HEALTHY,
            RiskBand::Mild => DESCRIPTION_MILD,
            RiskBand::Warning => DESCRIPTION_WARNING,
            RiskBand::Danger => DESCRIPTION_DANGER,
        }
    }
}

/// Points contributed by each rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskWeights {
    /// Added per loss in the current streak (streaks of 2 or more)
    pub per_streak_loss: u32,
    /// Recent win rate <= 20%
    pub very_low_win_rate: u32,
    /// Recent win rate <= 40%
    pub low_win_rate: u32,
    /// 4+ losses in the last 5 games
    pub dense_losses: u32,
}

impl Default for RiskWeights {
    fn default() -> Self {
        RiskWeights {
            per_streak_loss: 15,
            very_low_win_rate: 50,
            low_win_rate: 30,
            dense_losses: 35,
        }
    }
}

/// Score thresholds for levels and description bands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskThresholds {
    /// Scores strictly above this get the mild-risk description
    pub mild: u8,
    /// Scores at or above this are `Warning`
    pub warning: u8,
    /// Scores at or above this are `Danger`
    pub danger: u8,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        RiskThresholds {
            mild: 20,
            warning: 45,
            danger: 75,
        }
    }
}

/// Which win-rate tier the recent window fell into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinRateTier {
    VeryLow,
    Low,
}

/// Raw rule contributions before clamping
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskComponents {
    pub loss_streak: usize,
    pub streak_points: u32,
    pub recent_win_rate: f64,
    pub win_rate_tier: Option<WinRateTier>,
    pub win_rate_points: u32,
    pub recent_losses: usize,
    pub density_points: u32,
}

impl RiskComponents {
    pub fn raw_score(&self) -> u32 {
        self.streak_points
            .saturating_add(self.win_rate_points)
            .saturating_add(self.density_points)
    }
}

/// Complete risk analysis for one history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAnalysis {
    pub score: u8,
    pub level: RiskLevel,
    pub reasons: Vec<String>,
    pub description: String,
}

impl RiskAnalysis {
    fn insufficient_sample() -> Self {
        RiskAnalysis {
            score: 0,
            level: RiskLevel::Safe,
            reasons: Vec::new(),
            description: DESCRIPTION_INSUFFICIENT.to_string(),
        }
    }
}

/// Length of the current losing streak, counted from the most recent record
pub fn current_loss_streak(history: &[MatchRecord]) -> usize {
    by_recency(history)
        .into_iter()
        .take_while(|record| record.result.is_loss())
        .count()
}

/// Calculate rule contributions with custom weights
pub fn calculate_risk_components(history: &[MatchRecord], weights: &RiskWeights) -> RiskComponents {
    let sorted = by_recency(history);
    let mut components = RiskComponents::default();

    components.loss_streak = sorted
        .iter()
        .take_while(|record| record.result.is_loss())
        .count();
    if components.loss_streak >= 2 {
        let streak = u32::try_from(components.loss_streak).unwrap_or(u32::MAX);
        components.streak_points = streak.saturating_mul(weights.per_streak_loss);
    }

    let recent: Vec<&&MatchRecord> = sorted.iter().take(WIN_RATE_WINDOW).collect();
    if !recent.is_empty() {
        let wins = recent
            .iter()
            .filter(|record| record.result == MatchResult::Win)
            .count();
        let count = recent.len();
        components.recent_win_rate = wins as f64 / count as f64 * 100.0;
        // integer comparison keeps the 20% / 40% boundaries exact
        if wins * 100 <= 20 * count {
            components.win_rate_tier = Some(WinRateTier::VeryLow);
            components.win_rate_points = weights.very_low_win_rate;
        } else if wins * 100 <= 40 * count {
            components.win_rate_tier = Some(WinRateTier::Low);
            components.win_rate_points = weights.low_win_rate;
        }
    }

    components.recent_losses = sorted
        .iter()
        .take(DENSITY_WINDOW)
        .filter(|record| record.result.is_loss())
        .count();
    if components.recent_losses >= DENSITY_LOSSES {
        components.density_points = weights.dense_losses;
    }

    components
}

/// Assign the authoritative level with default thresholds
pub fn assign_risk_level(score: u8) -> RiskLevel {
    assign_risk_level_with_thresholds(score, &RiskThresholds::default())
}

/// Assign the authoritative level with custom thresholds
pub fn assign_risk_level_with_thresholds(score: u8, thresholds: &RiskThresholds) -> RiskLevel {
    if score >= thresholds.danger {
        RiskLevel::Danger
    } else if score >= thresholds.warning {
        RiskLevel::Warning
    } else {
        RiskLevel::Safe
    }
}

/// Description band lookup, keyed on score ranges
pub fn assign_risk_band(score: u8, thresholds: &RiskThresholds) -> RiskBand {
    if score >= thresholds.danger {
        RiskBand::Danger
    } else if score >= thresholds.warning {
        RiskBand::Warning
    } else if score > thresholds.mild {
        RiskBand::Mild
    } else {
        RiskBand::Healthy
    }
}

/// Compute the risk index with default weights and thresholds
pub fn compute_risk_index(history: &[MatchRecord]) -> RiskAnalysis {
    compute_risk_index_with(history, &RiskWeights::default(), &RiskThresholds::default())
}

/// Compute the risk index with custom weights and thresholds
pub fn compute_risk_index_with(
    history: &[MatchRecord],
    weights: &RiskWeights,
    thresholds: &RiskThresholds,
) -> RiskAnalysis {
    if history.len() < MIN_SAMPLE {
        return RiskAnalysis::insufficient_sample();
    }

    let components = calculate_risk_components(history, weights);

    let mut reasons = Vec::new();
    if components.loss_streak >= 2 {
        reasons.push(format!(
            "current losing streak: {} losses in a row",
            components.loss_streak
        ));
    }
    match components.win_rate_tier {
        Some(WinRateTier::VeryLow) => reasons.push(REASON_VERY_LOW_WIN_RATE.to_string()),
        Some(WinRateTier::Low) => reasons.push(REASON_LOW_WIN_RATE.to_string()),
        None => {}
    }
    if components.recent_losses >= DENSITY_LOSSES {
        reasons.push(REASON_DENSE_LOSSES.to_string());
    }

    let score = components.raw_score().min(100) as u8;
    let level = assign_risk_level_with_thresholds(score, thresholds);
    let description = assign_risk_band(score, thresholds).description().to_string();

    RiskAnalysis {
        score,
        level,
        reasons,
        description,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a history from results given most recent first
    fn history_newest_first(results: &[MatchResult]) -> Vec<MatchRecord> {
        let n = results.len() as i64;
        results
            .iter()
            .enumerate()
            .map(|(i, result)| MatchRecord::new(format!("m{}", i), *result, (n - i as i64) * 1_000))
            .collect()
    }

    use MatchResult::{Loss as L, Win as W};

    #[test]
    fn test_insufficient_sample() {
        for results in [&[][..], &[L][..], &[L, L][..]] {
            let analysis = compute_risk_index(&history_newest_first(results));
            assert_eq!(analysis.score, 0);
            assert_eq!(analysis.level, RiskLevel::Safe);
            assert!(analysis.reasons.is_empty());
            assert_eq!(analysis.description, DESCRIPTION_INSUFFICIENT);
        }
    }

    #[test]
    fn test_four_losses_clamped_to_danger() {
        let analysis = compute_risk_index(&history_newest_first(&[L, L, L, L]));
        let components =
            calculate_risk_components(&history_newest_first(&[L, L, L, L]), &RiskWeights::default());
        assert_eq!(components.streak_points, 60);
        assert_eq!(components.win_rate_points, 50);
        assert_eq!(components.density_points, 35);
        assert_eq!(components.raw_score(), 145);

        assert_eq!(analysis.score, 100);
        assert_eq!(analysis.level, RiskLevel::Danger);
        assert_eq!(
            analysis.reasons,
            vec![
                "current losing streak: 4 losses in a row".to_string(),
                REASON_VERY_LOW_WIN_RATE.to_string(),
                REASON_DENSE_LOSSES.to_string(),
            ]
        );
        assert_eq!(analysis.description, DESCRIPTION_DANGER);
    }

    #[test]
    fn test_alternating_starting_with_win_is_safe() {
        let results = [W, L, W, L, W, L, W, L, W, L];
        let analysis = compute_risk_index(&history_newest_first(&results));
        assert_eq!(analysis.score, 0);
        assert_eq!(analysis.level, RiskLevel::Safe);
        assert!(analysis.reasons.is_empty());
        assert_eq!(analysis.description, DESCRIPTION_HEALTHY);
    }

    #[test]
    fn test_single_loss_streak_contributes_nothing() {
        // streak 1, win rate 2/3, 1 loss in 5
        let analysis = compute_risk_index(&history_newest_first(&[L, W, W]));
        assert_eq!(analysis.score, 0);
        assert!(analysis.reasons.is_empty());
    }

    #[test]
    fn test_low_win_rate_band_is_mild() {
        // 10 games, 4 wins (40%) -> +30, streak 0, last 5 has 3 losses
        let results = [W, L, L, W, L, W, L, W, L, L];
        let analysis = compute_risk_index(&history_newest_first(&results));
        assert_eq!(analysis.score, 30);
        assert_eq!(analysis.level, RiskLevel::Safe);
        assert_eq!(analysis.reasons, vec![REASON_LOW_WIN_RATE.to_string()]);
        assert_eq!(analysis.description, DESCRIPTION_MILD);
    }

    #[test]
    fn test_win_rate_boundary_twenty_percent() {
        // 2 wins of 10 = exactly 20% -> very low
        let results = [W, W, L, W, L, L, L, L, L, L];
        let components = calculate_risk_components(
            &history_newest_first(&[W, W, L, L, L, L, L, L, L, L]),
            &RiskWeights::default(),
        );
        assert_eq!(components.win_rate_points, 50);
        // 3 wins of 10 = 30% -> low
        let components = calculate_risk_components(&history_newest_first(&results), &RiskWeights::default());
        assert_eq!(components.win_rate_points, 30);
    }

    #[test]
    fn test_win_rate_uses_only_last_ten() {
        // newest 10 are all wins, older 10 all losses
        let mut results = vec![W; 10];
        results.extend(vec![L; 10]);
        let analysis = compute_risk_index(&history_newest_first(&results));
        assert_eq!(analysis.score, 0);
    }

    #[test]
    fn test_warning_level() {
        // streak 2 (+30), 10 games with 4 wins (+30) -> 60
        let results = [L, L, W, W, L, W, L, W, L, L];
        let analysis = compute_risk_index(&history_newest_first(&results));
        assert_eq!(analysis.score, 60);
        assert_eq!(analysis.level, RiskLevel::Warning);
        assert_eq!(analysis.description, DESCRIPTION_WARNING);
        assert_eq!(analysis.reasons.len(), 2);
        assert!(analysis.reasons[0].contains('2'));
    }

    #[test]
    fn test_streak_ordered_by_timestamp_not_insertion() {
        // inserted win last but it is the oldest record
        let history = vec![
            MatchRecord::new("a", L, 3_000),
            MatchRecord::new("b", L, 2_000),
            MatchRecord::new("c", W, 1_000),
        ];
        assert_eq!(current_loss_streak(&history), 2);
        let history = vec![
            MatchRecord::new("a", L, 3_000),
            MatchRecord::new("b", L, 2_000),
            MatchRecord::new("c", W, 4_000),
        ];
        assert_eq!(current_loss_streak(&history), 0);
    }

    #[test]
    fn test_streak_tie_break_prefers_later_insertion() {
        let history = vec![
            MatchRecord::new("a", L, 1_000),
            MatchRecord::new("b", L, 2_000),
            MatchRecord::new("c", L, 2_000),
            MatchRecord::new("d", W, 2_000),
        ];
        // "d" was inserted last among equal timestamps, so it is most recent
        assert_eq!(current_loss_streak(&history), 0);
    }

    #[test]
    fn test_idempotent() {
        let history = history_newest_first(&[L, L, W, L, L, W]);
        assert_eq!(compute_risk_index(&history), compute_risk_index(&history));
    }

    #[test]
    fn test_score_always_in_range() {
        for len in 0..25 {
            for pattern in 0..4u32 {
                let results: Vec<MatchResult> = (0..len)
                    .map(|i| if (i as u32 + pattern) % 3 == 0 { W } else { L })
                    .collect();
                let analysis = compute_risk_index(&history_newest_first(&results));
                assert!(analysis.score <= 100);
            }
        }
    }

    #[test]
    fn test_level_thresholds() {
        assert_eq!(assign_risk_level(100), RiskLevel::Danger);
        assert_eq!(assign_risk_level(75), RiskLevel::Danger);
        assert_eq!(assign_risk_level(74), RiskLevel::Warning);
        assert_eq!(assign_risk_level(45), RiskLevel::Warning);
        assert_eq!(assign_risk_level(44), RiskLevel::Safe);
        assert_eq!(assign_risk_level(0), RiskLevel::Safe);
    }

    #[test]
    fn test_band_lookup() {
        let t = RiskThresholds::default();
        assert_eq!(assign_risk_band(20, &t), RiskBand::Healthy);
        assert_eq!(assign_risk_band(21, &t), RiskBand::Mild);
        assert_eq!(assign_risk_band(44, &t), RiskBand::Mild);
        assert_eq!(assign_risk_band(45, &t), RiskBand::Warning);
        assert_eq!(assign_risk_band(75, &t), RiskBand::Danger);
    }

    #[test]
    fn test_custom_weights_and_thresholds() {
        let weights = RiskWeights {
            per_streak_loss: 5,
            very_low_win_rate: 10,
            low_win_rate: 5,
            dense_losses: 5,
        };
        let thresholds = RiskThresholds {
            mild: 5,
            warning: 15,
            danger: 30,
        };
        // 4 losses: 20 + 10 + 5 = 35
        let analysis =
            compute_risk_index_with(&history_newest_first(&[L, L, L, L]), &weights, &thresholds);
        assert_eq!(analysis.score, 35);
        assert_eq!(analysis.level, RiskLevel::Danger);
        assert_eq!(analysis.reasons[1], REASON_VERY_LOW_WIN_RATE);
    }

    #[test]
    fn test_extreme_weights_saturate() {
        let weights = RiskWeights {
            per_streak_loss: u32::MAX,
            very_low_win_rate: u32::MAX,
            low_win_rate: u32::MAX,
            dense_losses: u32::MAX,
        };
        let history = history_newest_first(&[L, L, L, L, L]);
        let components = calculate_risk_components(&history, &weights);
        assert_eq!(components.streak_points, u32::MAX);
        assert_eq!(components.raw_score(), u32::MAX);

        let analysis = compute_risk_index_with(&history, &weights, &RiskThresholds::default());
        assert_eq!(analysis.score, 100);
        assert_eq!(analysis.level, RiskLevel::Danger);
    }
}
