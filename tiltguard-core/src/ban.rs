//! Loss cooldown ("ban") derivation
//!
//! Global invariants enforced:
//! - Only the most recent LOSS (by timestamp) governs the cooldown
//! - Pure function of (history, now); no clocks are read here

use crate::model::{by_recency, MatchRecord};
use serde::{Deserialize, Serialize};

/// Fixed cooldown applied from the most recent loss: 3 days
pub const BAN_DURATION_MS: i64 = 3 * 24 * 60 * 60 * 1000;

/// Derived cooldown state of an account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BanStatus {
    pub is_banned: bool,
    pub ban_expires_at: Option<i64>,
}

impl BanStatus {
    pub fn not_banned() -> Self {
        BanStatus::default()
    }

    /// Milliseconds left on the cooldown at `now` (0 when not banned or lapsed)
    pub fn remaining_ms(&self, now: i64) -> i64 {
        match (self.is_banned, self.ban_expires_at) {
            (true, Some(expiry)) => expiry.saturating_sub(now).max(0),
            _ => 0,
        }
    }
}

/// Compute the cooldown from the most recent loss in `history`
pub fn compute_ban_status(history: &[MatchRecord], now: i64) -> BanStatus {
    let latest_loss = by_recency(history)
        .into_iter()
        .find(|record| record.result.is_loss());

    let Some(loss) = latest_loss else {
        return BanStatus::not_banned();
    };

    // far-future timestamps pin the expiry at i64::MAX instead of wrapping
    let expiry = loss.timestamp.saturating_add(BAN_DURATION_MS);
    if expiry > now {
        BanStatus {
            is_banned: true,
            ban_expires_at: Some(expiry),
        }
    } else {
        BanStatus::not_banned()
    }
}

/// Format a remaining duration as `"2d 03h 15m"` (`"0m"` when nothing is left)
pub fn format_remaining(remaining_ms: i64) -> String {
    let total_minutes = remaining_ms.max(0) / 60_000;
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;

    if days > 0 {
        format!("{}d {:02}h {:02}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
