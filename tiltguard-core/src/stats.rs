//! Win/loss statistics for a single account and across all accounts

use crate::model::{by_recency, Account, MatchRecord, MatchResult, Platform, Rank};
use serde::{Deserialize, Serialize};

/// Number of games shown in the recent-form strip
pub const RECENT_FORM_LEN: usize = 10;

/// Per-account statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AccountStats {
    pub wins: usize,
    pub losses: usize,
    pub total: usize,
    /// Percentage in [0, 100]; 0 for an empty history
    pub win_rate: f64,
    /// Last `RECENT_FORM_LEN` results, oldest first
    pub recent_form: Vec<MatchResult>,
}

impl AccountStats {
    pub fn from_history(history: &[MatchRecord]) -> Self {
        let wins = history
            .iter()
            .filter(|m| m.result == MatchResult::Win)
            .count();
        let total = history.len();

        let mut recent_form: Vec<MatchResult> = by_recency(history)
            .into_iter()
            .take(RECENT_FORM_LEN)
            .map(|m| m.result)
            .collect();
        recent_form.reverse();

        AccountStats {
            wins,
            losses: total - wins,
            total,
            win_rate: win_rate(wins, total),
            recent_form,
        }
    }

    /// Recent form as a compact strip like `"WWLWL"`
    pub fn form_string(&self) -> String {
        self.recent_form
            .iter()
            .map(|r| match r {
                MatchResult::Win => 'W',
                MatchResult::Loss => 'L',
            })
            .collect()
    }
}

/// Breakdown for one platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PlatformStats {
    pub platform: Platform,
    pub accounts: usize,
    pub games: usize,
    pub wins: usize,
    pub win_rate: f64,
}

/// Number of accounts at one rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RankStats {
    pub rank: Rank,
    pub accounts: usize,
}

/// Dashboard totals across every account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OverallStats {
    pub accounts: usize,
    pub banned: usize,
    pub available: usize,
    pub games: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub platforms: Vec<PlatformStats>,
    /// Platform with the most accounts; WeChat wins ties
    pub main_platform: Platform,
    /// Account count per rank, lowest rank first, zero counts included
    pub ranks: Vec<RankStats>,
}

impl OverallStats {
    pub fn from_accounts(accounts: &[Account]) -> Self {
        let banned = accounts.iter().filter(|a| a.is_banned()).count();
        let (games, wins) = tally(accounts.iter());

        let platforms = Platform::ALL
            .iter()
            .map(|&platform| {
                let members = accounts.iter().filter(|a| a.platform == platform);
                let count = members.clone().count();
                let (games, wins) = tally(members);
                PlatformStats {
                    platform,
                    accounts: count,
                    games,
                    wins,
                    win_rate: win_rate(wins, games),
                }
            })
            .collect();

        let count_on = |platform: Platform| accounts.iter().filter(|a| a.platform == platform).count();
        let main_platform = if count_on(Platform::Wechat) >= count_on(Platform::Qq) {
            Platform::Wechat
        } else {
            Platform::Qq
        };

        let ranks = Rank::ALL
            .iter()
            .map(|&rank| RankStats {
                rank,
                accounts: accounts.iter().filter(|a| a.rank == rank).count(),
            })
            .collect();

        OverallStats {
            accounts: accounts.len(),
            banned,
            available: accounts.len() - banned,
            games,
            wins,
            win_rate: win_rate(wins, games),
            platforms,
            main_platform,
            ranks,
        }
    }
}

fn tally<'a>(accounts: impl Iterator<Item = &'a Account>) -> (usize, usize) {
    accounts.fold((0, 0), |(games, wins), account| {
        let history = account.history();
        let account_wins = history
            .iter()
            .filter(|m| m.result == MatchResult::Win)
            .count();
        (games + history.len(), wins + account_wins)
    })
}

fn win_rate(wins: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        wins as f64 / total as f64 * 100.0
    }
}
