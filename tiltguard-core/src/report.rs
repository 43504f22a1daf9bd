//! Reporting and output generation
//!
//! Global invariants enforced:
//! - Output order is the order reports are passed in (callers sort)
//! - Byte-for-byte identical output for identical input and `now`

use crate::ban::{format_remaining, BanStatus};
use crate::model::{by_recency, Account, Platform, Rank};
use crate::risk::{compute_risk_index_with, RiskAnalysis, RiskThresholds, RiskWeights};
use crate::stats::{AccountStats, OverallStats};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Complete derived view of one account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AccountReport {
    pub id: String,
    pub name: String,
    pub rank: Rank,
    pub platform: Platform,
    pub ban: BanStatus,
    /// Cooldown left at report time, in milliseconds
    pub ban_remaining_ms: i64,
    pub risk: RiskAnalysis,
    pub stats: AccountStats,
    pub history: Vec<HistoryLine>,
}

/// One match as shown in detailed output, most recent first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryLine {
    pub id: String,
    pub result: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hero: Option<String>,
}

impl AccountReport {
    /// Build a report with default risk weights and thresholds
    pub fn new(account: &Account, now: i64) -> Self {
        Self::with_config(account, now, &RiskWeights::default(), &RiskThresholds::default())
    }

    pub fn with_config(
        account: &Account,
        now: i64,
        weights: &RiskWeights,
        thresholds: &RiskThresholds,
    ) -> Self {
        let ban = account.ban_status();
        let history = by_recency(account.history())
            .into_iter()
            .map(|m| HistoryLine {
                id: m.id.clone(),
                result: m.result.to_string(),
                timestamp: m.timestamp,
                hero: m.hero.clone(),
            })
            .collect();

        AccountReport {
            id: account.id.clone(),
            name: account.name.clone(),
            rank: account.rank,
            platform: account.platform,
            ban,
            ban_remaining_ms: ban.remaining_ms(now),
            risk: compute_risk_index_with(account.history(), weights, thresholds),
            stats: AccountStats::from_history(account.history()),
            history,
        }
    }

    fn status_label(&self) -> String {
        if self.ban.is_banned {
            format!("BANNED {}", format_remaining(self.ban_remaining_ms))
        } else {
            "available".to_string()
        }
    }
}

/// Render an account table
pub fn render_text(reports: &[AccountReport]) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "{:<20} {:<12} {:<7} {:<6} {:<7} {:<5} {:<8} {}\n",
        "NAME", "RANK", "PLAT", "GAMES", "WIN%", "RISK", "LEVEL", "STATUS"
    ));

    for report in reports {
        output.push_str(&format!(
            "{:<20} {:<12} {:<7} {:<6} {:<7.1} {:<5} {:<8} {}\n",
            truncate_or_pad(&report.name, 20),
            report.rank.label(),
            report.platform.as_str(),
            report.stats.total,
            report.stats.win_rate,
            report.risk.score,
            report.risk.level.as_str(),
            report.status_label(),
        ));
    }

    output
}

/// Render one account with risk explanation and history
pub fn render_detail(report: &AccountReport, explain: bool) -> String {
    let mut output = String::new();

    output.push_str(&format!("{} ({})\n", report.name, report.id));
    output.push_str(&format!(
        "  rank: {}  platform: {}\n",
        report.rank.label(),
        report.platform.as_str()
    ));
    match report.ban.ban_expires_at {
        Some(expiry) if report.ban.is_banned => output.push_str(&format!(
            "  status: BANNED until {} ({} left)\n",
            format_timestamp(expiry),
            format_remaining(report.ban_remaining_ms)
        )),
        _ => output.push_str("  status: available\n"),
    }
    output.push_str(&format!(
        "  record: {}W {}L ({:.1}%)  form: {}\n",
        report.stats.wins,
        report.stats.losses,
        report.stats.win_rate,
        if report.stats.recent_form.is_empty() {
            "-".to_string()
        } else {
            report.stats.form_string()
        }
    ));
    output.push_str(&format!(
        "  risk: {}/100 [{}]\n",
        report.risk.score,
        report.risk.level.as_str()
    ));
    output.push_str(&format!("  {}\n", report.risk.description));

    if explain {
        if report.risk.reasons.is_empty() {
            output.push_str("  reasons: none\n");
        } else {
            output.push_str("  reasons:\n");
            for reason in &report.risk.reasons {
                output.push_str(&format!("    - {}\n", reason));
            }
        }
        if !report.history.is_empty() {
            output.push_str("  history (most recent first):\n");
            for line in &report.history {
                output.push_str(&format!(
                    "    {}  {:<4}  {}{}\n",
                    format_timestamp(line.timestamp),
                    line.result,
                    line.id,
                    line.hero
                        .as_deref()
                        .map(|h| format!("  [{}]", h))
                        .unwrap_or_default()
                ));
            }
        }
    }

    output
}

/// Render reports as JSON output
pub fn render_json(reports: &[AccountReport]) -> String {
    serde_json::to_string_pretty(reports).unwrap_or_else(|_| "[]".to_string())
}

/// Render dashboard totals
pub fn render_overall_text(stats: &OverallStats) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "accounts: {}  banned: {}  available: {}\n",
        stats.accounts, stats.banned, stats.available
    ));
    output.push_str(&format!(
        "games: {}  wins: {}  win rate: {:.1}%\n",
        stats.games, stats.wins, stats.win_rate
    ));
    output.push_str(&format!("main platform: {}\n", stats.main_platform));
    for platform in &stats.platforms {
        output.push_str(&format!(
            "  {:<7} accounts: {:<3} games: {:<5} win rate: {:.1}%\n",
            platform.platform.as_str(),
            platform.accounts,
            platform.games,
            platform.win_rate
        ));
    }
    output.push_str("ranks:\n");
    for rank in &stats.ranks {
        output.push_str(&format!(
            "  {:<12} {:<3} {}\n",
            rank.rank.label(),
            rank.accounts,
            "#".repeat(rank.accounts)
        ));
    }
    output
}

/// Format epoch milliseconds as UTC `YYYY-MM-DD HH:MM`
pub fn format_timestamp(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => ms.to_string(),
    }
}

/// Parse a match time given as epoch milliseconds, RFC 3339, or UTC `YYYY-MM-DD HH:MM`
pub fn parse_timestamp(input: &str) -> Result<i64, String> {
    let input = input.trim();
    if let Ok(ms) = input.parse::<i64>() {
        return Ok(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.timestamp_millis());
    }
    ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
        .ok_or_else(|| {
            format!(
                "invalid time {:?}: expected epoch milliseconds, RFC 3339 or YYYY-MM-DD HH:MM",
                input
            )
        })
}

/// Truncate or pad string to fixed width (in characters)
fn truncate_or_pad(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        format!("{:<width$}", s, width = width)
    }
}
