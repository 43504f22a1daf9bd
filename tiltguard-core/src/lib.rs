//! Tiltguard core library - ban cooldowns and tilt risk for game accounts

#![deny(warnings)]

// Global invariants enforced in this crate:
// - Ban status and risk index are pure functions of match history and `now`
// - Derived account fields are never edited directly, only recomputed
// - The current time is always passed in; the library never reads a clock
// - "Most recent" means largest timestamp, later insertion wins ties
// - Identical input yields byte-for-byte identical output

pub mod advice;
pub mod ban;
pub mod config;
pub mod model;
pub mod report;
pub mod risk;
pub mod stats;
pub mod store;

pub use advice::{AdviceProvider, OllamaAdvisor, StaticAdvisor};
pub use ban::{compute_ban_status, format_remaining, BanStatus, BAN_DURATION_MS};
pub use config::ResolvedConfig;
pub use model::{Account, MatchEdit, MatchRecord, MatchResult, Platform, Rank};
pub use report::{
    parse_timestamp, render_detail, render_json, render_overall_text, render_text, AccountReport,
};
pub use risk::{compute_risk_index, compute_risk_index_with, RiskAnalysis, RiskLevel};
pub use stats::{AccountStats, OverallStats};
pub use store::{AccountQuery, AccountStore, AccountUpdate, ImportMode, SortBy, StoreError};

/// Build reports for a set of accounts using resolved configuration
pub fn build_reports(accounts: &[&Account], now: i64, config: &ResolvedConfig) -> Vec<AccountReport> {
    accounts
        .iter()
        .map(|account| AccountReport::with_config(account, now, &config.weights, &config.thresholds))
        .collect()
}
