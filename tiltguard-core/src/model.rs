//! Account and match history data model
//!
//! Global invariants enforced:
//! - `is_banned` / `ban_expires_at` are a cache of `ban::compute_ban_status`
//!   over the current history and are only written by `Account::history_changed`
//! - Recency ordering is timestamp descending; equal timestamps resolve to the
//!   later-inserted record first

use crate::ban::{self, BanStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Outcome of a single ranked match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchResult {
    Win,
    Loss,
}

impl MatchResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchResult::Win => "win",
            MatchResult::Loss => "loss",
        }
    }

    pub fn is_loss(&self) -> bool {
        matches!(self, MatchResult::Loss)
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "win" | "w" => Ok(MatchResult::Win),
            "loss" | "lose" | "l" => Ok(MatchResult::Loss),
            other => Err(format!("unknown match result: {}", other)),
        }
    }
}

/// One recorded game outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: String,
    pub result: MatchResult,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hero: Option<String>,
}

impl MatchRecord {
    pub fn new(id: impl Into<String>, result: MatchResult, timestamp: i64) -> Self {
        MatchRecord {
            id: id.into(),
            result,
            timestamp,
            hero: None,
        }
    }

    pub fn with_hero(mut self, hero: impl Into<String>) -> Self {
        self.hero = Some(hero.into());
        self
    }
}

/// Ranked tiers, lowest first
///
/// Ordering follows declaration order, so `Rank::King > Rank::Bronze`.
/// Legacy data stored the in-game tier labels; those are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Rank {
    #[serde(alias = "青铜")]
    Bronze,
    #[serde(alias = "白银")]
    Silver,
    #[serde(alias = "黄金")]
    Gold,
    #[serde(alias = "铂金")]
    Platinum,
    #[serde(alias = "钻石")]
    Diamond,
    #[serde(alias = "星耀")]
    Master,
    #[serde(alias = "最强王者")]
    Grandmaster,
    #[serde(alias = "荣耀王者")]
    King,
}

impl Rank {
    pub const ALL: [Rank; 8] = [
        Rank::Bronze,
        Rank::Silver,
        Rank::Gold,
        Rank::Platinum,
        Rank::Diamond,
        Rank::Master,
        Rank::Grandmaster,
        Rank::King,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Rank::Bronze => "Bronze",
            Rank::Silver => "Silver",
            Rank::Gold => "Gold",
            Rank::Platinum => "Platinum",
            Rank::Diamond => "Diamond",
            Rank::Master => "Master",
            Rank::Grandmaster => "Grandmaster",
            Rank::King => "King",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Rank {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Rank::ALL
            .iter()
            .copied()
            .find(|rank| rank.label().eq_ignore_ascii_case(needle))
            .ok_or_else(|| format!("unknown rank: {}", needle))
    }
}

/// Login platform of an account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Platform {
    /// Accounts saved before platforms were tracked were all WeChat accounts
    #[default]
    Wechat,
    Qq,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Wechat, Platform::Qq];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Wechat => "wechat",
            Platform::Qq => "qq",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wechat" | "wx" => Ok(Platform::Wechat),
            "qq" => Ok(Platform::Qq),
            other => Err(format!("unknown platform: {}", other)),
        }
    }
}

/// A tracked game account
///
/// The ban fields are serialized so exported files stay readable, but they
/// are never read back as truth: `AccountStore` calls `history_changed` on
/// every loaded or imported account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    pub rank: Rank,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    history: Vec<MatchRecord>,
    #[serde(default)]
    is_banned: bool,
    #[serde(default)]
    ban_expires_at: Option<i64>,
}

impl Account {
    /// Create an account with an empty history (never banned)
    pub fn new(id: impl Into<String>, name: impl Into<String>, rank: Rank, platform: Platform) -> Self {
        Account {
            id: id.into(),
            name: name.into(),
            rank,
            platform,
            history: Vec::new(),
            is_banned: false,
            ban_expires_at: None,
        }
    }

    /// Match history in insertion order
    pub fn history(&self) -> &[MatchRecord] {
        &self.history
    }

    pub fn is_banned(&self) -> bool {
        self.is_banned
    }

    pub fn ban_expires_at(&self) -> Option<i64> {
        self.ban_expires_at
    }

    /// Cached ban status as of the last recompute
    pub fn ban_status(&self) -> BanStatus {
        BanStatus {
            is_banned: self.is_banned,
            ban_expires_at: self.ban_expires_at,
        }
    }

    /// Recompute the derived ban fields from the current history
    ///
    /// This is the only writer of `is_banned` / `ban_expires_at`.
    pub fn history_changed(&mut self, now: i64) {
        let status = ban::compute_ban_status(&self.history, now);
        self.is_banned = status.is_banned;
        self.ban_expires_at = status.ban_expires_at;
    }

    /// Append a record and recompute
    ///
    /// Returns false (and leaves the account untouched) if a record with the
    /// same id is already in the history.
    pub fn add_match(&mut self, record: MatchRecord, now: i64) -> bool {
        if self.has_match(&record.id) {
            return false;
        }
        self.history.push(record);
        self.history_changed(now);
        true
    }

    pub fn has_match(&self, match_id: &str) -> bool {
        self.history.iter().any(|m| m.id == match_id)
    }

    /// Drop later records whose id repeats an earlier one; returns how many were dropped
    pub fn drop_duplicate_matches(&mut self, now: i64) -> usize {
        let before = self.history.len();
        let mut seen = HashSet::new();
        self.history.retain(|m| seen.insert(m.id.clone()));
        let dropped = before - self.history.len();
        if dropped > 0 {
            self.history_changed(now);
        }
        dropped
    }

    /// Apply an edit to the record with `match_id`
    ///
    /// Returns false (and leaves the account untouched) if no such record exists.
    pub fn edit_match(&mut self, match_id: &str, edit: &MatchEdit, now: i64) -> bool {
        let Some(record) = self.history.iter_mut().find(|m| m.id == match_id) else {
            return false;
        };
        if let Some(result) = edit.result {
            record.result = result;
        }
        if let Some(timestamp) = edit.timestamp {
            record.timestamp = timestamp;
        }
        if let Some(hero) = &edit.hero {
            record.hero = if hero.trim().is_empty() {
                None
            } else {
                Some(hero.trim().to_string())
            };
        }
        self.history_changed(now);
        true
    }

    /// Remove the record with `match_id`; returns the removed record
    pub fn delete_match(&mut self, match_id: &str, now: i64) -> Option<MatchRecord> {
        let index = self.history.iter().position(|m| m.id == match_id)?;
        let removed = self.history.remove(index);
        self.history_changed(now);
        Some(removed)
    }

    /// Replace the whole history and recompute
    ///
    /// Records repeating an earlier id are dropped.
    pub fn replace_history(&mut self, history: Vec<MatchRecord>, now: i64) {
        self.history = history;
        self.drop_duplicate_matches(now);
        self.history_changed(now);
    }

    /// Timestamp of the most recently inserted record (0 for an empty history)
    pub fn last_played(&self) -> i64 {
        self.history.last().map(|m| m.timestamp).unwrap_or(0)
    }
}

/// Partial update of a match record; `None` fields are left unchanged
///
/// An empty `hero` string clears the hero label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchEdit {
    pub result: Option<MatchResult>,
    pub timestamp: Option<i64>,
    pub hero: Option<String>,
}

/// Records ordered most recent first
///
/// Timestamp descending; ties resolve to the later-inserted record first.
/// Walking the history backwards and stable-sorting gives exactly that order.
pub fn by_recency(history: &[MatchRecord]) -> Vec<&MatchRecord> {
    let mut sorted: Vec<&MatchRecord> = history.iter().rev().collect();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, result: MatchResult, ts: i64) -> MatchRecord {
        MatchRecord::new(id, result, ts)
    }

    #[test]
    fn test_rank_ordering() {
        assert!(Rank::King > Rank::Grandmaster);
        assert!(Rank::Bronze < Rank::Silver);
        let mut ranks = vec![Rank::Gold, Rank::King, Rank::Bronze];
        ranks.sort();
        assert_eq!(ranks, vec![Rank::Bronze, Rank::Gold, Rank::King]);
    }

    #[test]
    fn test_rank_parse_case_insensitive() {
        assert_eq!("diamond".parse::<Rank>().unwrap(), Rank::Diamond);
        assert_eq!("GrandMaster".parse::<Rank>().unwrap(), Rank::Grandmaster);
        assert!("wood".parse::<Rank>().is_err());
    }

    #[test]
    fn test_rank_accepts_legacy_labels() {
        let rank: Rank = serde_json::from_str("\"荣耀王者\"").unwrap();
        assert_eq!(rank, Rank::King);
        assert_eq!(serde_json::to_string(&Rank::King).unwrap(), "\"KING\"");
    }

    #[test]
    fn test_match_result_serialization() {
        assert_eq!(serde_json::to_string(&MatchResult::Loss).unwrap(), "\"LOSS\"");
        let parsed: MatchResult = serde_json::from_str("\"WIN\"").unwrap();
        assert_eq!(parsed, MatchResult::Win);
        assert_eq!("L".parse::<MatchResult>().unwrap(), MatchResult::Loss);
    }

    #[test]
    fn test_by_recency_orders_newest_first() {
        let history = vec![
            rec("a", MatchResult::Win, 100),
            rec("b", MatchResult::Loss, 300),
            rec("c", MatchResult::Win, 200),
        ];
        let ids: Vec<&str> = by_recency(&history).iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_by_recency_tie_prefers_later_insertion() {
        let history = vec![
            rec("first", MatchResult::Win, 100),
            rec("second", MatchResult::Loss, 100),
            rec("third", MatchResult::Win, 100),
            rec("older", MatchResult::Loss, 50),
        ];
        let ids: Vec<&str> = by_recency(&history).iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["third", "second", "first", "older"]);
    }

    #[test]
    fn test_new_account_not_banned() {
        let account = Account::new("id-1", "Main", Rank::Gold, Platform::Qq);
        assert!(account.history().is_empty());
        assert!(!account.is_banned());
        assert_eq!(account.ban_expires_at(), None);
    }

    #[test]
    fn test_add_match_recomputes_ban() {
        let mut account = Account::new("id-1", "Main", Rank::Gold, Platform::Qq);
        account.add_match(rec("m1", MatchResult::Loss, 1_000), 2_000);
        assert!(account.is_banned());
        assert_eq!(account.ban_expires_at(), Some(1_000 + ban::BAN_DURATION_MS));
    }

    #[test]
    fn test_add_match_rejects_duplicate_id() {
        let mut account = Account::new("id-1", "Main", Rank::Gold, Platform::Qq);
        assert!(account.add_match(rec("dup", MatchResult::Win, 1_000), 2_000));
        assert!(!account.add_match(rec("dup", MatchResult::Loss, 1_500), 2_000));
        assert_eq!(account.history().len(), 1);
        assert!(!account.is_banned());
    }

    #[test]
    fn test_drop_duplicate_matches_keeps_first() {
        let mut account = Account::new("id-1", "Main", Rank::Gold, Platform::Qq);
        account.replace_history(
            vec![
                rec("a", MatchResult::Win, 1_000),
                rec("a", MatchResult::Loss, 1_500),
                rec("b", MatchResult::Win, 1_600),
            ],
            2_000,
        );
        let ids: Vec<&str> = account.history().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(!account.is_banned());
        assert_eq!(account.drop_duplicate_matches(2_000), 0);
    }

    #[test]
    fn test_edit_match_recomputes_ban() {
        let mut account = Account::new("id-1", "Main", Rank::Gold, Platform::Qq);
        account.add_match(rec("m1", MatchResult::Loss, 1_000), 2_000);

        let edit = MatchEdit {
            result: Some(MatchResult::Win),
            ..Default::default()
        };
        assert!(account.edit_match("m1", &edit, 2_000));
        assert!(!account.is_banned());
        assert_eq!(account.ban_expires_at(), None);
        assert!(!account.edit_match("missing", &edit, 2_000));
    }

    #[test]
    fn test_edit_match_clears_hero_with_empty_string() {
        let mut account = Account::new("id-1", "Main", Rank::Gold, Platform::Qq);
        account.add_match(rec("m1", MatchResult::Win, 1_000).with_hero("Arthur"), 2_000);
        let edit = MatchEdit {
            hero: Some("  ".to_string()),
            ..Default::default()
        };
        account.edit_match("m1", &edit, 2_000);
        assert_eq!(account.history()[0].hero, None);
    }

    #[test]
    fn test_delete_match_recomputes_ban() {
        let mut account = Account::new("id-1", "Main", Rank::Gold, Platform::Qq);
        account.add_match(rec("m1", MatchResult::Win, 1_000), 2_000);
        account.add_match(rec("m2", MatchResult::Loss, 1_500), 2_000);
        assert!(account.is_banned());

        let removed = account.delete_match("m2", 2_000).unwrap();
        assert_eq!(removed.id, "m2");
        assert!(!account.is_banned());
        assert!(account.delete_match("m2", 2_000).is_none());
    }

    #[test]
    fn test_stale_cache_is_not_trusted_after_recompute() {
        let json = r#"{
            "id": "x",
            "name": "Alt",
            "rank": "GOLD",
            "history": [],
            "isBanned": true,
            "banExpiresAt": 99999999999
        }"#;
        let mut account: Account = serde_json::from_str(json).unwrap();
        assert_eq!(account.platform, Platform::Wechat);
        account.history_changed(0);
        assert!(!account.is_banned());
        assert_eq!(account.ban_expires_at(), None);
    }

    #[test]
    fn test_last_played_uses_last_inserted() {
        let mut account = Account::new("id-1", "Main", Rank::Gold, Platform::Qq);
        assert_eq!(account.last_played(), 0);
        account.add_match(rec("m1", MatchResult::Win, 500), 0);
        account.add_match(rec("m2", MatchResult::Win, 300), 0);
        assert_eq!(account.last_played(), 300);
    }
}
