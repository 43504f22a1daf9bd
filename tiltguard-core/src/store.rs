//! Account store: CRUD, ordering, queries and JSON persistence
//!
//! Global invariants enforced:
//! - Every history mutation goes through `Account::history_changed`
//! - Loaded and imported accounts are recomputed; stored ban fields are ignored
//! - Writes are atomic (temp file + rename)
//! - Store order is the custom display order; new accounts go to the front

use crate::model::{Account, MatchEdit, MatchRecord, MatchResult, Platform, Rank};
use rayon::prelude::*;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Errors raised by store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("match {match_id} not found in account {account_id}")]
    MatchNotFound {
        account_id: String,
        match_id: String,
    },

    #[error("match {match_id} already exists in account {account_id}")]
    DuplicateMatch {
        account_id: String,
        match_id: String,
    },

    #[error("invalid account name: {0}")]
    InvalidName(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Partial update of account details; history and derived fields are untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub rank: Option<Rank>,
    pub platform: Option<Platform>,
}

/// How imported accounts are combined with the current ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Replace every account with the imported list
    Replace,
    /// Append imported accounts whose id is not already present
    Merge,
}

/// Outcome of an import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    /// Accounts found in the imported document
    pub found: usize,
    /// Accounts actually added to the store
    pub added: usize,
    /// Accounts skipped because their id already existed (merge only)
    pub skipped: usize,
}

/// Sort order for account listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    /// Most recently played first (last inserted record)
    #[default]
    Updated,
    /// Highest rank first
    Rank,
    /// Store order
    Custom,
}

/// Filter and sort options for `AccountStore::query`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountQuery {
    /// Case-insensitive substring of the name or rank label
    pub search: Option<String>,
    pub platform: Option<Platform>,
    pub sort: SortBy,
}

impl AccountQuery {
    fn matches(&self, account: &Account) -> bool {
        let matches_search = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                account.name.to_lowercase().contains(&term)
                    || account.rank.label().to_lowercase().contains(&term)
            }
        };
        let matches_platform = self.platform.map_or(true, |p| account.platform == p);
        matches_search && matches_platform
    }
}

/// Ordered collection of accounts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountStore {
    accounts: Vec<Account>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already-deserialized accounts, recomputing each one
    pub fn from_accounts(accounts: Vec<Account>, now: i64) -> Self {
        let mut store = AccountStore { accounts };
        store.refresh(now);
        store
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }

    /// Look an account up by id, falling back to a case-insensitive name match
    pub fn resolve(&self, key: &str) -> Result<&Account> {
        self.find(key)
            .or_else(|| {
                self.accounts
                    .iter()
                    .find(|a| a.name.eq_ignore_ascii_case(key.trim()))
            })
            .ok_or_else(|| StoreError::AccountNotFound(key.to_string()))
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut Account> {
        self.accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::AccountNotFound(id.to_string()))
    }

    /// Create an account at the front of the store
    pub fn add_account(&mut self, name: &str, rank: Rank, platform: Platform) -> Result<&Account> {
        let name = validate_name(name)?;
        let account = Account::new(Uuid::new_v4().to_string(), name, rank, platform);
        info!(id = %account.id, name = %account.name, "account added");
        self.accounts.insert(0, account);
        Ok(&self.accounts[0])
    }

    /// Remove an account and its whole history
    pub fn remove_account(&mut self, id: &str) -> Result<Account> {
        let index = self
            .accounts
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| StoreError::AccountNotFound(id.to_string()))?;
        let removed = self.accounts.remove(index);
        info!(id = %removed.id, "account removed");
        Ok(removed)
    }

    /// Update name, rank or platform
    pub fn update_account(&mut self, id: &str, update: &AccountUpdate) -> Result<&Account> {
        let name = update.name.as_deref().map(validate_name).transpose()?;
        let account = self.find_mut(id)?;
        if let Some(name) = name {
            account.name = name;
        }
        if let Some(rank) = update.rank {
            account.rank = rank;
        }
        if let Some(platform) = update.platform {
            account.platform = platform;
        }
        Ok(&*account)
    }

    /// Record a new match played at `now`
    pub fn record_result(
        &mut self,
        id: &str,
        result: MatchResult,
        hero: Option<&str>,
        now: i64,
    ) -> Result<&Account> {
        self.record_result_at(id, result, now, hero, now)
    }

    /// Record a new match played at `timestamp` (back-dated entries)
    pub fn record_result_at(
        &mut self,
        id: &str,
        result: MatchResult,
        timestamp: i64,
        hero: Option<&str>,
        now: i64,
    ) -> Result<&Account> {
        let mut record = MatchRecord::new(Uuid::new_v4().to_string(), result, timestamp);
        if let Some(hero) = hero.map(str::trim).filter(|h| !h.is_empty()) {
            record = record.with_hero(hero);
        }
        self.add_match(id, record, now)
    }

    /// Append an existing record (e.g. back-filled history)
    pub fn add_match(&mut self, id: &str, record: MatchRecord, now: i64) -> Result<&Account> {
        let account = self.find_mut(id)?;
        let match_id = record.id.clone();
        if !account.add_match(record, now) {
            return Err(StoreError::DuplicateMatch {
                account_id: id.to_string(),
                match_id,
            });
        }
        debug!(account = %account.id, match_id = %match_id, "match added");
        Ok(&*account)
    }

    pub fn edit_match(
        &mut self,
        id: &str,
        match_id: &str,
        edit: &MatchEdit,
        now: i64,
    ) -> Result<&Account> {
        let account = self.find_mut(id)?;
        if !account.edit_match(match_id, edit, now) {
            return Err(StoreError::MatchNotFound {
                account_id: id.to_string(),
                match_id: match_id.to_string(),
            });
        }
        Ok(&*account)
    }

    pub fn delete_match(&mut self, id: &str, match_id: &str, now: i64) -> Result<MatchRecord> {
        let account = self.find_mut(id)?;
        account
            .delete_match(match_id, now)
            .ok_or_else(|| StoreError::MatchNotFound {
                account_id: id.to_string(),
                match_id: match_id.to_string(),
            })
    }

    /// Recompute the derived fields of every account (lets expired cooldowns lapse)
    pub fn refresh(&mut self, now: i64) {
        self.accounts
            .par_iter_mut()
            .for_each(|account| account.history_changed(now));
        debug!(accounts = self.accounts.len(), "derived state refreshed");
    }

    /// Move `dragged_id` to the position currently held by `target_id`
    pub fn move_account(&mut self, dragged_id: &str, target_id: &str) -> Result<()> {
        let old_index = self
            .accounts
            .iter()
            .position(|a| a.id == dragged_id)
            .ok_or_else(|| StoreError::AccountNotFound(dragged_id.to_string()))?;
        let new_index = self
            .accounts
            .iter()
            .position(|a| a.id == target_id)
            .ok_or_else(|| StoreError::AccountNotFound(target_id.to_string()))?;
        if old_index == new_index {
            return Ok(());
        }
        let moved = self.accounts.remove(old_index);
        self.accounts.insert(new_index, moved);
        Ok(())
    }

    /// Filter and sort accounts for display
    pub fn query(&self, query: &AccountQuery) -> Vec<&Account> {
        let mut selected: Vec<&Account> =
            self.accounts.iter().filter(|a| query.matches(a)).collect();
        match query.sort {
            SortBy::Custom => {}
            SortBy::Rank => selected.sort_by(|a, b| b.rank.cmp(&a.rank)),
            SortBy::Updated => selected.sort_by(|a, b| b.last_played().cmp(&a.last_played())),
        }
        selected
    }

    /// Serialize every account as a pretty JSON array
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.accounts)?)
    }

    /// Import accounts from a JSON array
    ///
    /// On a parse error the store is left untouched.
    pub fn import_json(&mut self, json: &str, mode: ImportMode, now: i64) -> Result<ImportSummary> {
        let mut imported = parse_accounts(json, now)?;
        imported
            .par_iter_mut()
            .for_each(|account| account.history_changed(now));
        let found = imported.len();

        let summary = match mode {
            ImportMode::Replace => {
                self.accounts = imported;
                ImportSummary {
                    found,
                    added: found,
                    skipped: 0,
                }
            }
            ImportMode::Merge => {
                let mut added = 0;
                for account in imported {
                    if self.find(&account.id).is_none() {
                        self.accounts.push(account);
                        added += 1;
                    }
                }
                ImportSummary {
                    found,
                    added,
                    skipped: found - added,
                }
            }
        };

        info!(
            found = summary.found,
            added = summary.added,
            skipped = summary.skipped,
            "accounts imported"
        );
        Ok(summary)
    }

    /// Load the store from `path`; a missing file yields an empty store
    pub fn load(path: &Path, now: i64) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no data file yet, starting empty");
            return Ok(Self::new());
        }
        let json = std::fs::read_to_string(path).map_err(io_error(path))?;
        let accounts = parse_accounts(&json, now)?;
        info!(path = %path.display(), accounts = accounts.len(), "accounts loaded");
        Ok(Self::from_accounts(accounts, now))
    }

    /// Persist the store to `path` atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.export_json()?;
        atomic_write(path, &json)?;
        debug!(path = %path.display(), accounts = self.accounts.len(), "accounts saved");
        Ok(())
    }
}

/// Parse a JSON array of accounts, migrating legacy entries
///
/// A missing, null or empty platform becomes WeChat. Match records whose id
/// repeats an earlier one in the same history are dropped.
fn parse_accounts(json: &str, now: i64) -> Result<Vec<Account>> {
    let raw: Vec<Value> = serde_json::from_str(json)?;
    raw.into_iter()
        .map(|mut value| -> Result<Account> {
            migrate_platform(&mut value);
            let mut account = Account::deserialize(value)?;
            let dropped = account.drop_duplicate_matches(now);
            if dropped > 0 {
                warn!(id = %account.id, dropped, "duplicate match ids dropped");
            }
            Ok(account)
        })
        .collect()
}

fn migrate_platform(value: &mut Value) {
    let Some(object) = value.as_object_mut() else {
        return;
    };
    let blank = match object.get("platform") {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    };
    if blank {
        warn!(
            id = object.get("id").and_then(serde_json::Value::as_str).unwrap_or("?"),
            "account without platform, defaulting to wechat"
        );
        object.insert("platform".to_string(), Value::String("WECHAT".to_string()));
    }
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidName("name must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError {
    let path = path.display().to_string();
    move |source| StoreError::Io { path, source }
}

/// Write data to file atomically using temp file + rename
pub fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    use std::fs;
    use std::io::Write;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path).map_err(io_error(&temp_path))?;
    file.write_all(contents.as_bytes())
        .map_err(io_error(&temp_path))?;
    file.sync_all().map_err(io_error(&temp_path))?;
    drop(file);

    fs::rename(&temp_path, path).map_err(io_error(path))?;
    Ok(())
}
