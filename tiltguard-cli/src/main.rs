//! Tiltguard CLI - ban cooldown and tilt risk tracker for game accounts

#![deny(warnings)]

// Global invariants enforced:
// - The clock is read once per invocation and passed down
// - Every mutating command loads, mutates, then atomically saves the data file
// - Logs go to stderr; stdout carries only command output

use anyhow::Context;
use clap::{Parser, Subcommand};
use tiltguard_core::config::{self, ResolvedConfig};
use tiltguard_core::model::by_recency;
use tiltguard_core::report::format_timestamp;
use tiltguard_core::store::atomic_write;
use tiltguard_core::{
    build_reports, format_remaining, parse_timestamp, render_detail, render_json, render_overall_text, render_text,
    AccountQuery, AccountReport, AccountStore, AccountUpdate, AdviceProvider, ImportMode,
    MatchEdit, MatchResult, OllamaAdvisor, OverallStats, Platform, Rank, SortBy, StaticAdvisor,
};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser)]
#[command(name = "tiltguard")]
#[command(about = "Track ban cooldowns and tilt risk across game accounts")]
#[command(version = env!("TILTGUARD_VERSION"))]
struct Cli {
    /// Path to the account data file (overrides config file)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Path to config file (default: auto-discover)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add, remove, edit or reorder accounts
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// List accounts with ban status and risk
    List {
        /// Case-insensitive match on name or rank
        #[arg(long)]
        search: Option<String>,

        /// Only show accounts on this platform
        #[arg(long)]
        platform: Option<Platform>,

        /// Sort order
        #[arg(long, default_value = "updated")]
        sort: SortArg,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Record a match result played now
    Record {
        /// Account id or name
        account: String,

        /// win or loss
        result: MatchResult,

        /// Hero played
        #[arg(long)]
        hero: Option<String>,
    },
    /// Add, edit or delete recorded matches
    #[command(name = "match")]
    Match {
        #[command(subcommand)]
        action: MatchAction,
    },
    /// Show ban status and risk for one account
    Status {
        /// Account id or name
        account: String,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Show risk reasons and match history
        #[arg(long)]
        explain: bool,
    },
    /// Show totals across all accounts
    Stats {
        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Write every account to a JSON file
    Export {
        path: PathBuf,
    },
    /// Read accounts from a JSON file
    Import {
        path: PathBuf,

        /// Keep existing accounts and add only new ids
        #[arg(long)]
        merge: bool,
    },
    /// Ask the advice provider for a short piece of advice
    Advice {
        /// Account id or name
        account: String,
    },
    /// Validate or show configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum AccountAction {
    /// Add a new account (goes to the front of the custom order)
    Add {
        name: String,

        #[arg(long)]
        rank: Rank,

        #[arg(long, default_value = "wechat")]
        platform: Platform,
    },
    /// Remove an account and its history
    Remove {
        account: String,
    },
    /// Change account details
    Edit {
        account: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        rank: Option<Rank>,

        #[arg(long)]
        platform: Option<Platform>,
    },
    /// Move an account to the position of another in the custom order
    Move {
        account: String,

        #[arg(long)]
        before: String,
    },
}

#[derive(Subcommand)]
enum MatchAction {
    /// Add a match, optionally back-dated
    Add {
        account: String,

        /// win or loss
        result: MatchResult,

        /// When it was played: epoch ms, RFC 3339 or "YYYY-MM-DD HH:MM" UTC (default: now)
        #[arg(long, value_parser = parse_timestamp)]
        at: Option<i64>,

        /// Hero played
        #[arg(long)]
        hero: Option<String>,
    },
    /// Change the result, time or hero of a recorded match
    Edit {
        account: String,
        match_id: String,

        #[arg(long)]
        result: Option<MatchResult>,

        /// New time: epoch ms, RFC 3339 or "YYYY-MM-DD HH:MM" UTC
        #[arg(long, value_parser = parse_timestamp)]
        at: Option<i64>,

        /// Hero label; an empty string clears it
        #[arg(long)]
        hero: Option<String>,
    },
    /// Delete a recorded match
    Delete {
        account: String,
        match_id: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum SortArg {
    Updated,
    Rank,
    Custom,
}

impl From<SortArg> for SortBy {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Updated => SortBy::Updated,
            SortArg::Rank => SortBy::Rank,
            SortArg::Custom => SortBy::Custom,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let now = chrono::Utc::now().timestamp_millis();

    // Config commands must work even when the config file is broken
    let command = match cli.command {
        Commands::Config { action } => return handle_config(action),
        other => other,
    };

    let project_root = std::env::current_dir()?;
    let resolved = config::load_and_resolve(&project_root, cli.config.as_deref())
        .context("failed to load configuration")?;
    let data_path = cli.data.unwrap_or_else(|| resolved.data_file.clone());
    debug!(path = %data_path.display(), "using data file");

    let mut store = AccountStore::load(&data_path, now)
        .with_context(|| format!("failed to load accounts from {}", data_path.display()))?;

    match command {
        Commands::Account { action } => {
            handle_account(&mut store, action)?;
            save(&store, &data_path)?;
        }
        Commands::List {
            search,
            platform,
            sort,
            format,
        } => {
            let query = AccountQuery {
                search,
                platform,
                sort: sort.into(),
            };
            let reports = build_reports(&store.query(&query), now, &resolved);
            match format {
                OutputFormat::Text => {
                    if reports.is_empty() {
                        println!("No accounts.");
                    } else {
                        print!("{}", render_text(&reports));
                    }
                }
                OutputFormat::Json => println!("{}", render_json(&reports)),
            }
        }
        Commands::Record {
            account,
            result,
            hero,
        } => {
            let id = resolve_id(&store, &account)?;
            let updated = store.record_result(&id, result, hero.as_deref(), now)?;
            let message = if updated.is_banned() {
                format!(
                    "Recorded {} for {}. Cooldown: {} left",
                    result,
                    updated.name,
                    format_remaining(updated.ban_status().remaining_ms(now))
                )
            } else {
                format!("Recorded {} for {}. Available.", result, updated.name)
            };
            save(&store, &data_path)?;
            println!("{}", message);
        }
        Commands::Match { action } => {
            handle_match(&mut store, action, now)?;
            save(&store, &data_path)?;
        }
        Commands::Status {
            account,
            format,
            explain,
        } => {
            let account = store.resolve(&account)?;
            let report =
                AccountReport::with_config(account, now, &resolved.weights, &resolved.thresholds);
            match format {
                OutputFormat::Text => print!("{}", render_detail(&report, explain)),
                OutputFormat::Json => println!("{}", render_json(std::slice::from_ref(&report))),
            }
        }
        Commands::Stats { format } => {
            let stats = OverallStats::from_accounts(store.accounts());
            match format {
                OutputFormat::Text => print!("{}", render_overall_text(&stats)),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&stats).context("failed to serialize stats")?
                ),
            }
        }
        Commands::Export { path } => {
            let json = store.export_json()?;
            atomic_write(&path, &json)?;
            println!("Exported {} accounts to {}", store.len(), path.display());
        }
        Commands::Import { path, merge } => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let mode = if merge {
                ImportMode::Merge
            } else {
                ImportMode::Replace
            };
            let summary = store
                .import_json(&json, mode, now)
                .with_context(|| format!("failed to import {}", path.display()))?;
            save(&store, &data_path)?;
            println!(
                "Imported {} of {} accounts ({} skipped)",
                summary.added, summary.found, summary.skipped
            );
        }
        Commands::Advice { account } => {
            let account = store.resolve(&account)?;
            let was_recent_loss = by_recency(account.history())
                .first()
                .is_some_and(|m| m.result.is_loss());
            let advice = advisor(&resolved).get_advice(account.rank, was_recent_loss);
            println!("{}", advice);
        }
        Commands::Config { action } => handle_config(action)?,
    }

    Ok(())
}

fn handle_account(store: &mut AccountStore, action: AccountAction) -> anyhow::Result<()> {
    match action {
        AccountAction::Add {
            name,
            rank,
            platform,
        } => {
            let account = store.add_account(&name, rank, platform)?;
            println!("Added {} ({})", account.name, account.id);
        }
        AccountAction::Remove { account } => {
            let id = resolve_id(store, &account)?;
            let removed = store.remove_account(&id)?;
            println!(
                "Removed {} ({} matches)",
                removed.name,
                removed.history().len()
            );
        }
        AccountAction::Edit {
            account,
            name,
            rank,
            platform,
        } => {
            if name.is_none() && rank.is_none() && platform.is_none() {
                anyhow::bail!("nothing to edit: pass --name, --rank or --platform");
            }
            let id = resolve_id(store, &account)?;
            let update = AccountUpdate {
                name,
                rank,
                platform,
            };
            let account = store.update_account(&id, &update)?;
            println!(
                "Updated {}: {} / {}",
                account.name,
                account.rank,
                account.platform
            );
        }
        AccountAction::Move { account, before } => {
            let dragged = resolve_id(store, &account)?;
            let target = resolve_id(store, &before)?;
            store.move_account(&dragged, &target)?;
            println!("Moved {} before {}", account, before);
        }
    }
    Ok(())
}

fn handle_match(store: &mut AccountStore, action: MatchAction, now: i64) -> anyhow::Result<()> {
    match action {
        MatchAction::Add {
            account,
            result,
            at,
            hero,
        } => {
            let id = resolve_id(store, &account)?;
            let played_at = at.unwrap_or(now);
            let updated = store.record_result_at(&id, result, played_at, hero.as_deref(), now)?;
            println!(
                "Added {} at {} for {} ({})",
                result,
                format_timestamp(played_at),
                updated.name,
                status_word(updated.is_banned())
            );
        }
        MatchAction::Edit {
            account,
            match_id,
            result,
            at,
            hero,
        } => {
            if result.is_none() && at.is_none() && hero.is_none() {
                anyhow::bail!("nothing to edit: pass --result, --at or --hero");
            }
            let id = resolve_id(store, &account)?;
            let edit = MatchEdit {
                result,
                timestamp: at,
                hero,
            };
            let account = store.edit_match(&id, &match_id, &edit, now)?;
            println!(
                "Edited match {}. {} is {}",
                match_id,
                account.name,
                status_word(account.is_banned())
            );
        }
        MatchAction::Delete { account, match_id } => {
            let id = resolve_id(store, &account)?;
            let removed = store.delete_match(&id, &match_id, now)?;
            println!("Deleted match {} ({})", removed.id, removed.result);
        }
    }
    Ok(())
}

fn handle_config(action: ConfigAction) -> anyhow::Result<()> {
    let project_root = std::env::current_dir()?;
    match action {
        ConfigAction::Validate { path } => {
            match config::load_and_resolve(&project_root, path.as_deref()) {
                Ok(config) => {
                    if let Some(ref p) = config.config_path {
                        println!("Config valid: {}", p.display());
                    } else {
                        println!("No config file found. Using defaults.");
                    }
                }
                Err(e) => {
                    eprintln!("Config validation failed: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
        ConfigAction::Show { path } => {
            let resolved = config::load_and_resolve(&project_root, path.as_deref())
                .context("failed to load configuration")?;
            print_config(&resolved);
        }
    }
    Ok(())
}

fn print_config(resolved: &ResolvedConfig) {
    println!("Configuration:");
    if let Some(ref p) = resolved.config_path {
        println!("  Source: {}", p.display());
    } else {
        println!("  Source: defaults (no config file found)");
    }
    println!("  Data file: {}", resolved.data_file.display());
    println!();
    println!("Weights:");
    println!("  per_streak_loss: {}", resolved.weights.per_streak_loss);
    println!("  very_low_win_rate: {}", resolved.weights.very_low_win_rate);
    println!("  low_win_rate: {}", resolved.weights.low_win_rate);
    println!("  dense_losses: {}", resolved.weights.dense_losses);
    println!();
    println!("Thresholds:");
    println!("  mild: {}", resolved.thresholds.mild);
    println!("  warning: {}", resolved.thresholds.warning);
    println!("  danger: {}", resolved.thresholds.danger);
    println!();
    println!("Advice:");
    println!("  enabled: {}", resolved.advice_enabled);
    println!("  host: {}", resolved.advice_host);
    println!("  model: {}", resolved.advice_model);
}

fn advisor(resolved: &ResolvedConfig) -> Box<dyn AdviceProvider> {
    if resolved.advice_enabled {
        Box::new(OllamaAdvisor::new(
            resolved.advice_host.clone(),
            resolved.advice_model.clone(),
        ))
    } else {
        Box::new(StaticAdvisor)
    }
}

fn status_word(is_banned: bool) -> &'static str {
    if is_banned {
        "banned"
    } else {
        "available"
    }
}

fn resolve_id(store: &AccountStore, key: &str) -> anyhow::Result<String> {
    Ok(store.resolve(key)?.id.clone())
}

fn save(store: &AccountStore, path: &Path) -> anyhow::Result<()> {
    store
        .save(path)
        .with_context(|| format!("failed to save accounts to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_match_add_parses_back_dated_time() {
        let cli = Cli::try_parse_from([
            "tiltguard", "match", "add", "Main", "loss", "--at", "1970-01-01 00:01", "--hero", "Arthur",
        ])
        .unwrap();
        match cli.command {
            Commands::Match {
                action:
                    MatchAction::Add {
                        account,
                        result,
                        at,
                        hero,
                    },
            } => {
                assert_eq!(account, "Main");
                assert_eq!(result, MatchResult::Loss);
                assert_eq!(at, Some(60_000));
                assert_eq!(hero.as_deref(), Some("Arthur"));
            }
            _ => panic!("expected match add"),
        }
    }

    #[test]
    fn test_match_edit_accepts_at() {
        let cli = Cli::try_parse_from([
            "tiltguard", "match", "edit", "Main", "m1", "--at", "2024-03-05T18:30:00Z",
        ])
        .unwrap();
        match cli.command {
            Commands::Match {
                action: MatchAction::Edit { at, result, .. },
            } => {
                assert_eq!(at, Some(1_709_663_400_000));
                assert_eq!(result, None);
            }
            _ => panic!("expected match edit"),
        }
    }

    #[test]
    fn test_bad_time_is_rejected() {
        assert!(Cli::try_parse_from(["tiltguard", "match", "add", "Main", "win", "--at", "soon"]).is_err());
    }

    #[test]
    fn test_back_dated_match_flow() {
        let mut store = AccountStore::new();
        store.add_account("Main", Rank::Gold, Platform::Qq).unwrap();
        let now = 1_700_000_000_000;

        handle_match(
            &mut store,
            MatchAction::Add {
                account: "main".to_string(),
                result: MatchResult::Win,
                at: None,
                hero: None,
            },
            now,
        )
        .unwrap();
        handle_match(
            &mut store,
            MatchAction::Add {
                account: "Main".to_string(),
                result: MatchResult::Loss,
                at: Some(now - 60_000),
                hero: None,
            },
            now,
        )
        .unwrap();

        let account = store.resolve("Main").unwrap();
        let loss_id = account.history()[1].id.clone();
        assert!(account.is_banned());
        assert_eq!(account.ban_expires_at(), Some(now - 60_000 + tiltguard_core::BAN_DURATION_MS));

        // moving the loss far into the past lifts the ban
        handle_match(
            &mut store,
            MatchAction::Edit {
                account: "Main".to_string(),
                match_id: loss_id,
                result: None,
                at: Some(0),
                hero: None,
            },
            now,
        )
        .unwrap();
        assert!(!store.resolve("Main").unwrap().is_banned());
    }
}
