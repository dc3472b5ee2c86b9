//! Command-line interface for ModInfo+
//!
//! This module handles parsing of CLI arguments using clap and runs each
//! subcommand against a [`Session`], writing human-readable output.

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

use crate::data::{InvalidItemKey, Item, ItemKey};
use crate::format::{describe_stats, format_date, format_number};
use crate::session::Session;

/// Number of items shown per discovery page
pub const MODS_PER_PAGE: usize = 3;

/// Error types for the command-line host
#[derive(Debug, Error)]
pub enum CliError {
    /// An item argument was not of the form owner/repo
    #[error(transparent)]
    InvalidItem(#[from] InvalidItemKey),

    /// The requested discovery page does not exist
    #[error("Page {page} is out of range (1-{pages})")]
    PageOutOfRange { page: u32, pages: u32 },

    /// Writing command output failed
    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

/// ModInfo+ - browse and watch Mindustry mods published on GitHub
#[derive(Parser, Debug)]
#[command(name = "modinfo")]
#[command(about = "Browse, watch and track releases of Mindustry mods")]
#[command(version)]
pub struct Cli {
    /// Read settings from this TOML file on top of the global config
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List discovered mods with their release stats
    Discover {
        /// Page to show, three mods per page
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,
    },
    /// Show release stats for one mod
    Stats {
        /// Repository as owner/repo
        #[arg(value_parser = parse_item_arg)]
        item: ItemKey,
    },
    /// Add a mod to the watchlist, or remove it if already watched
    Watch {
        /// Repository as owner/repo
        #[arg(value_parser = parse_item_arg)]
        item: ItemKey,
    },
    /// List watched mods
    Watchlist,
    /// Show notifications, newest first
    Inbox {
        /// Mark every notification as read after listing
        #[arg(long)]
        mark_read: bool,
    },
    /// Clear cached discovery and stats (at most once a minute)
    Refresh,
}

/// Parses an `owner/repo` argument.
///
/// # Arguments
/// * `s` - The item string from CLI
///
/// # Returns
/// * `Ok(ItemKey)` if the string has exactly one non-empty owner and repo
/// * `Err(CliError::InvalidItem)` otherwise
pub fn parse_item_arg(s: &str) -> Result<ItemKey, CliError> {
    Ok(s.parse::<ItemKey>()?)
}

/// Number of discovery pages for `total` items; never less than one
pub fn page_count(total: usize) -> u32 {
    let pages = total.div_ceil(MODS_PER_PAGE).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Returns the items on a 1-based page
pub fn page_slice(items: &[Item], page: u32) -> Result<&[Item], CliError> {
    let pages = page_count(items.len());
    if page == 0 || page > pages {
        return Err(CliError::PageOutOfRange { page, pages });
    }

    let start = (page as usize - 1) * MODS_PER_PAGE;
    let end = (start + MODS_PER_PAGE).min(items.len());
    Ok(&items[start.min(end)..end])
}

/// Runs one subcommand against the session
pub async fn run(
    session: &mut Session,
    command: &Command,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        Command::Discover { page } => discover(session, *page, out).await,
        Command::Stats { item } => {
            let item = session.resolve(item);
            let stats = session.stats(&item).await;
            writeln!(out, "{} ({})", item.name, item.key())?;
            writeln!(out, "  {}", describe_stats(&stats))?;
            if !stats.error {
                writeln!(out, "  first release {}", format_date(stats.first_release))?;
            }
            Ok(())
        }
        Command::Watch { item } => {
            let item = session.resolve(item);
            if session.toggle_watch(&item) {
                writeln!(out, "Watching {}", item.key())?;
            } else {
                writeln!(out, "Stopped watching {}", item.key())?;
            }
            Ok(())
        }
        Command::Watchlist => {
            let entries = session.watchlist().entries();
            if entries.is_empty() {
                writeln!(out, "Watchlist is empty")?;
            }
            for entry in entries {
                writeln!(
                    out,
                    "{}  added {}",
                    entry.item.key(),
                    format_date(Some(entry.added_at))
                )?;
            }
            Ok(())
        }
        Command::Inbox { mark_read } => {
            let log = session.notifications();
            if log.is_empty() {
                writeln!(out, "No notifications")?;
            } else {
                writeln!(out, "{} unread", log.unread_count())?;
            }
            for n in log.newest_first() {
                let marker = if n.read { " " } else { "*" };
                writeln!(
                    out,
                    "{} #{} {} {}: {}",
                    marker,
                    n.id,
                    format_date(Some(n.time)),
                    n.item_name,
                    n.message
                )?;
            }
            if *mark_read {
                session.notifications_mut().mark_all_read();
            }
            Ok(())
        }
        Command::Refresh => {
            let status = session.request_refresh();
            if status.allowed {
                writeln!(out, "Caches cleared")?;
            } else {
                writeln!(out, "Refresh available in {}s", status.seconds_remaining)?;
            }
            Ok(())
        }
    }
}

async fn discover(session: &mut Session, page: u32, out: &mut impl Write) -> Result<(), CliError> {
    let result = session.discover().await;
    if result.items.is_empty() {
        writeln!(out, "No mods found")?;
        return Ok(());
    }

    let shown = page_slice(&result.items, page)?.to_vec();
    let source = if result.from_cache { "cached" } else { "fetched" };
    writeln!(
        out,
        "{} mods ({}), page {}/{}",
        result.items.len(),
        source,
        page,
        page_count(result.items.len())
    )?;

    for item in &shown {
        let stats = session.stats(item).await;
        let watched = if session.is_watched(&item.key()) {
            "  [watched]"
        } else {
            ""
        };
        writeln!(
            out,
            "{}  {} stars{}",
            item.key(),
            format_number(u64::from(item.stars)),
            watched
        )?;
        writeln!(out, "  {}", item.description)?;
        writeln!(out, "  {}", describe_stats(&stats))?;
    }
    Ok(())
}
