//! `cafeed cache`: offline queries over the persisted event cache.

use std::fmt::Write as _;
use std::io::IsTerminal;
use std::sync::Arc;

use dialoguer::Confirm;
use tracing::debug;

use cafeed_core::{CacheStats, CacheStore, CaEvent, FileStore};

use crate::cli::{CacheArgs, CacheCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output::{self, EventRow};

pub async fn handle(args: CacheArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let settings = config::resolve_cache(global);
    let dir = config::cache_dir();
    debug!(dir = %dir.display(), key = %settings.key, "opening event cache");
    let cache = CacheStore::new(settings, Arc::new(FileStore::new(dir)));
    cache.load().await?;

    match args.command {
        CacheCommand::List { limit } => {
            let events = cache.events();
            print_events(&events[..limit.min(events.len())], global)?;
        }

        CacheCommand::Search { query, limit } => {
            let events: Vec<_> = cache.search(&query).into_iter().take(limit).collect();
            if events.is_empty() {
                eprintln!("No cached events match '{query}'");
            } else {
                print_events(&events, global)?;
            }
        }

        CacheCommand::Stats => {
            let stats = cache.stats();
            let out = output::render_single(global.output, &stats, format_stats, |s| {
                s.total.to_string()
            })?;
            output::print_output(&out, global.quiet);
        }

        CacheCommand::Clear => {
            let count = cache.len();
            if !global.yes {
                confirm_clear(count)?;
            }
            cache.clear();
            if !global.quiet {
                eprintln!("✓ Removed {count} cached events");
            }
        }
    }

    // Loading may have pruned expired events; make sure that lands too.
    cache.flush().await;
    Ok(())
}

fn print_events(events: &[Arc<CaEvent>], global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_list(
        global.output,
        events,
        |e| EventRow::from(&**e),
        |e| output::primary_address(e),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn confirm_clear(count: usize) -> Result<(), CliError> {
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: "cache clear".into(),
        });
    }
    let confirmed = Confirm::new()
        .with_prompt(format!("Delete all {count} cached events?"))
        .default(false)
        .interact()
        .map_err(|e| CliError::Validation {
            field: "interactive".into(),
            reason: format!("prompt failed: {e}"),
        })?;
    if confirmed {
        Ok(())
    } else {
        Err(CliError::Validation {
            field: "confirmation".into(),
            reason: "cancelled".into(),
        })
    }
}

fn format_stats(stats: &CacheStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Events:         {}", stats.total);
    let _ = writeln!(out, "Unique tokens:  {}", stats.unique_tokens);
    let _ = writeln!(out, "Unique authors: {}", stats.unique_authors);
    let when = |millis: Option<i64>| {
        millis.map_or_else(|| "-".into(), |m| output::format_millis(m, "%Y-%m-%d %H:%M:%S"))
    };
    let _ = writeln!(out, "Oldest:         {}", when(stats.oldest_received_at));
    let _ = write!(out, "Newest:         {}", when(stats.newest_received_at));
    out
}
