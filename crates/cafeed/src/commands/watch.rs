//! `cafeed watch`: stream the live feed to the terminal.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use owo_colors::OwoColorize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, warn};

use cafeed_core::{
    ConnectionState, DisplayBatch, FileStore, KeyValueStore, MemoryStore, Pipeline,
    SubscriptionFilter,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

/// An error state not followed by a retry within this window is final.
const ERROR_GRACE: Duration = Duration::from_millis(250);

/// Keyboard commands typed while watching.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    TogglePause,
    Clear,
    Network(String),
    MinFollowers(u64),
    Quit,
    Unknown(String),
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    let (cmd, arg) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(cmd, arg)| (cmd, arg.trim()));

    let input = match cmd {
        "" => return None,
        "p" | "pause" => Input::TogglePause,
        "c" | "clear" => Input::Clear,
        "q" | "quit" => Input::Quit,
        "n" | "network" if !arg.is_empty() => Input::Network(arg.to_owned()),
        "f" | "followers" => match arg.parse() {
            Ok(min) => Input::MinFollowers(min),
            Err(_) => Input::Unknown(line.to_owned()),
        },
        _ => Input::Unknown(line.to_owned()),
    };
    Some(input)
}

/// Forward stdin lines from a plain thread; nothing is read when stdin is
/// not a terminal.
fn spawn_input_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    if std::io::stdin().is_terminal() {
        std::thread::spawn(move || {
            for line in std::io::stdin().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    }
    rx
}

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config::Resolved {
        profile_name,
        pipeline: mut settings,
        tokens,
    } = config::resolve(global)?;

    // Fail fast instead of entering a retry loop without a token.
    tokens.resolve()?;

    if let Some(ref network) = args.network {
        settings.filter.network.clone_from(network);
    }
    if let Some(min) = args.min_followers {
        settings.filter.min_followers = min;
    }
    if args.no_retry {
        settings.connection.auto_retry = false;
    }
    let url = settings.connection.url.to_string();

    let store: Arc<dyn KeyValueStore> = if args.no_cache {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(FileStore::new(config::cache_dir()))
    };
    let feed = Pipeline::new(settings, Arc::new(tokens), store);

    // Subscribe before starting so no early transition is missed.
    let state = feed.connection_state();
    let batches = feed.batches();

    if args.paused {
        feed.set_paused(true);
    }
    feed.start().await;
    // Watching is an explicit request to connect.
    if !feed.config().auto_connect {
        feed.connect();
    }

    note(
        global,
        &format!(
            "watching {url} as '{profile_name}' ({} cached, network {})",
            feed.cache().len(),
            feed.subscription().network
        ),
    );

    let result = watch_loop(&feed, state, batches, &args, global, &url).await;
    feed.shutdown().await;
    result
}

async fn watch_loop(
    feed: &Pipeline,
    mut state: watch::Receiver<ConnectionState>,
    mut batches: broadcast::Receiver<Arc<DisplayBatch>>,
    args: &WatchArgs,
    global: &GlobalOpts,
    url: &str,
) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let mut input = spawn_input_reader();
    let mut input_open = true;
    let mut paused = args.paused;
    let mut shown = 0usize;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => return Ok(()),

            changed = state.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let current = *state.borrow_and_update();
                print_state(global, current, color);
                if current == ConnectionState::Error {
                    match settle(&mut state).await {
                        Some(next) => print_state(global, next, color),
                        None => {
                            return Err(CliError::ConnectionFailed {
                                url: url.to_owned(),
                                reason: "the connection failed and will not be retried".into(),
                            });
                        }
                    }
                }
            }

            batch = batches.recv() => match batch {
                Ok(batch) => {
                    let remaining = args.limit.map_or(usize::MAX, |limit| limit - shown);
                    shown += print_batch(&batch, remaining, global, color)?;
                    if args.limit.is_some_and(|limit| shown >= limit) {
                        return Ok(());
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "terminal fell behind, batches skipped");
                }
                Err(RecvError::Closed) => return Ok(()),
            },

            line = input.recv(), if input_open => {
                let Some(line) = line else {
                    input_open = false;
                    continue;
                };
                match parse_input(&line) {
                    None => {}
                    Some(Input::Quit) => return Ok(()),
                    Some(Input::TogglePause) => {
                        paused = !paused;
                        feed.set_paused(paused);
                        note(global, if paused {
                            "display paused (events are still cached)"
                        } else {
                            "display resumed"
                        });
                    }
                    Some(Input::Clear) => {
                        feed.clear_display();
                        note(global, "display cleared");
                    }
                    Some(Input::Network(network)) => {
                        let filter = SubscriptionFilter { network, ..feed.subscription() };
                        resubscribe(feed, filter, global)?;
                    }
                    Some(Input::MinFollowers(min_followers)) => {
                        let filter = SubscriptionFilter { min_followers, ..feed.subscription() };
                        resubscribe(feed, filter, global)?;
                    }
                    Some(Input::Unknown(line)) => {
                        debug!(%line, "unrecognized input");
                        note(global, "keys: p pause, c clear, n <network>, f <followers>, q quit");
                    }
                }
            }
        }
    }
}

/// Wait briefly for the state to move past `Error`. `None` means it did
/// not, so no retry is coming.
async fn settle(state: &mut watch::Receiver<ConnectionState>) -> Option<ConnectionState> {
    match tokio::time::timeout(ERROR_GRACE, state.changed()).await {
        Ok(Ok(())) => Some(*state.borrow_and_update()),
        Ok(Err(_)) | Err(_) => None,
    }
}

fn resubscribe(
    feed: &Pipeline,
    filter: SubscriptionFilter,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let description = format!(
        "network {}, min followers {}",
        filter.network, filter.min_followers
    );
    if feed.update_subscription(filter)? {
        note(global, &format!("subscription updated: {description}"));
    } else {
        note(global, &format!("filter saved for next connection: {description}"));
    }
    Ok(())
}

/// Print up to `remaining` events of a batch, oldest first. Returns how
/// many were printed.
fn print_batch(
    batch: &DisplayBatch,
    remaining: usize,
    global: &GlobalOpts,
    color: bool,
) -> Result<usize, CliError> {
    if batch.flushed {
        note(
            global,
            &format!("── {} buffered events ──", batch.events.len()),
        );
    }

    let mut printed = 0;
    for event in batch.events.iter().rev().take(remaining) {
        let line = match global.output {
            OutputFormat::Table => output::event_line(event, color),
            // Streaming output is one document per event.
            OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(&**event, true)?,
            OutputFormat::Yaml => format!(
                "---\n{}",
                serde_yaml::to_string(&**event).map_err(|e| CliError::Render {
                    reason: e.to_string(),
                })?
            ),
            OutputFormat::Plain => output::primary_address(event),
        };
        output::print_output(&line, global.quiet);
        printed += 1;
    }
    Ok(printed)
}

fn print_state(global: &GlobalOpts, state: ConnectionState, color: bool) {
    let label = match state {
        ConnectionState::Reconnecting { attempt } => format!("reconnecting (attempt {attempt})"),
        other => other.to_string(),
    };
    let line = if color {
        let dot = match state {
            ConnectionState::Connected => "●".green().to_string(),
            ConnectionState::Error => "●".red().to_string(),
            _ => "●".yellow().to_string(),
        };
        format!("{dot} {label}")
    } else {
        format!("● {label}")
    };
    note(global, &line);
}

/// Status chatter goes to stderr so stdout stays pipeable.
fn note(global: &GlobalOpts, message: &str) {
    if !global.quiet {
        eprintln!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_commands_parse() {
        assert_eq!(parse_input("  "), None);
        assert_eq!(parse_input("p"), Some(Input::TogglePause));
        assert_eq!(parse_input("clear"), Some(Input::Clear));
        assert_eq!(
            parse_input("n  base "),
            Some(Input::Network("base".into()))
        );
        assert_eq!(parse_input("f 500"), Some(Input::MinFollowers(500)));
        assert_eq!(
            parse_input("f lots"),
            Some(Input::Unknown("f lots".into()))
        );
        assert_eq!(parse_input("n"), Some(Input::Unknown("n".into())));
        assert_eq!(parse_input("q"), Some(Input::Quit));
    }
}
