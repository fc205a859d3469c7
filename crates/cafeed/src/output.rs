//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Local};
use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use cafeed_core::CaEvent;

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

const TEXT_WIDTH: usize = 60;

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable items in the chosen format.
///
/// - `table`: uses the `Tabled` row built by `to_row`
/// - `json` / `json-compact` / `yaml`: serializes the original data
/// - `plain`: calls `id_fn` on each item to emit one identifier per line
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(data.iter().map(&id_fn).collect::<Vec<_>>().join("\n")),
    }
}

/// Render a single item. Table output uses `detail_fn` since detail
/// views are free-form text.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(id_fn(data)),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

pub(crate) fn render_json<T: serde::Serialize + ?Sized>(
    data: &T,
    compact: bool,
) -> Result<String, CliError> {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.map_err(|e| CliError::Render {
        reason: e.to_string(),
    })
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_yaml::to_string(data).map_err(|e| CliError::Render {
        reason: e.to_string(),
    })
}

// ── Event rows ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub struct EventRow {
    #[tabled(rename = "Received")]
    pub received: String,
    #[tabled(rename = "Author")]
    pub author: String,
    #[tabled(rename = "Followers")]
    pub followers: u64,
    #[tabled(rename = "Tokens")]
    pub tokens: String,
    #[tabled(rename = "Mentions")]
    pub mentions: u64,
    #[tabled(rename = "Text")]
    pub text: String,
}

impl From<&CaEvent> for EventRow {
    fn from(event: &CaEvent) -> Self {
        let p = &event.payload;
        Self {
            received: format_millis(event.received_at, "%Y-%m-%d %H:%M:%S"),
            author: format!("@{}", event.author()),
            followers: p.user.followers_count,
            tokens: token_labels(event).join(", "),
            mentions: p.stats.mention_count,
            text: truncate(&p.tweet.text, TEXT_WIDTH),
        }
    }
}

/// Symbol if known, else a shortened address.
fn token_labels(event: &CaEvent) -> Vec<String> {
    event
        .payload
        .tokens
        .iter()
        .map(|t| match t.symbol {
            Some(ref symbol) => format!("${symbol}"),
            None => short_address(&t.address),
        })
        .collect()
}

/// First mentioned address, for `--output plain`.
pub fn primary_address(event: &CaEvent) -> String {
    event
        .payload
        .tokens
        .first()
        .map(|t| t.address.clone())
        .unwrap_or_default()
}

/// One line per event for the live view.
pub fn event_line(event: &CaEvent, color: bool) -> String {
    let time = format_millis(event.received_at, "%H:%M:%S");
    let author = format!("@{}", event.author());
    let tokens = token_labels(event).join(" ");
    let text = truncate(&event.payload.tweet.text, TEXT_WIDTH);

    if color {
        format!(
            "{}  {}  {}  {}",
            time.dimmed(),
            author.cyan(),
            tokens.yellow().bold(),
            text
        )
    } else {
        format!("{time}  {author}  {tokens}  {text}")
    }
}

pub fn format_millis(millis: i64, pattern: &str) -> String {
    DateTime::from_timestamp_millis(millis).map_or_else(
        || "-".into(),
        |utc| utc.with_timezone(&Local).format(pattern).to_string(),
    )
}

fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 12 {
        return address.into();
    }
    let head: String = chars.iter().take(4).collect();
    let tail: String = chars.iter().skip(chars.len() - 4).collect();
    format!("{head}…{tail}")
}

fn truncate(text: &str, width: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= width {
        return flat;
    }
    let mut cut: String = flat.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_addresses_are_shortened() {
        assert_eq!(
            short_address("So11111111111111111111111111111111111111112"),
            "So11…1112"
        );
        assert_eq!(short_address("0xabc"), "0xabc");
    }

    #[test]
    fn text_is_flattened_and_truncated() {
        assert_eq!(truncate("gm\n  gm", 10), "gm gm");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn plain_list_is_one_id_per_line() {
        let out = render_list(
            OutputFormat::Plain,
            &["a", "b"],
            |_| EventRow {
                received: String::new(),
                author: String::new(),
                followers: 0,
                tokens: String::new(),
                mentions: 0,
                text: String::new(),
            },
            |s| (*s).to_owned(),
        );
        assert!(matches!(out.as_deref(), Ok("a\nb")));
    }
}
