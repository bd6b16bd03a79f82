//! Rendering of an [`AggregationResult`].

use colored::Colorize;
use std::fmt::Write as _;
use std::io::Write;

use super::aggregate::AggregationResult;
use crate::error::Result;

/// Width the title column is padded or cut to.
pub const TITLE_WIDTH: usize = 40;

const RULE_WIDTH: usize = 60;
const EMPTY_MESSAGE: &str = "No team members with in-progress work";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

impl OutputMode {
    #[must_use]
    pub const fn from_json_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Text }
    }
}

/// Cut `title` to [`TITLE_WIDTH`] characters, ending in `...` when cut.
///
/// Counts chars, so multi-byte titles are never split mid-character.
#[must_use]
pub fn truncate_title(title: &str) -> String {
    if title.chars().count() <= TITLE_WIDTH {
        return title.to_string();
    }
    let mut cut: String = title.chars().take(TITLE_WIDTH - 3).collect();
    cut.push_str("...");
    cut
}

/// Pretty JSON, members in aggregator order.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_json(result: &AggregationResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Human-readable table, one block per member.
#[must_use]
pub fn render_text(result: &AggregationResult) -> String {
    let mut out = String::new();

    if result.is_empty() {
        let _ = writeln!(out, "{EMPTY_MESSAGE}");
        return out;
    }

    let _ = writeln!(
        out,
        "{} ({} members, {} issues)",
        "Team Work Distribution".bold(),
        result.members.len(),
        result.total_issues
    );
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));

    for member in &result.members {
        let _ = writeln!(
            out,
            "\n{} ({} issues):",
            member.github_username.bold(),
            member.in_progress_count
        );
        for issue in &member.issues {
            // Pad before coloring so escape codes do not count toward width.
            let title = format!("{:<width$}", truncate_title(&issue.title), width = TITLE_WIDTH);
            let _ = writeln!(
                out,
                "  {}  {}  {}",
                issue.id.cyan(),
                title,
                priority_label(issue.priority)
            );
        }
    }

    out
}

fn priority_label(priority: i32) -> colored::ColoredString {
    let label = format!("P{priority}");
    match priority {
        0 => label.red().bold(),
        1 => label.yellow(),
        _ => label.dimmed(),
    }
}

/// Write `result` to `out` in the given mode.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn print<W: Write>(result: &AggregationResult, mode: OutputMode, out: &mut W) -> Result<()> {
    match mode {
        OutputMode::Json => writeln!(out, "{}", render_json(result)?)?,
        OutputMode::Text => write!(out, "{}", render_text(result))?,
    }
    Ok(())
}
