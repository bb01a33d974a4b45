//! Colored terminal rendering for sync outcomes.

use owo_colors::OwoColorize;

use mirrorcal_core::sync::{PassSummary, TeardownSummary};

pub fn render_calendar(id: &str) -> String {
    format!("📅 {}", id)
}

pub fn render_pass(pass: &PassSummary) -> String {
    let header = render_calendar(pass.calendar_id.as_str());

    match &pass.aborted {
        Some(reason) => format!("{}\n   {}", header, format!("aborted: {}", reason).red()),
        None => {
            let mut parts = vec![
                count(pass.created, "created", Color::Green),
                count(pass.updated, "updated", Color::Yellow),
                count(pass.deleted, "deleted", Color::Red),
                format!("{} skipped", pass.skipped),
            ];
            if pass.errors > 0 {
                parts.push(format!("{} errors", pass.errors).red().to_string());
            }
            format!("{}\n   {}", header, parts.join(", "))
        }
    }
}

pub fn render_teardown(summary: &TeardownSummary) -> String {
    let mut line = format!(
        "{} remote deletes, {} records removed",
        summary.remote_deletes, summary.records_removed
    );
    if summary.failures > 0 {
        line.push_str(&format!(
            ", {}",
            format!("{} failures", summary.failures).red()
        ));
    }
    format!(
        "{}\n   {}",
        render_calendar(summary.calendar_id.as_str()),
        line
    )
}

enum Color {
    Green,
    Yellow,
    Red,
}

/// Colorize a count only when it is non-zero, so quiet passes stay quiet.
fn count(n: usize, label: &str, color: Color) -> String {
    let text = format!("{} {}", n, label);
    if n == 0 {
        return text;
    }
    match color {
        Color::Green => text.green().to_string(),
        Color::Yellow => text.yellow().to_string(),
        Color::Red => text.red().to_string(),
    }
}
