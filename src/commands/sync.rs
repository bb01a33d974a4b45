use anyhow::Result;
use owo_colors::OwoColorize;

use crate::commands::{build_engine, require_calendars};
use crate::config::MirrorcalConfig;
use crate::render;

pub async fn run() -> Result<()> {
    let config = MirrorcalConfig::load()?;
    require_calendars(&config)?;

    let (engine, provider) = build_engine(&config)?;
    let summary = engine.run(&provider).await;

    for (i, pass) in summary.0.iter().enumerate() {
        println!("{}", render::render_pass(pass));
        if i < summary.0.len() - 1 {
            println!();
        }
    }

    let (created, updated, deleted, skipped, errors) = summary.totals();
    println!(
        "\nSynced: {} created, {} updated, {} deleted, {} skipped",
        created, updated, deleted, skipped
    );
    if errors > 0 {
        println!(
            "{}",
            format!("{} errors; failed items are retried on the next run", errors).red()
        );
    }

    let aborted = summary.aborted_calendars();
    if !aborted.is_empty() {
        anyhow::bail!(
            "{} calendar(s) could not be synced; see output above",
            aborted.len()
        );
    }

    Ok(())
}
