use anyhow::{bail, Result};

use mirrorcal_core::event::CalendarId;

use crate::commands::build_engine;
use crate::config::MirrorcalConfig;
use crate::render;

pub fn enable(calendar: &str) -> Result<()> {
    let mut config = MirrorcalConfig::load()?;
    let Some(entry) = config.entry_mut(calendar) else {
        bail!("No calendar with id '{}' in config", calendar);
    };

    if entry.enabled {
        println!("Calendar '{}' is already enabled", calendar);
        return Ok(());
    }
    entry.enabled = true;
    config.save()?;

    println!("Enabled '{}'", calendar);
    println!("Run `mirrorcal sync` to mirror its current events");
    Ok(())
}

/// Disable a calendar: tear down its entire sync footprint (busy blocks it
/// received, busy blocks it caused elsewhere, all its ledger records), then
/// flip the config flag.
pub async fn disable(calendar: &str) -> Result<()> {
    let mut config = MirrorcalConfig::load()?;
    let Some(entry) = config.entry(calendar) else {
        bail!("No calendar with id '{}' in config", calendar);
    };
    if !entry.enabled {
        println!("Calendar '{}' is already disabled", calendar);
        return Ok(());
    }

    let (engine, provider) = build_engine(&config)?;
    let summary = engine
        .teardown_calendar(&provider, &CalendarId::new(calendar))
        .await?;
    println!("{}", render::render_teardown(&summary));

    if let Some(entry) = config.entry_mut(calendar) {
        entry.enabled = false;
    }
    config.save()?;

    println!("\nDisabled '{}'", calendar);
    if summary.failures > 0 {
        println!("Some remote deletes failed; remove those busy blocks manually");
    }
    Ok(())
}
