use anyhow::{bail, Result};
use owo_colors::OwoColorize;

use mirrorcal_core::event::CalendarId;
use mirrorcal_core::record::{EventKind, LifecycleState};
use mirrorcal_core::store::EventStore;

use crate::commands::require_calendars;
use crate::config::{CalendarEntry, MirrorcalConfig};
use crate::render;

pub fn run(calendar: Option<&str>) -> Result<()> {
    let config = MirrorcalConfig::load()?;
    require_calendars(&config)?;

    let entries: Vec<&CalendarEntry> = match calendar {
        Some(id) => match config.entry(id) {
            Some(entry) => vec![entry],
            None => bail!("No calendar with id '{}' in config", id),
        },
        None => config.calendars.iter().collect(),
    };

    let store = EventStore::open(config.ledger_path())?;

    for (i, entry) in entries.iter().enumerate() {
        print_calendar(&store, entry);
        if i < entries.len() - 1 {
            println!();
        }
    }

    Ok(())
}

fn print_calendar(store: &EventStore, entry: &CalendarEntry) {
    let state = if entry.enabled {
        "enabled".green().to_string()
    } else {
        "disabled".red().to_string()
    };
    println!(
        "{} ({}, {})",
        render::render_calendar(&entry.id),
        entry.provider,
        state
    );

    if entry.peers.is_empty() {
        println!("   no linked calendars");
    } else {
        println!("   mirrors with: {}", entry.peers.join(", "));
    }

    let calendar_id = CalendarId::new(&entry.id);
    let user_events = store
        .list_by_calendar(&calendar_id, Some(EventKind::UserEvent))
        .len();
    let blocks = store.list_by_calendar(&calendar_id, Some(EventKind::BusyBlock));
    let pending = blocks
        .iter()
        .filter(|b| b.lifecycle == LifecycleState::Pending)
        .count();

    print!("   {} events tracked, {} busy blocks", user_events, blocks.len());
    if pending > 0 {
        print!(", {}", format!("{} pending", pending).yellow());
    }
    println!();
}
