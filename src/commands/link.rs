use anyhow::{bail, Result};

use crate::config::MirrorcalConfig;

/// Link two configured calendars so each mirrors the other.
pub fn link(a: &str, b: &str) -> Result<()> {
    if a == b {
        bail!("Cannot link calendar '{}' to itself", a);
    }

    let mut config = MirrorcalConfig::load()?;
    for id in [a, b] {
        if config.entry(id).is_none() {
            bail!(
                "No calendar with id '{}' in config. Add a [[calendars]] entry for it first",
                id
            );
        }
    }

    add_peer(&mut config, a, b);
    add_peer(&mut config, b, a);
    config.save()?;

    println!("Linked {} ↔ {}", a, b);
    println!("Run `mirrorcal sync` to create the busy blocks");
    Ok(())
}

/// Remove the link in both directions. Existing busy blocks are cleaned up
/// on the next sync once their source calendar no longer lists the peer.
pub fn unlink(a: &str, b: &str) -> Result<()> {
    let mut config = MirrorcalConfig::load()?;

    remove_peer(&mut config, a, b);
    remove_peer(&mut config, b, a);
    config.save()?;

    println!("Unlinked {} ↔ {}", a, b);
    Ok(())
}

fn add_peer(config: &mut MirrorcalConfig, id: &str, peer: &str) {
    if let Some(entry) = config.entry_mut(id) {
        if !entry.peers.iter().any(|p| p == peer) {
            entry.peers.push(peer.to_string());
        }
    }
}

fn remove_peer(config: &mut MirrorcalConfig, id: &str, peer: &str) {
    if let Some(entry) = config.entry_mut(id) {
        entry.peers.retain(|p| p != peer);
    }
}
