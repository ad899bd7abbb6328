//! Fetch command handler

use anyhow::{Context, Result};
use std::path::Path;

use cardsync_core::{CardStore, RemoteCard};

use crate::output::Output;

/// Print one remote card; the raw record with --json
pub fn fetch(base: &Path, card_id: &str, output: &Output) -> Result<()> {
    let config = super::load_config(base)?;
    let client = super::client(base, &config)?;

    if output.is_json() {
        let card = client
            .retrieve_raw(card_id)
            .with_context(|| format!("Failed to fetch card {}", card_id))?;
        output.print_json(&card);
        return Ok(());
    }

    let card = client
        .retrieve_card(card_id)
        .with_context(|| format!("Failed to fetch card {}", card_id))?;
    let deck = config
        .decks
        .iter()
        .find(|(_, id)| **id == card.deck_id)
        .map(|(name, _)| name.as_str());
    output.message(&describe(&card, deck));
    Ok(())
}

fn describe(card: &RemoteCard, deck: Option<&str>) -> String {
    let mut out = format!("id:   {}\n", card.id);
    match deck {
        Some(name) => out.push_str(&format!("deck: {} ({})\n", name, card.deck_id)),
        None => out.push_str(&format!("deck: {} (not configured)\n", card.deck_id)),
    }
    if let Some(field) = card.unsupported_field() {
        out.push_str(&format!("note: {} is set, sync will refuse this card\n", field));
    }
    out.push('\n');
    out.push_str(card.content.trim_end());
    out
}
