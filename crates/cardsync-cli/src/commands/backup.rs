//! Backup command handler

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};

use crate::editor::confirm;
use crate::output::Output;

/// File name of a deck backup taken on `date`
fn backup_file_name(deck_id: &str, date: NaiveDate) -> String {
    format!(
        "backup-mochi-deck-{}-from-{}.json",
        deck_id,
        date.format("%Y-%m-%d")
    )
}

/// Write the raw remote cards of each configured deck to the current directory
pub fn backup(base: &Path, output: &Output) -> Result<()> {
    let config = super::load_config(base)?;
    let client = super::client(base, &config)?;
    let today = Local::now().date_naive();

    for (deck, deck_id) in &config.decks {
        let path = PathBuf::from(backup_file_name(deck_id, today));

        if path.exists() {
            let overwrite = output.assume_yes
                || (output.should_prompt()
                    && confirm(&format!("{} already exists. Overwrite?", path.display()))?);
            if !overwrite {
                output.message(&format!("Skipped {}", deck));
                continue;
            }
        }

        let cards = client
            .list_raw(Some(deck_id))
            .with_context(|| format!("Failed to list cards of deck {}", deck))?;
        let content = serde_json::to_string_pretty(&cards).context("Failed to serialize backup")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write backup file: {:?}", path))?;

        output.success(&format!(
            "Backed up {} card(s) of {} to {}",
            cards.len(),
            deck,
            path.display()
        ));
    }

    Ok(())
}
