//! Sync command handler

use anyhow::{Context, Result};
use std::path::Path;
use tracing::warn;

use cardsync_core::{Applied, Gate, SyncHandler, SyncSession};

use crate::editor::confirm;
use crate::output::Output;

/// Bridges confirmation gates and progress to the terminal
struct TerminalHandler<'a> {
    output: &'a Output,
}

impl SyncHandler for TerminalHandler<'_> {
    fn confirm(&mut self, gate: Gate, summary: &[String]) -> bool {
        let title = match gate {
            Gate::LocalMeta => "Local metadata changes:",
            Gate::RemoteChanges => "Remote changes:",
        };
        self.output.print_summary(title, summary);

        if self.output.assume_yes {
            return true;
        }
        if !self.output.should_prompt() {
            warn!("Confirmation needed; pass --yes to apply changes without a prompt");
            return false;
        }
        confirm("Continue?").unwrap_or_else(|e| {
            warn!(error = %e, "Could not read confirmation");
            false
        })
    }

    fn applied(&mut self, applied: &Applied, done: usize, total: usize) {
        self.output.print_applied(applied, done, total);
    }
}

/// Sync every configured deck
pub fn sync(base: &Path, output: &Output) -> Result<()> {
    let config = super::load_config(base)?;
    let client = super::client(base, &config)?;
    let root = config.cards_root();

    let session = SyncSession::new(&root, &config.decks, &client);
    let mut handler = TerminalHandler { output };
    let report = session
        .run(&mut handler)
        .with_context(|| format!("Sync of {:?} failed", root))?;

    output.print_report(&report);
    Ok(())
}
