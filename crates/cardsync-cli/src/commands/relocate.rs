//! Rename and move command handlers

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use cardsync_core::{relocate, Relocation};

use crate::editor::edit_file;
use crate::output::Output;

/// Rename a document within its directory
pub fn rename(base: &Path, source: &Path, name: &str, edit: bool, output: &Output) -> Result<()> {
    let config = super::load_config(base)?;
    let root = config.cards_root();
    let target = renamed(source, name)?;

    let relocation = relocate(&root, source, &target)
        .with_context(|| format!("Failed to rename {:?}", source))?;
    report(&relocation, output);

    if edit {
        edit_file(&root.join(&relocation.target))?;
    }
    Ok(())
}

/// Move a document into another configured deck, keeping its path below the deck folder
pub fn move_to_deck(base: &Path, source: &Path, deck: &str, output: &Output) -> Result<()> {
    let config = super::load_config(base)?;
    if config.deck_id(deck).is_none() {
        bail!(
            "Unknown deck '{}'. Configured decks: {}",
            deck,
            config.decks.keys().cloned().collect::<Vec<_>>().join(", ")
        );
    }

    let root = config.cards_root();
    let target = in_deck(&root, source, deck)?;

    let relocation = relocate(&root, source, &target)
        .with_context(|| format!("Failed to move {:?} to deck {}", source, deck))?;
    report(&relocation, output);
    Ok(())
}

fn renamed(source: &Path, name: &str) -> Result<PathBuf> {
    let name = Path::new(name);
    if name.file_name() != Some(name.as_os_str()) {
        bail!("New name must be a file name, not a path: {:?}", name);
    }
    Ok(source.with_file_name(name))
}

/// Path of `source` when placed under `deck` instead of its current deck
fn in_deck(root: &Path, source: &Path, deck: &str) -> Result<PathBuf> {
    let root = root
        .canonicalize()
        .with_context(|| format!("Cards root {:?} is not accessible", root))?;
    let source = source
        .canonicalize()
        .with_context(|| format!("Source {:?} is not accessible", source))?;
    let relative = source
        .strip_prefix(&root)
        .with_context(|| format!("{:?} is not inside the cards root {:?}", source, root))?;

    let mut components = relative.components();
    if components.next().is_none() {
        bail!("{:?} is not inside a deck folder", source);
    }
    let rest = components.as_path();
    if rest.as_os_str().is_empty() {
        bail!("{:?} is a deck folder, not a document", source);
    }
    Ok(root.join(deck).join(rest))
}

fn report(relocation: &Relocation, output: &Output) {
    output.success(&format!(
        "Moved {} -> {}",
        relocation.source.display(),
        relocation.target.display()
    ));
    for (from, to) in &relocation.images {
        output.message(&format!("  image {} -> {}", from.display(), to.display()));
    }
}
