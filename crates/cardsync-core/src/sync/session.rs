//! A full sync run
//!
//! Reads documents, reconciles local metadata, materializes cards, fetches
//! every remote card, diffs and applies. Two gates ask the caller for
//! confirmation: before rewriting local metadata and before touching the
//! remote store. Declining either aborts without changes.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::apply::{Applied, ApplyDiff};
use super::diff::{index_remote, RemoteDiff};
use crate::cards::materialize;
use crate::config::DeckTable;
use crate::error::SyncError;
use crate::meta::{intended_meta, MetaDiff, MetaStore};
use crate::remote::CardStore;
use crate::workspace::read_documents;

/// Points where a run waits for confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Local metadata is about to be rewritten
    LocalMeta,
    /// Remote mutations are about to be applied
    RemoteChanges,
}

/// Caller hooks for a sync run
pub trait SyncHandler {
    /// Approve the changes listed in `summary`; returning false aborts
    fn confirm(&mut self, gate: Gate, summary: &[String]) -> bool;

    /// Called after each applied mutation, once metadata is saved
    fn applied(&mut self, _applied: &Applied, _done: usize, _total: usize) {}
}

/// Approves everything
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

impl SyncHandler for AutoApprove {
    fn confirm(&mut self, _gate: Gate, _summary: &[String]) -> bool {
        true
    }
}

/// What a run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub documents: usize,
    pub meta_changes: usize,
    pub unchanged: usize,
    pub applied: Vec<Applied>,
}

/// One sync run over a cards root
pub struct SyncSession<'a, S: CardStore + ?Sized> {
    root: PathBuf,
    decks: &'a DeckTable,
    store: &'a S,
}

impl<'a, S: CardStore + ?Sized> SyncSession<'a, S> {
    pub fn new(root: &Path, decks: &'a DeckTable, store: &'a S) -> Self {
        Self {
            root: root.to_path_buf(),
            decks,
            store,
        }
    }

    pub fn run(&self, handler: &mut dyn SyncHandler) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();

        let documents = read_documents(&self.root, self.decks.keys())?;
        report.documents = documents.len();
        info!(count = documents.len(), root = %self.root.display(), "Read documents");

        let meta_store = MetaStore::new(&self.root);
        let persisted = meta_store.load()?;
        let meta = intended_meta(&documents, &persisted)?;

        let meta_diff = MetaDiff::between(&persisted, &meta);
        if !meta_diff.is_empty() {
            if !handler.confirm(Gate::LocalMeta, &meta_diff.summary()) {
                info!("Metadata changes declined");
                return Err(SyncError::UserDeclined);
            }
            meta_store.save(&meta)?;
            report.meta_changes = meta_diff.count();
            info!(changes = meta_diff.count(), "Saved local metadata changes");
        }

        let cards = materialize(&self.root, &documents, &meta)?;

        // The whole account: any remote card without a local document is removed
        let remote = index_remote(self.store.list_cards(None)?)?;
        info!(count = remote.len(), "Fetched remote cards");

        let existing = cards.existing.len();
        let diff = RemoteDiff::from_states(&remote, cards.existing, cards.new, self.decks)?;
        report.unchanged = existing - diff.changed.len();

        if diff.is_empty() {
            info!("Remote cards are up to date");
            return Ok(report);
        }
        if !handler.confirm(Gate::RemoteChanges, &diff.summary()) {
            info!("Remote changes declined");
            return Err(SyncError::UserDeclined);
        }

        let total = diff.count();
        let mut apply = ApplyDiff::new(self.store, self.decks, remote, diff, meta);
        while let Some(result) = apply.next() {
            let applied = result?;
            meta_store.save(apply.meta())?;
            debug!(%applied, "Saved metadata");
            handler.applied(&applied, report.applied.len() + 1, total);
            report.applied.push(applied);
        }

        info!(applied = report.applied.len(), "Sync finished");
        Ok(report)
    }
}
