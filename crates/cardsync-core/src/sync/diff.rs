//! Remote diff
//!
//! Compares materialized cards with the fetched remote cards. Every card with
//! a local id must still exist remotely; remote cards without a local id are
//! removed.

use std::collections::BTreeMap;
use tracing::debug;

use crate::cards::Card;
use crate::config::DeckTable;
use crate::error::SyncError;
use crate::remote::RemoteCard;

/// Remote cards by id
pub type RemoteSet = BTreeMap<String, RemoteCard>;

/// Index fetched cards by id, rejecting cards sync cannot manage
pub fn index_remote(cards: Vec<RemoteCard>) -> Result<RemoteSet, SyncError> {
    let mut set = RemoteSet::new();
    for card in cards {
        if let Some(field) = card.unsupported_field() {
            return Err(SyncError::UnsupportedRemoteState {
                id: card.id,
                field: field.to_string(),
            });
        }
        set.insert(card.id.clone(), card);
    }
    Ok(set)
}

/// Mutations needed to bring the remote store in line with local cards
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteDiff {
    /// Cards whose content or deck differs, by remote id
    pub changed: BTreeMap<String, Card>,
    /// Remote cards no document claims
    pub removed: Vec<RemoteCard>,
    /// Cards to create
    pub new: Vec<Card>,
}

impl RemoteDiff {
    pub fn from_states(
        remote: &RemoteSet,
        existing: BTreeMap<String, Card>,
        new: Vec<Card>,
        decks: &DeckTable,
    ) -> Result<Self, SyncError> {
        for card in existing.values().chain(new.iter()) {
            if !decks.contains_key(&card.deck_name) {
                return Err(SyncError::UnknownDeck {
                    deck: card.deck_name.clone(),
                    path: card.path.clone(),
                });
            }
        }

        let mut changed = BTreeMap::new();
        for (id, card) in existing.iter() {
            let Some(current) = remote.get(id) else {
                return Err(SyncError::MissingRemoteCard {
                    id: id.clone(),
                    path: card.path.clone(),
                });
            };
            let deck_id = decks.get(&card.deck_name).map(String::as_str);
            if current.content != card.content || Some(current.deck_id.as_str()) != deck_id {
                changed.insert(id.clone(), card.clone());
            }
        }

        let removed: Vec<RemoteCard> = remote
            .values()
            .filter(|card| !existing.contains_key(&card.id))
            .cloned()
            .collect();

        debug!(
            changed = changed.len(),
            removed = removed.len(),
            new = new.len(),
            "Computed remote diff"
        );

        Ok(Self {
            changed,
            removed,
            new,
        })
    }

    pub fn count(&self) -> usize {
        self.changed.len() + self.removed.len() + self.new.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// One line per mutation, then a total
    pub fn summary(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.count() + 1);
        for (id, card) in &self.changed {
            lines.push(format!(
                "changed {} ({} {})",
                id,
                card.path.display(),
                card.direction
            ));
        }
        for card in &self.removed {
            lines.push(format!("removed {} ({})", card.id, first_line(&card.content)));
        }
        for card in &self.new {
            lines.push(format!("new ({} {})", card.path.display(), card.direction));
        }
        lines.push(format!(
            "{} items in diff: {} removed, {} changed, {} new cards",
            self.count(),
            self.removed.len(),
            self.changed.len(),
            self.new.len()
        ));
        lines
    }
}

fn first_line(content: &str) -> &str {
    content.lines().find(|line| !line.trim().is_empty()).unwrap_or("")
}
