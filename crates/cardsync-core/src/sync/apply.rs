//! Applying a remote diff
//!
//! [`ApplyDiff`] performs one remote mutation per call to `next`, in a fixed
//! order: changed cards, then removed cards, then new cards. After each item
//! the caller persists [`ApplyDiff::meta`] before pulling the next one, so an
//! interrupted run loses at most the mutation in flight. A rerun re-derives
//! the remaining work from whatever metadata was saved.

use std::collections::{btree_map, VecDeque};
use std::path::PathBuf;
use tracing::{debug, info};

use super::diff::{RemoteDiff, RemoteSet};
use crate::cards::Card;
use crate::config::DeckTable;
use crate::document::Direction;
use crate::error::SyncError;
use crate::meta::MetaMap;
use crate::remote::{CardStore, CardUpdate, RemoteCard};

/// One applied mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Updated {
        id: String,
        path: PathBuf,
        direction: Direction,
    },
    Deleted {
        id: String,
    },
    Created {
        id: String,
        path: PathBuf,
        direction: Direction,
    },
}

impl std::fmt::Display for Applied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Applied::Updated {
                id,
                path,
                direction,
            } => write!(f, "updated {} from {} {}", id, path.display(), direction),
            Applied::Deleted { id } => write!(f, "deleted {}", id),
            Applied::Created {
                id,
                path,
                direction,
            } => write!(f, "created {} from {} {}", id, path.display(), direction),
        }
    }
}

/// Lazily applies a [`RemoteDiff`]
///
/// Stops for good after the first error.
pub struct ApplyDiff<'a, S: CardStore + ?Sized> {
    store: &'a S,
    decks: &'a DeckTable,
    remote: RemoteSet,
    meta: MetaMap,
    changed: btree_map::IntoIter<String, Card>,
    removed: std::vec::IntoIter<RemoteCard>,
    new: VecDeque<Card>,
    failed: bool,
}

impl<'a, S: CardStore + ?Sized> ApplyDiff<'a, S> {
    pub fn new(
        store: &'a S,
        decks: &'a DeckTable,
        remote: RemoteSet,
        diff: RemoteDiff,
        meta: MetaMap,
    ) -> Self {
        Self {
            store,
            decks,
            remote,
            meta,
            changed: diff.changed.into_iter(),
            removed: diff.removed.into_iter(),
            new: diff.new.into(),
            failed: false,
        }
    }

    /// Remote state after the mutations applied so far
    pub fn remote(&self) -> &RemoteSet {
        &self.remote
    }

    /// Metadata after the mutations applied so far
    pub fn meta(&self) -> &MetaMap {
        &self.meta
    }

    /// Mutations not yet attempted
    pub fn remaining(&self) -> usize {
        if self.failed {
            return 0;
        }
        self.changed.len() + self.removed.len() + self.new.len()
    }

    fn deck_id(&self, card: &Card) -> Result<String, SyncError> {
        self.decks
            .get(&card.deck_name)
            .cloned()
            .ok_or_else(|| SyncError::UnknownDeck {
                deck: card.deck_name.clone(),
                path: card.path.clone(),
            })
    }

    fn update(&mut self, id: String, card: Card) -> Result<Applied, SyncError> {
        let deck_id = self.deck_id(&card)?;
        for attachment in &card.attachments {
            self.store.upload_attachment(&id, attachment)?;
        }
        let updated = self.store.update_card(
            &id,
            &CardUpdate {
                content: card.content,
                deck_id,
            },
        )?;
        info!(%id, path = %card.path.display(), direction = %card.direction, "Updated card");
        self.remote.insert(updated.id.clone(), updated);

        Ok(Applied::Updated {
            id,
            path: card.path,
            direction: card.direction,
        })
    }

    fn delete(&mut self, card: RemoteCard) -> Result<Applied, SyncError> {
        self.store.delete_card(&card.id)?;
        info!(id = %card.id, "Deleted card");
        self.remote.remove(&card.id);
        Ok(Applied::Deleted { id: card.id })
    }

    fn create(&mut self, card: Card) -> Result<Applied, SyncError> {
        let deck_id = self.deck_id(&card)?;
        let created = self.store.create_card(&deck_id, &card.content)?;
        for attachment in &card.attachments {
            self.store.upload_attachment(&created.id, attachment)?;
        }
        info!(id = %created.id, path = %card.path.display(), direction = %card.direction, "Created card");

        self.meta
            .entry(card.path.clone())
            .or_default()
            .set(card.direction, Some(created.id.clone()));
        let id = created.id.clone();
        self.remote.insert(id.clone(), created);

        Ok(Applied::Created {
            id,
            path: card.path,
            direction: card.direction,
        })
    }
}

impl<S: CardStore + ?Sized> Iterator for ApplyDiff<'_, S> {
    type Item = Result<Applied, SyncError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let result = if let Some((id, card)) = self.changed.next() {
            self.update(id, card)
        } else if let Some(card) = self.removed.next() {
            self.delete(card)
        } else if let Some(card) = self.new.pop_front() {
            self.create(card)
        } else {
            return None;
        };

        if let Err(e) = &result {
            debug!(error = %e, "Stopping after failed mutation");
            self.failed = true;
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining()))
    }
}

impl<S: CardStore + ?Sized> std::iter::FusedIterator for ApplyDiff<'_, S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::Attachment;
    use crate::meta::Meta;
    use crate::remote::{Call, MemoryCardStore};
    use std::collections::BTreeMap;

    fn decks() -> DeckTable {
        [("deck1".to_string(), "D1".to_string())].into_iter().collect()
    }

    fn card(path: &str, content: &str) -> Card {
        Card {
            content: content.to_string(),
            deck_name: "deck1".to_string(),
            attachments: vec![],
            path: PathBuf::from(path),
            direction: Direction::Forward,
        }
    }

    #[test]
    fn test_single_new_card_creates_and_records_id() {
        let store = MemoryCardStore::new();
        let decks = decks();
        let diff = RemoteDiff {
            new: vec![card("deck1/a.md", "Q\n---\nA")],
            ..RemoteDiff::default()
        };

        let mut apply = ApplyDiff::new(&store, &decks, RemoteSet::new(), diff, MetaMap::new());
        let applied = apply.next().unwrap().unwrap();
        assert!(apply.next().is_none());

        assert_eq!(
            store.calls(),
            vec![Call::Create {
                deck_id: "D1".to_string(),
                content: "Q\n---\nA".to_string()
            }]
        );
        assert_eq!(
            applied,
            Applied::Created {
                id: "card0001".to_string(),
                path: PathBuf::from("deck1/a.md"),
                direction: Direction::Forward,
            }
        );
        assert_eq!(
            apply.meta()[&PathBuf::from("deck1/a.md")].forward.as_deref(),
            Some("card0001")
        );
        assert!(apply.remote().contains_key("card0001"));
    }

    #[test]
    fn test_phase_order_is_changed_removed_new() {
        let store = MemoryCardStore::with_cards([
            RemoteCard::new("old", "D1", "stale"),
            RemoteCard::new("orphan", "D1", "orphan"),
        ]);
        let remote: RemoteSet = store.cards();
        let decks = decks();
        let mut with_image = card("deck1/b.md", "fresh");
        with_image.attachments.push(Attachment {
            name: "i00000000.png".to_string(),
            bytes: vec![1],
        });
        let diff = RemoteDiff {
            changed: [("old".to_string(), with_image)].into_iter().collect(),
            removed: vec![RemoteCard::new("orphan", "D1", "orphan")],
            new: vec![card("deck1/c.md", "brand new")],
        };

        let apply = ApplyDiff::new(&store, &decks, remote, diff, MetaMap::new());
        let applied: Vec<Applied> = apply.map(Result::unwrap).collect();

        assert_eq!(applied.len(), 3);
        let calls = store.calls();
        assert!(matches!(&calls[0], Call::Upload { card_id, .. } if card_id == "old"));
        assert!(matches!(&calls[1], Call::Update { id, .. } if id == "old"));
        assert!(matches!(&calls[2], Call::Delete { id } if id == "orphan"));
        assert!(matches!(&calls[3], Call::Create { .. }));
        assert_eq!(store.card("old").unwrap().content, "fresh");
        assert!(store.card("orphan").is_none());
    }

    #[test]
    fn test_stops_after_failure() {
        let store = MemoryCardStore::new();
        store.fail_after(1);
        let decks = decks();
        let diff = RemoteDiff {
            new: vec![
                card("deck1/a.md", "a"),
                card("deck1/b.md", "b"),
                card("deck1/c.md", "c"),
            ],
            ..RemoteDiff::default()
        };

        let mut apply = ApplyDiff::new(&store, &decks, RemoteSet::new(), diff, MetaMap::new());
        assert_eq!(apply.remaining(), 3);
        assert!(apply.next().unwrap().is_ok());
        assert!(matches!(
            apply.next().unwrap().unwrap_err(),
            SyncError::Transport(_)
        ));
        assert!(apply.next().is_none());
        assert_eq!(apply.remaining(), 0);

        let expected: BTreeMap<PathBuf, Meta> = [(
            PathBuf::from("deck1/a.md"),
            Meta {
                forward: Some("card0001".to_string()),
                backward: None,
            },
        )]
        .into_iter()
        .collect();
        assert_eq!(apply.meta(), &expected);
    }
}
