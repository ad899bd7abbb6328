//! Card materialization
//!
//! Turns documents plus metadata into cards: wire-form content with prompt
//! overrides applied and images rewritten, split into cards that already have
//! a remote id and cards that still need creating.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::attachments::{Attachment, ImageCollector};
use crate::document::{Direction, Document};
use crate::error::SyncError;
use crate::meta::MetaMap;

/// A card ready to be compared with, or pushed to, the remote store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub content: String,
    pub deck_name: String,
    pub attachments: Vec<Attachment>,
    pub path: PathBuf,
    pub direction: Direction,
}

/// Output of [`materialize`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Materialized {
    /// Cards with a remote id, keyed by that id
    pub existing: BTreeMap<String, Card>,
    /// Cards without one, in path order
    pub new: Vec<Card>,
}

/// Build the cards for every document
///
/// `root` is the cards root; document paths are relative to it and images
/// are resolved relative to each document's directory.
pub fn materialize(
    root: &Path,
    documents: &BTreeMap<PathBuf, Document>,
    meta: &MetaMap,
) -> Result<Materialized, SyncError> {
    let mut materialized = Materialized::default();

    for (path, document) in documents {
        let document_error = |source| SyncError::Document {
            path: path.clone(),
            source,
        };

        let base = root.join(path);
        let base = base.parent().unwrap_or(root);
        let mut images = ImageCollector::new(base);
        let document = document
            .rewrite_media_refs(|media| images.collect(media))
            .map_err(|source| SyncError::Attachment {
                path: path.clone(),
                source,
            })?;
        let attachments = images.into_attachments();

        let mut directions = vec![Direction::Forward];
        if document.has_reverse_prompt().map_err(document_error)? {
            directions.push(Direction::Backward);
        }

        for direction in directions {
            let content = document
                .oriented(direction)
                .and_then(|oriented| oriented.prompted())
                .map_err(document_error)?
                .to_wire();

            let card = Card {
                content,
                deck_name: deck_name(path),
                attachments: attachments.clone(),
                path: path.clone(),
                direction,
            };

            match meta.get(path).and_then(|m| m.get(direction)) {
                None => materialized.new.push(card),
                Some(id) => match materialized.existing.entry(id.to_string()) {
                    Entry::Occupied(entry) => {
                        return Err(SyncError::DuplicateCardId {
                            id: id.to_string(),
                            first: entry.get().path.clone(),
                            second: path.clone(),
                        })
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(card);
                    }
                },
            }
        }
    }

    debug!(
        existing = materialized.existing.len(),
        new = materialized.new.len(),
        "Materialized cards"
    );
    Ok(materialized)
}

/// The deck a document belongs to: the first segment of its path
pub fn deck_name(path: &Path) -> String {
    path.components()
        .next()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::Meta;
    use tempfile::TempDir;

    fn docs(entries: &[(&str, &str)]) -> BTreeMap<PathBuf, Document> {
        entries
            .iter()
            .map(|(path, text)| (PathBuf::from(path), Document::parse(text)))
            .collect()
    }

    fn ids(forward: Option<&str>, backward: Option<&str>) -> Meta {
        Meta {
            forward: forward.map(str::to_string),
            backward: backward.map(str::to_string),
        }
    }

    #[test]
    fn test_deck_name_is_first_segment() {
        assert_eq!(deck_name(Path::new("deck1/sub/a.md")), "deck1");
        assert_eq!(deck_name(Path::new("a.md")), "a.md");
    }

    #[test]
    fn test_new_and_existing_split() {
        let temp_dir = TempDir::new().unwrap();
        let documents = docs(&[
            ("deck1/a.md", "Q1\n\n---\n\nA1\n"),
            ("deck1/b.md", "Q2\n\n---\n\nA2\n\n! back\n"),
        ]);
        let mut meta = MetaMap::new();
        meta.insert("deck1/b.md".into(), ids(Some("id-b"), None));

        let cards = materialize(temp_dir.path(), &documents, &meta).unwrap();

        assert_eq!(cards.existing.len(), 1);
        let forward = &cards.existing["id-b"];
        assert_eq!(forward.content, "Q2\n\n---\n\nA2\n");
        assert_eq!(forward.direction, Direction::Forward);
        assert_eq!(forward.deck_name, "deck1");

        assert_eq!(cards.new.len(), 2);
        assert_eq!(cards.new[0].path, PathBuf::from("deck1/a.md"));
        assert_eq!(cards.new[1].direction, Direction::Backward);
        assert_eq!(cards.new[1].content, "A2\n\n*back*\n\n---\n\nQ2\n");
    }

    #[test]
    fn test_duplicate_id_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let documents = docs(&[
            ("deck1/a.md", "Q1\n\n---\n\nA1\n"),
            ("deck1/b.md", "Q2\n\n---\n\nA2\n"),
        ]);
        let mut meta = MetaMap::new();
        meta.insert("deck1/a.md".into(), ids(Some("same"), None));
        meta.insert("deck1/b.md".into(), ids(Some("same"), None));

        let err = materialize(temp_dir.path(), &documents, &meta).unwrap_err();
        assert!(matches!(err, SyncError::DuplicateCardId { id, .. } if id == "same"));
    }

    #[test]
    fn test_images_are_shared_by_both_directions() {
        let temp_dir = TempDir::new().unwrap();
        let deck = temp_dir.path().join("deck1");
        std::fs::create_dir(&deck).unwrap();
        image::RgbImage::new(4, 4).save(deck.join("pic.png")).unwrap();

        let documents = docs(&[("deck1/a.md", "![pic](pic.png)\n\n---\n\nA\n\n! rev\n")]);
        let cards = materialize(temp_dir.path(), &documents, &MetaMap::new()).unwrap();

        assert_eq!(cards.new.len(), 2);
        let (forward, backward) = (&cards.new[0], &cards.new[1]);
        assert!(forward.content.starts_with("![pic](@media/i00000000.png \""));
        assert!(backward.content.contains("![pic](@media/i00000000.png \""));
        assert_eq!(forward.attachments.len(), 1);
        assert_eq!(forward.attachments, backward.attachments);
    }

    #[test]
    fn test_missing_image_names_the_document() {
        let temp_dir = TempDir::new().unwrap();
        let documents = docs(&[("deck1/a.md", "![x](missing.png)\n\n---\n\nA\n")]);

        let err = materialize(temp_dir.path(), &documents, &MetaMap::new()).unwrap_err();
        assert!(matches!(err, SyncError::Attachment { path, .. } if path == PathBuf::from("deck1/a.md")));
    }

    #[test]
    fn test_structural_error_names_the_document() {
        let temp_dir = TempDir::new().unwrap();
        let documents = docs(&[("deck1/a.md", "Q\n\n---\n\nA\n\n---\n\nB\n")]);

        let err = materialize(temp_dir.path(), &documents, &MetaMap::new()).unwrap_err();
        assert!(matches!(err, SyncError::Document { .. }));
    }
}
