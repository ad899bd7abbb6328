//! Card metadata
//!
//! `meta.json` in the cards root maps every document path to the remote ids
//! of its forward and backward cards. It is the only record linking local
//! files to remote cards, so it is rewritten (atomically) after every change.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::document::{Direction, Document};
use crate::error::SyncError;
use crate::storage::{self, StorageError, StorageResult};

/// Remote ids of one document's cards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub forward: Option<String>,
    pub backward: Option<String>,
}

impl Meta {
    pub fn get(&self, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Forward => self.forward.as_deref(),
            Direction::Backward => self.backward.as_deref(),
        }
    }

    pub fn set(&mut self, direction: Direction, id: Option<String>) {
        match direction {
            Direction::Forward => self.forward = id,
            Direction::Backward => self.backward = id,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_none() && self.backward.is_none()
    }
}

/// Metadata for all documents, keyed by path relative to the cards root
pub type MetaMap = BTreeMap<PathBuf, Meta>;

/// The `meta.json` file
#[derive(Debug, Clone)]
pub struct MetaStore {
    path: PathBuf,
}

impl MetaStore {
    pub const FILE_NAME: &'static str = "meta.json";

    /// Store for the cards root `root`
    pub fn new(root: &Path) -> Self {
        Self {
            path: root.join(Self::FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load metadata; a missing file is an empty map
    pub fn load(&self) -> StorageResult<MetaMap> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No metadata file yet");
            return Ok(MetaMap::new());
        }

        let content = storage::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|e| StorageError::InvalidFormat {
            path: self.path.clone(),
            details: e.to_string(),
        })
    }

    /// Write metadata sorted by path with 4-space indentation
    pub fn save(&self, meta: &MetaMap) -> StorageResult<()> {
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut data = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut data, formatter);
        meta.serialize(&mut serializer)
            .map_err(|e| StorageError::InvalidFormat {
                path: self.path.clone(),
                details: e.to_string(),
            })?;
        data.push(b'\n');

        storage::atomic_write(&self.path, &data)?;
        debug!(path = %self.path.display(), entries = meta.len(), "Saved metadata");
        Ok(())
    }
}

/// The metadata the current documents call for
///
/// Forward ids carry over unchanged. Backward ids carry over only while the
/// document still has a reverse prompt. Entries for vanished documents are
/// dropped and new documents get an empty entry.
pub fn intended_meta(
    documents: &BTreeMap<PathBuf, Document>,
    persisted: &MetaMap,
) -> Result<MetaMap, SyncError> {
    let mut intended = MetaMap::new();

    for (path, document) in documents {
        let meta = match persisted.get(path) {
            None => Meta::default(),
            Some(stored) => {
                let has_reverse =
                    document
                        .has_reverse_prompt()
                        .map_err(|source| SyncError::Document {
                            path: path.clone(),
                            source,
                        })?;
                Meta {
                    forward: stored.forward.clone(),
                    backward: if has_reverse {
                        stored.backward.clone()
                    } else {
                        None
                    },
                }
            }
        };
        intended.insert(path.clone(), meta);
    }

    Ok(intended)
}

/// One changed `(path, direction)` slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaChange {
    pub path: PathBuf,
    pub direction: Direction,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl fmt::Display for MetaChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} -> {}",
            self.path.display(),
            self.direction,
            self.before.as_deref().unwrap_or("none"),
            self.after.as_deref().unwrap_or("none"),
        )
    }
}

/// Differences between two metadata maps, ordered by path then direction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaDiff {
    pub changes: Vec<MetaChange>,
}

impl MetaDiff {
    pub fn between(before: &MetaMap, after: &MetaMap) -> Self {
        let empty = Meta::default();
        let paths: std::collections::BTreeSet<&PathBuf> =
            before.keys().chain(after.keys()).collect();

        let changes = paths
            .into_iter()
            .flat_map(|path| {
                let old = before.get(path).unwrap_or(&empty);
                let new = after.get(path).unwrap_or(&empty);
                Direction::ALL.into_iter().filter_map(move |direction| {
                    let (was, will) = (old.get(direction), new.get(direction));
                    (was != will).then(|| MetaChange {
                        path: path.clone(),
                        direction,
                        before: was.map(str::to_string),
                        after: will.map(str::to_string),
                    })
                })
            })
            .collect();

        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn count(&self) -> usize {
        self.changes.len()
    }

    /// One line per change
    pub fn summary(&self) -> Vec<String> {
        self.changes.iter().map(ToString::to_string).collect()
    }
}
