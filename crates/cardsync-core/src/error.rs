//! Sync errors
//!
//! Everything that aborts a sync run. Document and attachment failures carry
//! the path of the document they came from.

use std::path::PathBuf;
use thiserror::Error;

use crate::attachments::AttachmentError;
use crate::document::DocumentError;
use crate::remote::TransportError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid document '{}': {source}", .path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },

    #[error("Failed to prepare attachments for '{}': {source}", .path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: AttachmentError,
    },

    #[error(
        "Card id {id} is claimed by both '{}' and '{}'",
        .first.display(),
        .second.display()
    )]
    DuplicateCardId {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error(
        "Card {id} for '{}' no longer exists remotely. Remove its id from meta.json to recreate it.",
        .path.display()
    )]
    MissingRemoteCard { id: String, path: PathBuf },

    #[error("Remote card {id} has unsupported state: {field}")]
    UnsupportedRemoteState { id: String, field: String },

    #[error("Deck '{deck}' (for '{}') is not configured", .path.display())]
    UnknownDeck { deck: String, path: PathBuf },

    #[error("Sync cancelled")]
    UserDeclined,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SyncError {
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            SyncError::Storage(e) => e.recovery_suggestion(),
            SyncError::Transport(_) => {
                Some("Applied changes are already recorded in meta.json; run sync again to continue.")
            }
            SyncError::UnsupportedRemoteState { .. } => {
                Some("Unarchive or restore the card in Mochi, or delete it there; sync only handles plain cards.")
            }
            SyncError::Document { .. }
            | SyncError::Attachment { .. }
            | SyncError::DuplicateCardId { .. }
            | SyncError::MissingRemoteCard { .. }
            | SyncError::UnknownDeck { .. }
            | SyncError::UserDeclined => None,
        }
    }
}
