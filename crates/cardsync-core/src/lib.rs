//! cardsync Core Library
//!
//! This crate keeps a directory of markdown flashcards in sync with a remote
//! card store. Each document holds a question and an answer separated by a
//! `---` rule; documents whose answer carries a prompt override (`! ...`,
//! `prompt: ...`) additionally produce a reversed card.
//!
//! # Architecture
//!
//! A sync run is a fixed, sequential pipeline:
//!
//! 1. Parse documents (`document`) and compute the intended metadata
//!    (`meta`). Any difference from the persisted metadata needs confirmation.
//! 2. Materialize cards (`cards`), normalizing referenced images on the way
//!    (`attachments`).
//! 3. Fetch the remote cards (`remote`) and diff them against the local set
//!    (`sync::diff`).
//! 4. Apply the diff one mutation at a time (`sync::apply`), persisting the
//!    metadata after each one so an interrupted run can simply be restarted.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load(&base)?;
//! let credentials = Credentials::load(&base)?;
//! let client = MochiClient::new(config.api_url(), &credentials.mochi.token)?;
//!
//! let session = SyncSession::new(&config.cards_root(), &config.decks, &client);
//! let report = session.run(&mut AutoApprove)?;
//! ```
//!
//! # Modules
//!
//! - `config`: Configuration and credentials
//! - `document`: Markdown document model and serialization
//! - `attachments`: Image normalization and naming
//! - `meta`: Card id bookkeeping and the local metadata diff
//! - `cards`: Card materialization
//! - `remote`: Remote card store trait and implementations
//! - `sync`: Remote diff, apply engine and the sync session
//! - `storage`: Atomic file persistence
//! - `workspace`: Document discovery and the relocate utility

pub mod attachments;
pub mod cards;
pub mod config;
pub mod document;
pub mod error;
pub mod meta;
pub mod remote;
pub mod storage;
pub mod sync;
pub mod workspace;

pub use attachments::{Attachment, AttachmentError, ImageCollector};
pub use cards::{materialize, Card, Materialized};
pub use config::{Config, Credentials, DeckTable};
pub use document::{Direction, Document, DocumentError, MediaRef};
pub use error::SyncError;
pub use meta::{intended_meta, Meta, MetaChange, MetaDiff, MetaMap, MetaStore};
pub use remote::{CardStore, CardUpdate, MemoryCardStore, MochiClient, RemoteCard, TransportError};
pub use storage::StorageError;
pub use sync::{
    Applied, ApplyDiff, AutoApprove, Gate, RemoteDiff, RemoteSet, SyncHandler, SyncReport,
    SyncSession,
};
pub use workspace::{read_documents, relocate, RelocateError, Relocation};
