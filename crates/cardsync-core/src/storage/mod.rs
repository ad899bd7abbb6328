//! Storage layer
//!
//! File persistence shared by the metadata store and the relocate utility.
//!
//! All writes go through `atomic_write`: the data is written to a temporary
//! file next to the target, synced, and renamed into place, so a crash never
//! leaves a half-written metadata file behind.

pub mod error;
pub mod persistence;

pub use error::{StorageError, StorageResult};
pub use persistence::{atomic_write, copy_file, read_bytes, read_to_string, remove_file};
