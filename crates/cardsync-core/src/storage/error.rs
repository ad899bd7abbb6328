//! Local file errors
//!
//! Every failure touching the cards root (documents, images, `meta.json`)
//! is classified here so the CLI can say what went wrong and what to do.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{}': {source}", .path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Permission denied: cannot access '{}'", .path.display())]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No space left while writing '{}'", .path.display())]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `meta.json` exists but is not a path to card-id mapping
    #[error("Invalid format in '{}': {details}", .path.display())]
    InvalidFormat { path: PathBuf, details: String },

    #[error("File not found: '{}'", .path.display())]
    NotFound { path: PathBuf },

    /// A deck folder could not be walked
    #[error("Failed to walk '{}': {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// The temp file was written but could not replace the target
    #[error(
        "Could not move '{}' into place at '{}': {source}",
        .from.display(),
        .to.display()
    )]
    AtomicWriteFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Clone, Copy)]
enum Access {
    Read,
    Write,
}

impl StorageError {
    /// Classify an I/O error raised while writing `path`
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        classify(error, path, Access::Write)
    }

    /// Classify an I/O error raised while reading `path`
    pub fn from_read(error: io::Error, path: PathBuf) -> Self {
        classify(error, path, Access::Read)
    }

    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::DiskFull { .. } => Some("Free up disk space and run sync again."),
            StorageError::PermissionDenied { .. } => {
                Some("Check permissions on the cards directory and meta.json.")
            }
            StorageError::InvalidFormat { .. } => Some(
                "Restore meta.json from version control. Deleting it makes every card look new and duplicates them remotely.",
            ),
            StorageError::AtomicWriteFailed { .. } => {
                Some("meta.json still holds the last saved state; run sync again to continue.")
            }
            StorageError::CreateDirectory { .. }
            | StorageError::Read { .. }
            | StorageError::Write { .. }
            | StorageError::NotFound { .. }
            | StorageError::Walk { .. } => None,
        }
    }
}

fn classify(error: io::Error, path: PathBuf, access: Access) -> StorageError {
    match (error.kind(), access) {
        (io::ErrorKind::PermissionDenied, _) => StorageError::PermissionDenied {
            path,
            source: error,
        },
        (io::ErrorKind::NotFound, _) => StorageError::NotFound { path },
        (_, Access::Write) if is_disk_full(&error) => StorageError::DiskFull {
            path,
            source: error,
        },
        (_, Access::Write) => StorageError::Write {
            path,
            source: error,
        },
        (_, Access::Read) => StorageError::Read {
            path,
            source: error,
        },
    }
}

// io::ErrorKind::StorageFull is not stable; fall back to the message
fn is_disk_full(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    ["no space left", "disk full", "quota exceeded", "not enough space"]
        .iter()
        .any(|needle| msg.contains(needle))
}

pub type StorageResult<T> = Result<T, StorageError>;
