//! Image attachments
//!
//! Every image a document references is read from disk, scaled down to at
//! most `MAX_WIDTH` pixels wide, re-encoded as PNG and renamed to
//! `i00000000.png`, `i00000001.png`, ... The reference in the document is
//! rewritten to `@media/<name>` with the SHA-256 of the encoded bytes as its
//! title, so a changed image changes the card content.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::document::MediaRef;
use crate::storage::{self, StorageError};

/// Images wider than this are scaled down, keeping the aspect ratio
pub const MAX_WIDTH: u32 = 800;

/// Prefix of attachment references in card content
pub const MEDIA_PREFIX: &str = "@media/";

/// An encoded image ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Error, Debug)]
pub enum AttachmentError {
    #[error("Failed to read image: {0}")]
    Read(#[from] StorageError),

    #[error("Failed to decode image '{}': {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to encode image '{}' as PNG: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Collects the images of one document
///
/// Names are handed out in collection order, so rendering a document twice
/// with fresh collectors yields the same names.
#[derive(Debug)]
pub struct ImageCollector {
    base: PathBuf,
    next_index: usize,
    attachments: BTreeMap<String, Vec<u8>>,
}

impl ImageCollector {
    /// Create a collector resolving image paths relative to `base`
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            next_index: 0,
            attachments: BTreeMap::new(),
        }
    }

    /// Load, normalize and register the image behind `media`
    pub fn collect(&mut self, media: &MediaRef) -> Result<MediaRef, AttachmentError> {
        let local = self.base.join(&media.path);
        let name = format!("i{:08}.png", self.next_index);
        self.next_index += 1;

        let raw = storage::read_bytes(&local)?;
        let bytes = normalize(&local, &raw)?;
        let title = digest(&bytes);
        debug!(path = %local.display(), %name, size = bytes.len(), "Collected image");

        self.attachments.insert(name.clone(), bytes);

        Ok(MediaRef {
            path: format!("{}{}", MEDIA_PREFIX, name),
            title,
        })
    }

    pub fn into_attachments(self) -> Vec<Attachment> {
        self.attachments
            .into_iter()
            .map(|(name, bytes)| Attachment { name, bytes })
            .collect()
    }
}

/// Decode an image, scale it to `MAX_WIDTH` if wider, and encode as PNG
pub fn normalize(path: &Path, raw: &[u8]) -> Result<Vec<u8>, AttachmentError> {
    let image = image::load_from_memory(raw).map_err(|source| AttachmentError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let image = scale(image);

    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|source| AttachmentError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(bytes)
}

fn scale(image: DynamicImage) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    if width <= MAX_WIDTH {
        return image;
    }
    let target = scaled_height(width, height);
    image.resize_exact(MAX_WIDTH, target, FilterType::Lanczos3)
}

/// Height after scaling an image of `width` x `height` to `MAX_WIDTH` wide
pub fn scaled_height(width: u32, height: u32) -> u32 {
    let scaled = f64::from(height) * f64::from(MAX_WIDTH) / f64::from(width);
    (scaled.round() as u32).max(1)
}

/// Lowercase hex SHA-256 of `bytes`
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
