//! Cards root on disk
//!
//! Each configured deck is a folder directly under the cards root holding
//! markdown documents, in any depth of subfolders, next to their images.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::document::Document;
use crate::meta::MetaStore;
use crate::storage::{self, StorageError};

/// Parse every `*.md` file under the given deck folders
///
/// Keys are paths relative to `root`. Missing deck folders contribute
/// nothing.
pub fn read_documents<I>(root: &Path, decks: I) -> Result<BTreeMap<PathBuf, Document>, StorageError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut documents = BTreeMap::new();

    for deck in decks {
        let folder = root.join(deck.as_ref());
        if !folder.is_dir() {
            debug!(folder = %folder.display(), "Deck folder missing, skipping");
            continue;
        }

        for entry in WalkDir::new(&folder).sort_by_file_name() {
            let entry = entry.map_err(|source| StorageError::Walk {
                path: folder.clone(),
                source,
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "md") {
                continue;
            }

            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let text = storage::read_to_string(path)?;
            documents.insert(relative.to_path_buf(), Document::parse(&text));
        }
    }

    Ok(documents)
}

/// Local image paths referenced by a document, relative to its directory
pub fn image_paths(document: &Document) -> Vec<PathBuf> {
    document
        .media_refs()
        .into_iter()
        .filter(|media| !media.path.contains("://"))
        .map(|media| PathBuf::from(media.path))
        .collect()
}

#[derive(Error, Debug)]
pub enum RelocateError {
    #[error("Source '{}' does not exist", .0.display())]
    SourceMissing(PathBuf),

    #[error("Target '{}' already exists", .0.display())]
    TargetExists(PathBuf),

    #[error("'{}' is not inside the cards root '{}'", .path.display(), .root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Source and target are the same")]
    SameLocation,

    #[error("'{}' has no entry in {}", .0.display(), MetaStore::FILE_NAME)]
    NotTracked(PathBuf),

    #[error("Image '{}' already exists", .0.display())]
    ImageExists(PathBuf),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result of a relocation, with paths relative to the cards root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub source: PathBuf,
    pub target: PathBuf,
    /// Images copied next to the target, as (from, to)
    pub images: Vec<(PathBuf, PathBuf)>,
}

/// Move or rename a tracked document, keeping its card ids
///
/// When the document changes directory its images move along with it.
/// Everything is copied and `meta.json` saved before any source file is
/// removed, so a failure leaves either the old layout or a tracked target.
pub fn relocate(root: &Path, source: &Path, target: &Path) -> Result<Relocation, RelocateError> {
    if !source.exists() {
        return Err(RelocateError::SourceMissing(source.to_path_buf()));
    }
    if target.exists() {
        return Err(RelocateError::TargetExists(target.to_path_buf()));
    }

    let root = root
        .canonicalize()
        .map_err(|e| StorageError::from_read(e, root.to_path_buf()))?;
    let source = within(&root, &resolve(source)?)?;
    let target = within(&root, &resolve(target)?)?;
    if source == target {
        return Err(RelocateError::SameLocation);
    }

    let meta_store = MetaStore::new(&root);
    let mut meta = meta_store.load()?;
    let entry = meta
        .remove(&source)
        .ok_or_else(|| RelocateError::NotTracked(source.clone()))?;
    meta.insert(target.clone(), entry);

    let source_dir = source.parent().unwrap_or(Path::new(""));
    let target_dir = target.parent().unwrap_or(Path::new(""));
    let moves_directory = source_dir != target_dir;

    let document = Document::parse(&storage::read_to_string(&root.join(&source))?);
    let mut images = Vec::new();
    if moves_directory {
        let mut seen = BTreeSet::new();
        for image in image_paths(&document) {
            let from = confined(&root, source_dir, &image)?;
            let to = confined(&root, target_dir, &image)?;
            if seen.insert(from.clone()) {
                images.push((from, to));
            }
        }
    }

    for (from, to) in &images {
        if !root.join(from).is_file() {
            return Err(StorageError::NotFound {
                path: root.join(from),
            }
            .into());
        }
        if root.join(to).exists() {
            return Err(RelocateError::ImageExists(to.clone()));
        }
    }

    storage::copy_file(&root.join(&source), &root.join(&target))?;
    for (from, to) in &images {
        storage::copy_file(&root.join(from), &root.join(to))?;
        debug!(from = %from.display(), to = %to.display(), "Copied image");
    }
    meta_store.save(&meta)?;

    storage::remove_file(&root.join(&source))?;
    for (from, _) in &images {
        storage::remove_file(&root.join(from))?;
    }
    info!(source = %source.display(), target = %target.display(), "Relocated document");

    Ok(Relocation {
        source,
        target,
        images,
    })
}

/// Absolute path with symlinks resolved in its existing ancestors
fn resolve(path: &Path) -> Result<PathBuf, StorageError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| StorageError::from_read(e, path.to_path_buf()))?
            .join(path)
    };

    let mut existing = absolute.as_path();
    let mut rest = Vec::new();
    while !existing.exists() {
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = existing
        .canonicalize()
        .map_err(|e| StorageError::from_read(e, existing.to_path_buf()))?;
    for name in rest.into_iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

/// `image` as referenced from `dir`, relative to the root
///
/// Resolved lexically; references climbing above the root are refused.
fn confined(root: &Path, dir: &Path, image: &Path) -> Result<PathBuf, RelocateError> {
    let outside = || RelocateError::OutsideRoot {
        path: root.join(dir).join(image),
        root: root.to_path_buf(),
    };

    let mut normalized = PathBuf::new();
    for component in dir.join(image).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(outside());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(outside()),
        }
    }
    if normalized.as_os_str().is_empty() {
        return Err(outside());
    }
    Ok(normalized)
}

/// `path` relative to `root`, if it lies inside it
fn within(root: &Path, path: &Path) -> Result<PathBuf, RelocateError> {
    let outside = || RelocateError::OutsideRoot {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    };
    let relative = path.strip_prefix(root).map_err(|_| outside())?;
    if relative.as_os_str().is_empty()
        || relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
    {
        return Err(outside());
    }
    Ok(relative.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{Meta, MetaMap};
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, path: &str, content: &str) {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn track(root: &Path, path: &str, id: &str) {
        let store = MetaStore::new(root);
        let mut meta = store.load().unwrap();
        meta.insert(
            PathBuf::from(path),
            Meta {
                forward: Some(id.to_string()),
                backward: None,
            },
        );
        store.save(&meta).unwrap();
    }

    #[test]
    fn test_read_documents_only_configured_decks() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "deck1/b.md", "B\n\n---\n\nb\n");
        write(root, "deck1/sub/a.md", "A\n\n---\n\na\n");
        write(root, "deck1/notes.txt", "ignored");
        write(root, "other/c.md", "C\n\n---\n\nc\n");

        let documents = read_documents(root, ["deck1", "missing"]).unwrap();

        assert_eq!(
            documents.keys().cloned().collect::<Vec<_>>(),
            vec![PathBuf::from("deck1/b.md"), PathBuf::from("deck1/sub/a.md")]
        );
    }

    #[test]
    fn test_rename_in_place_keeps_images() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "deck1/a.md", "![x](pic.png)\n\n---\n\nA\n");
        write(root, "deck1/pic.png", "png");
        track(root, "deck1/a.md", "id-a");

        let relocation = relocate(root, &root.join("deck1/a.md"), &root.join("deck1/b.md")).unwrap();

        assert_eq!(relocation.target, PathBuf::from("deck1/b.md"));
        assert!(relocation.images.is_empty());
        assert!(!root.join("deck1/a.md").exists());
        assert!(root.join("deck1/b.md").exists());
        assert!(root.join("deck1/pic.png").exists());

        let meta: MetaMap = MetaStore::new(root).load().unwrap();
        assert_eq!(meta[&PathBuf::from("deck1/b.md")].forward.as_deref(), Some("id-a"));
        assert!(!meta.contains_key(&PathBuf::from("deck1/a.md")));
    }

    #[test]
    fn test_move_between_decks_moves_images() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "deck1/sub/a.md", "![x](img/pic.png)\n\n---\n\nA\n");
        write(root, "deck1/sub/img/pic.png", "png");
        track(root, "deck1/sub/a.md", "id-a");

        let relocation =
            relocate(root, &root.join("deck1/sub/a.md"), &root.join("deck2/sub/a.md")).unwrap();

        assert_eq!(
            relocation.images,
            vec![(
                PathBuf::from("deck1/sub/img/pic.png"),
                PathBuf::from("deck2/sub/img/pic.png")
            )]
        );
        assert_eq!(fs::read_to_string(root.join("deck2/sub/img/pic.png")).unwrap(), "png");
        assert!(!root.join("deck1/sub/img/pic.png").exists());
    }

    #[test]
    fn test_refuses_existing_target_and_image() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "deck1/a.md", "![x](pic.png)\n\n---\n\nA\n");
        write(root, "deck1/pic.png", "png");
        write(root, "deck1/b.md", "other");
        write(root, "deck2/pic.png", "taken");
        track(root, "deck1/a.md", "id-a");

        assert!(matches!(
            relocate(root, &root.join("deck1/a.md"), &root.join("deck1/b.md")),
            Err(RelocateError::TargetExists(_))
        ));
        assert!(matches!(
            relocate(root, &root.join("deck1/a.md"), &root.join("deck2/a.md")),
            Err(RelocateError::ImageExists(_))
        ));
        // Nothing moved
        assert!(root.join("deck1/a.md").exists());
        assert!(!root.join("deck2/a.md").exists());
    }

    #[test]
    fn test_move_with_repeated_image_reference() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "deck1/a.md", "![x](pic.png)\n\n---\n\n![again](./pic.png)\n");
        write(root, "deck1/pic.png", "png");
        track(root, "deck1/a.md", "id-a");

        let relocation = relocate(root, &root.join("deck1/a.md"), &root.join("deck2/a.md")).unwrap();

        assert_eq!(
            relocation.images,
            vec![(PathBuf::from("deck1/pic.png"), PathBuf::from("deck2/pic.png"))]
        );
        assert!(!root.join("deck1/a.md").exists());
        assert!(!root.join("deck1/pic.png").exists());
        assert!(root.join("deck2/pic.png").exists());
        let meta: MetaMap = MetaStore::new(root).load().unwrap();
        assert_eq!(
            meta.keys().cloned().collect::<Vec<_>>(),
            vec![PathBuf::from("deck2/a.md")]
        );
    }

    #[test]
    fn test_refuses_images_outside_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("cards");
        write(&root, "deck1/a.md", "![x](../../secret.png)\n\n---\n\nA\n");
        write(temp_dir.path(), "secret.png", "png");
        track(&root, "deck1/a.md", "id-a");

        assert!(matches!(
            relocate(&root, &root.join("deck1/a.md"), &root.join("deck2/a.md")),
            Err(RelocateError::OutsideRoot { .. })
        ));
        assert!(temp_dir.path().join("secret.png").exists());
        assert!(root.join("deck1/a.md").exists());
        assert!(!root.join("deck2/a.md").exists());
    }

    #[test]
    fn test_missing_image_leaves_layout_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "deck1/a.md", "![x](gone.png)\n\n---\n\nA\n");
        track(root, "deck1/a.md", "id-a");

        assert!(matches!(
            relocate(root, &root.join("deck1/a.md"), &root.join("deck2/a.md")),
            Err(RelocateError::Storage(StorageError::NotFound { .. }))
        ));
        assert!(root.join("deck1/a.md").exists());
        assert!(!root.join("deck2/a.md").exists());
        let meta: MetaMap = MetaStore::new(root).load().unwrap();
        assert!(meta.contains_key(&PathBuf::from("deck1/a.md")));
    }

    #[test]
    fn test_confined_resolves_relative_references() {
        let root = Path::new("/cards");
        assert_eq!(
            confined(root, Path::new("deck1/sub"), Path::new("../img/./p.png")).unwrap(),
            PathBuf::from("deck1/img/p.png")
        );
        assert!(confined(root, Path::new("deck1"), Path::new("../../p.png")).is_err());
        assert!(confined(root, Path::new("deck1"), Path::new("/etc/p.png")).is_err());
    }

    #[test]
    fn test_refuses_untracked_and_outside() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("cards");
        write(&root, "deck1/a.md", "Q\n\n---\n\nA\n");
        let outside = temp_dir.path().join("elsewhere.md");

        assert!(matches!(
            relocate(&root, &root.join("deck1/a.md"), &root.join("deck1/b.md")),
            Err(RelocateError::NotTracked(_))
        ));
        assert!(matches!(
            relocate(&root, &root.join("deck1/a.md"), &outside),
            Err(RelocateError::OutsideRoot { .. })
        ));
        assert!(matches!(
            relocate(&root, &root.join("deck1/missing.md"), &outside),
            Err(RelocateError::SourceMissing(_))
        ));
    }
}
