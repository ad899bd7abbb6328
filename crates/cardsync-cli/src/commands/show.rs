//! Show command handler

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use cardsync_core::workspace::image_paths;
use cardsync_core::Document;

use crate::output::Output;

#[derive(Debug, Serialize)]
struct Shown {
    path: PathBuf,
    formatted: bool,
    display: String,
    images: Vec<PathBuf>,
}

impl Shown {
    fn from_text(path: &Path, text: &str) -> Self {
        let document = Document::parse(text);
        let display = document.to_display();
        Self {
            path: path.to_path_buf(),
            formatted: text.trim() == display.trim(),
            images: image_paths(&document),
            display,
        }
    }
}

/// Print a document in display form, whether it is already formatted, and its images
pub fn show(path: &Path, output: &Output) -> Result<()> {
    let text = cardsync_core::storage::read_to_string(path)
        .with_context(|| format!("Failed to read {:?}", path))?;
    let shown = Shown::from_text(path, &text);

    if output.is_json() {
        output.print_json(&serde_json::to_value(&shown)?);
        return Ok(());
    }
    if output.is_quiet() {
        println!("{}", shown.formatted);
        return Ok(());
    }

    println!("{}", shown.display);
    println!();
    if shown.formatted {
        println!("✓ Formatted");
    } else {
        println!("✗ Not formatted");
    }
    for image in &shown.images {
        println!("  image: {}", image.display());
    }
    Ok(())
}
