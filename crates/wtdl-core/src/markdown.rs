//! Markdown scanning shared by the extractor, asset resolver and rewriter.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// First `#` line of a document; the capture is everything after the marker and any whitespace.
static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#\s*(.+)").unwrap());

/// `![alt](target)`; the capture is the target. Lazy quantifiers keep adjacent images apart.
static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[.*?\]\((.*?)\)").unwrap());

/// Text of the first heading line, untrimmed.
pub(crate) fn first_heading(text: &str) -> Option<&str> {
    RE_HEADING
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Image reference targets in order of appearance (duplicates included).
pub(crate) fn image_references(text: &str) -> Vec<&str> {
    RE_IMAGE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// `.md` files directly inside `dir`, sorted by name.
pub(crate) fn list_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut docs = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read dir: {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
            docs.push(path);
        }
    }
    docs.sort();
    Ok(docs)
}
