//! Site-absolute image paths → document-relative ones.
//!
//! After the asset stage mirrors `/storage/walkthroughs/...` below the output
//! directory, dropping the leading `/` makes each reference resolve next to the
//! document in any Markdown viewer.

use anyhow::Result;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::markdown;
use crate::storage;

/// Summary of one rewrite stage.
#[derive(Debug, Clone, Default)]
pub struct RewriteReport {
    pub documents: usize,
    pub rewritten: Vec<PathBuf>,
    pub skipped: Vec<(PathBuf, String)>,
}

impl fmt::Display for RewriteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rewrite: {} of {} documents updated",
            self.rewritten.len(),
            self.documents
        )?;
        if !self.skipped.is_empty() {
            write!(f, ", {} skipped", self.skipped.len())?;
        }
        Ok(())
    }
}

/// Rewritten text for one document.
///
/// Every distinct reference starting with `prefix` is replaced document-wide by
/// the same string minus its leading `/`. Already relative references no longer
/// match, so applying this twice changes nothing.
pub fn rewrite_text(text: &str, prefix: &str) -> String {
    let mut targets: Vec<&str> = markdown::image_references(text)
        .into_iter()
        .filter(|r| r.starts_with(prefix))
        .collect();
    targets.sort_unstable();
    targets.dedup();

    let mut out = text.to_string();
    for target in targets {
        if let Some(relative) = target.strip_prefix('/') {
            out = out.replace(target, relative);
        }
    }
    out
}

/// Rewrite every `.md` document directly inside `dir`, touching only the ones that change.
pub fn rewrite_dir(dir: &Path, prefix: &str) -> Result<RewriteReport> {
    let mut report = RewriteReport::default();
    for doc in markdown::list_documents(dir)? {
        report.documents += 1;
        let text = match fs::read_to_string(&doc) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("skipping {}: {}", doc.display(), e);
                report.skipped.push((doc, e.to_string()));
                continue;
            }
        };
        let updated = rewrite_text(&text, prefix);
        if updated == text {
            continue;
        }
        if let Err(e) = storage::write_atomic(&doc, updated.as_bytes()) {
            tracing::warn!("cannot rewrite {}: {:#}", doc.display(), e);
            report.skipped.push((doc, format!("{:#}", e)));
            continue;
        }
        tracing::info!("rewrote image paths in {}", doc.display());
        report.rewritten.push(doc);
    }
    Ok(report)
}
