//! Raw payloads → Markdown documents.
//!
//! Each `{id}.json` contributes its `data.instructions` text, saved under a name
//! derived from the first heading. Anything unusable in a single payload is a
//! per-file skip; only directory-level I/O failures stop the stage.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::CollisionPolicy;
use crate::manifest::MANIFEST_FILE;
use crate::markdown;
use crate::storage;

static RE_NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Longest document stem: `{stem}.md.part` must fit in NAME_MAX (255 bytes).
const MAX_STEM_BYTES: usize = 255 - ".md".len() - storage::TEMP_SUFFIX.len();

/// Why a payload produced no document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Unreadable(String),
    InvalidJson(String),
    NoInstructions,
    NoHeading,
    /// The heading had no word characters left after sanitizing.
    EmptySlug,
    /// The document could not be written to the output directory.
    WriteFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unreadable(e) => write!(f, "unreadable: {}", e),
            SkipReason::InvalidJson(e) => write!(f, "invalid JSON: {}", e),
            SkipReason::NoInstructions => write!(f, "no instructions"),
            SkipReason::NoHeading => write!(f, "no heading found"),
            SkipReason::EmptySlug => write!(f, "heading sanitizes to an empty name"),
            SkipReason::WriteFailed(e) => write!(f, "write failed: {}", e),
        }
    }
}

/// One document written by the stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenDoc {
    pub source: PathBuf,
    pub file_name: String,
}

/// Summary of one extract stage.
#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    pub written: Vec<WrittenDoc>,
    pub skipped: Vec<(PathBuf, SkipReason)>,
    /// Document names produced by more than one payload in this run: (name, later source).
    pub collisions: Vec<(String, PathBuf)>,
}

impl fmt::Display for ExtractReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "extract: {} documents written, {} payloads skipped, {} name collisions",
            self.written.len(),
            self.skipped.len(),
            self.collisions.len()
        )
    }
}

/// Filesystem-safe name from heading text: trim, drop everything except word
/// characters, whitespace and `-`, then turn whitespace runs into `_`.
pub fn slugify_heading(heading: &str) -> String {
    let kept = RE_NON_SLUG.replace_all(heading.trim(), "");
    RE_WHITESPACE.replace_all(&kept, "_").into_owned()
}

/// At most `max` bytes of `stem`, cut on a char boundary, without a trailing `_`.
fn cap_stem(stem: &str, max: usize) -> &str {
    if stem.len() <= max {
        return stem;
    }
    let mut take = max;
    while !stem.is_char_boundary(take) {
        take -= 1;
    }
    stem[..take].trim_end_matches('_')
}

/// Trim, CRLF → LF, and at most one blank line between blocks.
pub fn normalize_body(text: &str) -> String {
    let trimmed = text.trim().replace("\r\n", "\n");
    RE_BLANK_RUN.replace_all(&trimmed, "\n\n").into_owned()
}

/// Document name and normalized body for one payload.
pub fn extract_document(payload: &[u8]) -> Result<(String, String), SkipReason> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| SkipReason::InvalidJson(e.to_string()))?;
    let instructions = value
        .get("data")
        .and_then(|d| d.get("instructions"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(SkipReason::NoInstructions)?;

    let heading = markdown::first_heading(instructions).ok_or(SkipReason::NoHeading)?;
    let slug = slugify_heading(heading);
    if slug.is_empty() {
        return Err(SkipReason::EmptySlug);
    }
    let stem = cap_stem(&slug, MAX_STEM_BYTES);
    Ok((format!("{}.md", stem), normalize_body(instructions)))
}

/// Convert every payload in `src` into a document in `dest`.
pub fn extract_dir(src: &Path, dest: &Path, collision: CollisionPolicy) -> Result<ExtractReport> {
    fs::create_dir_all(dest).with_context(|| format!("create output dir: {}", dest.display()))?;
    let mut report = ExtractReport::default();
    let mut produced: HashMap<String, PathBuf> = HashMap::new();

    for path in list_payloads(src)? {
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) => {
                skip(&mut report, path, SkipReason::Unreadable(e.to_string()));
                continue;
            }
        };
        let (mut file_name, body) = match extract_document(&bytes) {
            Ok(doc) => doc,
            Err(reason) => {
                skip(&mut report, path, reason);
                continue;
            }
        };

        if let Some(earlier) = produced.get(&file_name) {
            match collision {
                CollisionPolicy::Overwrite => {
                    tracing::warn!(
                        "{} and {} both produce {}; keeping the later one",
                        earlier.display(),
                        path.display(),
                        file_name
                    );
                    report.collisions.push((file_name.clone(), path.clone()));
                }
                CollisionPolicy::AppendId => {
                    let suffix = format!(
                        "_{}",
                        path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default()
                    );
                    let base = file_name.trim_end_matches(".md");
                    let keep = MAX_STEM_BYTES.saturating_sub(suffix.len());
                    let renamed = format!("{}{}.md", cap_stem(base, keep), suffix);
                    tracing::warn!(
                        "{} and {} both produce {}; writing {} instead",
                        earlier.display(),
                        path.display(),
                        file_name,
                        renamed
                    );
                    report.collisions.push((file_name.clone(), path.clone()));
                    file_name = renamed;
                }
            }
        }

        let out = dest.join(&file_name);
        if let Err(e) = storage::write_atomic(&out, body.as_bytes()) {
            skip(&mut report, path, SkipReason::WriteFailed(format!("{:#}", e)));
            continue;
        }
        tracing::info!("wrote {}", file_name);
        produced.insert(file_name.clone(), path.clone());
        report.written.push(WrittenDoc {
            source: path,
            file_name,
        });
    }

    Ok(report)
}

fn skip(report: &mut ExtractReport, path: PathBuf, reason: SkipReason) {
    tracing::warn!("skipping {}: {}", path.display(), reason);
    report.skipped.push((path, reason));
}

/// `*.json` files in `dir` (not recursive, manifest excluded), numeric ids first in id order.
fn list_payloads(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read dir: {}", dir.display()))? {
        let path = entry?.path();
        if !path.is_file() || path.extension().map_or(true, |ext| ext != "json") {
            continue;
        }
        if path.file_name().is_some_and(|n| n == MANIFEST_FILE) {
            continue;
        }
        paths.push(path);
    }
    paths.sort_by_key(|p| {
        let stem = p
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        (stem.parse::<u64>().unwrap_or(u64::MAX), stem)
    });
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(instructions: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({ "data": { "instructions": instructions } }))
            .unwrap()
    }

    #[test]
    fn slug_strips_punctuation_and_collapses_whitespace() {
        assert_eq!(slugify_heading("  SQL Injection: Part 1!! "), "SQL_Injection_Part_1");
        assert_eq!(slugify_heading("Cross-Site\tScripting  (XSS)"), "Cross-Site_Scripting_XSS");
        assert_eq!(slugify_heading("Über Café"), "Über_Café");
        assert_eq!(slugify_heading("?!"), "");
    }

    #[test]
    fn body_is_trimmed_and_blank_runs_collapsed() {
        let raw = "\r\n# Title\r\n\r\n\r\n\r\nText\r\n\n\nMore  \n";
        assert_eq!(normalize_body(raw), "# Title\n\nText\n\nMore");
    }

    #[test]
    fn document_from_payload() {
        let (name, body) =
            extract_document(&payload("Intro\n#  SQL Injection: Part 1!! \n\n\n\nbody")).unwrap();
        assert_eq!(name, "SQL_Injection_Part_1.md");
        assert_eq!(body, "Intro\n#  SQL Injection: Part 1!! \n\nbody");
    }

    #[test]
    fn payload_problems_become_skip_reasons() {
        assert!(matches!(
            extract_document(b"{not json"),
            Err(SkipReason::InvalidJson(_))
        ));
        assert_eq!(
            extract_document(br#"{"data": {}}"#),
            Err(SkipReason::NoInstructions)
        );
        assert_eq!(
            extract_document(br#"{"data": "flat"}"#),
            Err(SkipReason::NoInstructions)
        );
        assert_eq!(extract_document(&payload("")), Err(SkipReason::NoInstructions));
        assert_eq!(
            extract_document(&payload("plain text only")),
            Err(SkipReason::NoHeading)
        );
        assert_eq!(extract_document(&payload("# ***")), Err(SkipReason::EmptySlug));
    }

    #[test]
    fn malformed_file_is_isolated() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        for id in 1..=9 {
            fs::write(
                src.path().join(format!("{}.json", id)),
                payload(&format!("# Module {}\n\ncontent {}", id, id)),
            )
            .unwrap();
        }
        fs::write(src.path().join("10.json"), b"{\"data\": {\"instr").unwrap();

        let report = extract_dir(src.path(), dest.path(), CollisionPolicy::Overwrite).unwrap();
        assert_eq!(report.written.len(), 9);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].0.ends_with("10.json"));
        let docs = fs::read_dir(dest.path()).unwrap().count();
        assert_eq!(docs, 9);
        assert_eq!(
            fs::read_to_string(dest.path().join("Module_3.md")).unwrap(),
            "# Module 3\n\ncontent 3"
        );
    }

    #[test]
    fn manifest_and_other_files_are_ignored() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::write(src.path().join("1.json"), payload("# One")).unwrap();
        fs::write(src.path().join(MANIFEST_FILE), b"{\"base_url\":\"x\"}").unwrap();
        fs::write(src.path().join("notes.txt"), b"# Not a payload").unwrap();
        fs::write(src.path().join("2.json.part"), b"partial").unwrap();

        let report = extract_dir(src.path(), dest.path(), CollisionPolicy::Overwrite).unwrap();
        assert_eq!(report.written.len(), 1);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn collisions_overwrite_or_append_id() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("1.json"), payload("# Same Title\nfirst")).unwrap();
        fs::write(src.path().join("2.json"), payload("# Same Title!\nsecond")).unwrap();

        let dest = tempfile::tempdir().unwrap();
        let report = extract_dir(src.path(), dest.path(), CollisionPolicy::Overwrite).unwrap();
        assert_eq!(report.collisions.len(), 1);
        assert_eq!(
            fs::read_to_string(dest.path().join("Same_Title.md")).unwrap(),
            "# Same Title!\nsecond"
        );

        let dest = tempfile::tempdir().unwrap();
        let report = extract_dir(src.path(), dest.path(), CollisionPolicy::AppendId).unwrap();
        assert_eq!(report.collisions.len(), 1);
        assert!(dest.path().join("Same_Title.md").exists());
        assert_eq!(
            fs::read_to_string(dest.path().join("Same_Title_2.md")).unwrap(),
            "# Same Title!\nsecond"
        );
    }

    #[test]
    fn long_heading_is_capped_to_fit_the_temp_name() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::write(src.path().join("1.json"), payload(&format!("# {}", "A".repeat(251)))).unwrap();
        fs::write(src.path().join("2.json"), payload("# Short")).unwrap();

        let report = extract_dir(src.path(), dest.path(), CollisionPolicy::Overwrite).unwrap();
        assert!(report.skipped.is_empty(), "{:?}", report.skipped);
        assert_eq!(report.written.len(), 2);
        let long = &report.written[0].file_name;
        assert_eq!(long.len(), MAX_STEM_BYTES + ".md".len());
        assert!(dest.path().join(long).exists());
        assert!(dest.path().join("Short.md").exists());
    }

    #[test]
    fn capped_stem_stays_on_char_boundary() {
        let (name, _) = extract_document(&payload(&format!("# {}", "é".repeat(200)))).unwrap();
        let stem = name.trim_end_matches(".md");
        assert!(stem.len() <= MAX_STEM_BYTES);
        assert!(stem.chars().all(|c| c == 'é'));
        assert_eq!(cap_stem("ab_cd", 3), "ab");
    }

    #[test]
    fn appended_id_keeps_long_names_within_limit() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let heading = format!("# {}", "B".repeat(300));
        fs::write(src.path().join("1.json"), payload(&heading)).unwrap();
        fs::write(src.path().join("1234.json"), payload(&heading)).unwrap();

        let report = extract_dir(src.path(), dest.path(), CollisionPolicy::AppendId).unwrap();
        assert!(report.skipped.is_empty(), "{:?}", report.skipped);
        assert_eq!(report.written.len(), 2);
        let renamed = &report.written[1].file_name;
        assert!(renamed.ends_with("_1234.md"), "{}", renamed);
        assert!(renamed.len() <= MAX_STEM_BYTES + ".md".len());
    }

    #[test]
    fn unwritable_document_is_skipped_and_others_written() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::write(src.path().join("1.json"), payload("# Blocked")).unwrap();
        fs::write(src.path().join("2.json"), payload("# Open")).unwrap();
        fs::create_dir(dest.path().join("Blocked.md")).unwrap();
        fs::write(dest.path().join("Blocked.md").join("keep"), b"x").unwrap();

        let report = extract_dir(src.path(), dest.path(), CollisionPolicy::Overwrite).unwrap();
        assert_eq!(report.written.len(), 1);
        assert_eq!(report.written[0].file_name, "Open.md");
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].0.ends_with("1.json"));
        assert!(matches!(report.skipped[0].1, SkipReason::WriteFailed(_)));
        assert!(!storage::temp_path(&dest.path().join("Blocked.md")).exists());
    }
}
