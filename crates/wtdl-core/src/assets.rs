//! Localize images referenced from the Markdown documents.
//!
//! Every `![..](target)` is classified:
//! - root-relative (`/storage/walkthroughs/{bucket}/{file}`) → fetched from the
//!   asset origin, saved under the same relative path below the image root;
//! - absolute (`http(s)://...`) → fetched as-is, saved flat as its basename;
//! - anything else → left alone.
//!
//! A file already at the destination is never fetched again, which makes the
//! stage safe to re-run. Downloads land in `.part` files and are renamed on
//! success, so an existing destination is always a complete download.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::config::WtdlConfig;
use crate::http::{self, RequestOptions};
use crate::markdown;
use crate::retry::{self, RetryPolicy};
use crate::session::Session;
use crate::url_model::asset_basename;

/// Remote source and local destination for one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetTarget {
    pub remote_url: String,
    pub local_path: PathBuf,
}

/// Why a reference is not downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unresolvable {
    /// Neither root-relative nor absolute http(s).
    Unrecognized,
    /// The mirrored path would leave the image root or has no file name.
    UnsafePath,
}

/// Summary of one asset stage.
#[derive(Debug, Clone, Default)]
pub struct AssetReport {
    pub documents: usize,
    pub downloaded: Vec<PathBuf>,
    pub already_present: usize,
    pub ignored: Vec<(String, Unresolvable)>,
    pub failed: Vec<(String, String)>,
}

impl fmt::Display for AssetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "assets: {} documents scanned, {} downloaded, {} already present, {} ignored, {} failed",
            self.documents,
            self.downloaded.len(),
            self.already_present,
            self.ignored.len(),
            self.failed.len()
        )
    }
}

/// Downloads the images referenced by a directory of documents.
pub struct AssetResolver {
    opts: RequestOptions,
    policy: RetryPolicy,
    base_url: String,
    prefix: String,
    re_root_relative: Regex,
}

impl AssetResolver {
    /// `session` is only used when `assets.use_session` is set.
    pub fn new(cfg: &WtdlConfig, session: Option<&Session>) -> Result<Self> {
        let prefix = cfg.assets.reference_prefix.clone();
        let pattern = format!(r"^{}(\d+)/(.+)$", regex::escape(&prefix));
        let re_root_relative = Regex::new(&pattern)
            .with_context(|| format!("build reference pattern from {:?}", prefix))?;
        Ok(Self {
            opts: RequestOptions::for_assets(cfg, session),
            policy: cfg.network.retry.to_policy(),
            base_url: cfg.assets.base_url.trim_end_matches('/').to_string(),
            prefix,
            re_root_relative,
        })
    }

    /// Where `reference` comes from and where it goes below `image_root`.
    pub fn locate(&self, reference: &str, image_root: &Path) -> Result<AssetTarget, Unresolvable> {
        if let Some(caps) = self.re_root_relative.captures(reference) {
            let bucket = &caps[1];
            let rest = &caps[2];
            if !is_plain_relative(rest) {
                return Err(Unresolvable::UnsafePath);
            }
            let local_path = image_root
                .join(self.prefix.trim_matches('/'))
                .join(bucket)
                .join(rest);
            return Ok(AssetTarget {
                remote_url: format!("{}{}", self.base_url, reference),
                local_path,
            });
        }
        if reference.starts_with("http://") || reference.starts_with("https://") {
            let name = asset_basename(reference).ok_or(Unresolvable::UnsafePath)?;
            return Ok(AssetTarget {
                remote_url: reference.to_string(),
                local_path: image_root.join(name),
            });
        }
        Err(Unresolvable::Unrecognized)
    }

    /// Resolve every reference in every `.md` document directly inside `docs_dir`.
    ///
    /// A failed download is logged and recorded in the report; the stage only
    /// errors when a directory cannot be listed or created.
    pub fn resolve_dir(&self, docs_dir: &Path, image_root: &Path) -> Result<AssetReport> {
        fs::create_dir_all(image_root)
            .with_context(|| format!("create image root: {}", image_root.display()))?;
        let mut report = AssetReport::default();

        for doc in markdown::list_documents(docs_dir)? {
            tracing::info!("processing {}", doc.display());
            report.documents += 1;
            let text = match fs::read_to_string(&doc) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!("skipping {}: {}", doc.display(), e);
                    continue;
                }
            };

            let mut seen = HashSet::new();
            for reference in markdown::image_references(&text) {
                if !seen.insert(reference) {
                    continue;
                }
                self.resolve_one(reference, image_root, &mut report);
            }
        }

        Ok(report)
    }

    fn resolve_one(&self, reference: &str, image_root: &Path, report: &mut AssetReport) {
        let target = match self.locate(reference, image_root) {
            Ok(t) => t,
            Err(why) => {
                tracing::info!("skipping image reference {:?} ({:?})", reference, why);
                report.ignored.push((reference.to_string(), why));
                return;
            }
        };

        if target.local_path.exists() {
            tracing::info!("already downloaded: {}", target.local_path.display());
            report.already_present += 1;
            return;
        }

        if let Some(parent) = target.local_path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::warn!("cannot create {}: {}", parent.display(), e);
                report.failed.push((target.remote_url, e.to_string()));
                return;
            }
        }

        tracing::info!(
            "downloading {} -> {}",
            target.remote_url,
            target.local_path.display()
        );
        let result = retry::run_with_retry(&self.policy, || {
            http::download_to(&target.remote_url, &target.local_path, &self.opts)
        });
        match result {
            Ok(bytes) => {
                tracing::debug!(bytes, "saved {}", target.local_path.display());
                report.downloaded.push(target.local_path);
            }
            Err(e) => {
                tracing::warn!("failed to download {}: {}", target.remote_url, e);
                report.failed.push((target.remote_url, e.to_string()));
            }
        }
    }
}

/// True if `rest` is a non-empty relative path made only of normal components.
fn is_plain_relative(rest: &str) -> bool {
    let path = Path::new(rest);
    path.file_name().is_some() && path.components().all(|c| matches!(c, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> AssetResolver {
        AssetResolver::new(&WtdlConfig::default(), None).unwrap()
    }

    #[test]
    fn root_relative_is_mirrored_under_image_root() {
        let t = resolver()
            .locate("/storage/walkthroughs/12/x.png", Path::new("/out"))
            .unwrap();
        assert_eq!(
            t.remote_url,
            "https://academy.hackthebox.com/storage/walkthroughs/12/x.png"
        );
        assert_eq!(
            t.local_path,
            PathBuf::from("/out/storage/walkthroughs/12/x.png")
        );
    }

    #[test]
    fn absolute_is_saved_flat_by_basename() {
        let t = resolver()
            .locate("https://i.imgur.com/abc/Shot.PNG?width=300", Path::new("/out"))
            .unwrap();
        assert_eq!(t.remote_url, "https://i.imgur.com/abc/Shot.PNG?width=300");
        assert_eq!(t.local_path, PathBuf::from("/out/Shot.PNG"));
    }

    #[test]
    fn other_shapes_are_unrecognized() {
        let r = resolver();
        let root = Path::new("/out");
        for reference in [
            "storage/walkthroughs/12/x.png",
            "/storage/walkthroughs/abc/x.png",
            "/storage/modules/12/x.png",
            "data:image/png;base64,AAAA",
            "./local.png",
        ] {
            assert_eq!(
                r.locate(reference, root),
                Err(Unresolvable::Unrecognized),
                "{}",
                reference
            );
        }
    }

    #[test]
    fn traversal_and_empty_names_are_unsafe() {
        let r = resolver();
        let root = Path::new("/out");
        assert_eq!(
            r.locate("/storage/walkthroughs/1/../../../etc/passwd", root),
            Err(Unresolvable::UnsafePath)
        );
        assert_eq!(
            r.locate("https://example.com/", root),
            Err(Unresolvable::UnsafePath)
        );
    }

    #[test]
    fn nested_paths_inside_bucket_are_kept() {
        let t = resolver()
            .locate("/storage/walkthroughs/3/img/a.png", Path::new("out"))
            .unwrap();
        assert_eq!(
            t.local_path,
            PathBuf::from("out/storage/walkthroughs/3/img/a.png")
        );
    }

    #[test]
    fn custom_prefix_is_escaped() {
        let mut cfg = WtdlConfig::default();
        cfg.assets.reference_prefix = "/files.v2/".to_string();
        let r = AssetResolver::new(&cfg, None).unwrap();
        assert!(r.locate("/files.v2/9/a.png", Path::new("o")).is_ok());
        assert_eq!(
            r.locate("/filesXv2/9/a.png", Path::new("o")),
            Err(Unresolvable::Unrecognized)
        );
    }

    #[test]
    fn existing_files_are_not_requested() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("storage/walkthroughs/5/a.png");
        fs::create_dir_all(existing.parent().unwrap()).unwrap();
        fs::write(&existing, b"png").unwrap();
        fs::write(
            dir.path().join("Doc.md"),
            "# Doc\n![a](/storage/walkthroughs/5/a.png)\n![b](relative.png)",
        )
        .unwrap();

        let report = resolver().resolve_dir(dir.path(), dir.path()).unwrap();
        assert_eq!(report.documents, 1);
        assert_eq!(report.already_present, 1);
        assert!(report.downloaded.is_empty());
        assert_eq!(report.ignored.len(), 1);
        assert!(report.failed.is_empty());
    }
}
