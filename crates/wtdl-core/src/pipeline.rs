//! The four stages run back to back over the filesystem.
//!
//! fetch: API → `{download_dir}/{id}.json`
//! extract: payloads → `{output_dir}/{slug}.md`
//! assets: images referenced by the documents → below `{output_dir}`
//! rewrite: root-relative image paths in the documents → relative

use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::assets::{AssetReport, AssetResolver};
use crate::config::WtdlConfig;
use crate::extractor::{self, ExtractReport};
use crate::fetcher::{FetchReport, Fetcher};
use crate::rewriter::{self, RewriteReport};
use crate::session::Session;

/// A pipeline stage, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Fetch,
    Extract,
    Assets,
    Rewrite,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Fetch, Stage::Extract, Stage::Assets, Stage::Rewrite];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Extract => "extract",
            Stage::Assets => "assets",
            Stage::Rewrite => "rewrite",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown stage {0:?} (expected fetch, extract, assets or rewrite)")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}

/// Everything a full run needs besides the config.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub base_url: String,
    pub download_dir: PathBuf,
    pub output_dir: PathBuf,
    pub headers_path: PathBuf,
    pub cookies_path: PathBuf,
    /// First stage to run; earlier stages are assumed done.
    pub from: Stage,
    /// Ignore the fetch manifest and crawl again from id 1.
    pub force_refetch: bool,
}

/// Per-stage reports; `None` for stages that did not run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub fetch: Option<FetchReport>,
    pub extract: Option<ExtractReport>,
    pub assets: Option<AssetReport>,
    pub rewrite: Option<RewriteReport>,
}

/// Whether the stages from `from` on need the credential files.
pub fn needs_session(cfg: &WtdlConfig, from: Stage) -> bool {
    from == Stage::Fetch || (from <= Stage::Assets && cfg.assets.use_session)
}

/// Run the pipeline from `opts.from` to the end.
///
/// Credentials are loaded before any stage starts; a missing or invalid file
/// fails the run without touching the network or the filesystem.
pub fn run(cfg: &WtdlConfig, opts: &PipelineOptions) -> Result<PipelineReport> {
    let session = if needs_session(cfg, opts.from) {
        Some(Session::load(&opts.headers_path, &opts.cookies_path)?)
    } else {
        None
    };
    let mut report = PipelineReport::default();

    if let (Stage::Fetch, Some(session)) = (opts.from, session.as_ref()) {
        let fetched = Fetcher::new(cfg, session)
            .run(&opts.base_url, &opts.download_dir, opts.force_refetch)
            .context("fetch stage")?;
        tracing::debug!("{}", fetched);
        report.fetch = Some(fetched);
    }

    if opts.from <= Stage::Extract {
        let extracted =
            extractor::extract_dir(&opts.download_dir, &opts.output_dir, cfg.extract.collision)
                .context("extract stage")?;
        tracing::debug!("{}", extracted);
        report.extract = Some(extracted);
    }

    if opts.from <= Stage::Assets {
        let resolved = AssetResolver::new(cfg, session.as_ref())?
            .resolve_dir(&opts.output_dir, &opts.output_dir)
            .context("assets stage")?;
        tracing::debug!("{}", resolved);
        report.assets = Some(resolved);
    }

    let rewritten = rewriter::rewrite_dir(&opts.output_dir, &cfg.assets.reference_prefix)
        .context("rewrite stage")?;
    tracing::debug!("{}", rewritten);
    report.rewrite = Some(rewritten);

    Ok(report)
}
