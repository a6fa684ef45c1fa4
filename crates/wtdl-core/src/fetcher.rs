//! Paginated API crawl: walk ids 1, 2, 3, ... until the id space runs out.
//!
//! The endpoint declares no item count. A 404 above `fetch.end_threshold` marks
//! the end; a 404 at or below it is a gap and the walk continues. Each 200 body
//! is written verbatim to `{id}.json`. Progress is checkpointed in the
//! [`FetchManifest`] after every attempt.

use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::WtdlConfig;
use crate::http::{self, HttpResponse, RequestOptions};
use crate::manifest::FetchManifest;
use crate::retry::{self, RetryPolicy, TransferError};
use crate::session::Session;
use crate::storage;
use crate::url_model::item_url;

/// How a fetch stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The end of the id space was found in this run.
    Completed,
    /// The manifest says an earlier run already finished; nothing was requested.
    AlreadyComplete,
    /// The directory holds payloads but no manifest (earlier tool version); treated as finished.
    LegacyDirectory,
    /// `fetch.max_id` was reached before the end of the id space.
    StoppedAtMaxId,
}

/// Summary of one fetch stage.
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub outcome: FetchOutcome,
    /// Ids attempted in this run, as an inclusive range (None if nothing was requested).
    pub attempted: Option<(u64, u64)>,
    /// Payload files written in this run.
    pub fetched: u64,
    /// Ids at or below the threshold that returned 404.
    pub gaps: Vec<u64>,
    /// Ids skipped for any other reason, with the reason.
    pub failed: Vec<(u64, String)>,
}

impl fmt::Display for FetchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            FetchOutcome::AlreadyComplete => return write!(f, "fetch: crawl already complete, skipped"),
            FetchOutcome::LegacyDirectory => {
                return write!(f, "fetch: download folder already populated, skipped")
            }
            FetchOutcome::Completed | FetchOutcome::StoppedAtMaxId => {}
        }
        write!(f, "fetch: {} payloads written", self.fetched)?;
        if let Some((first, last)) = self.attempted {
            write!(f, " (ids {}..={} attempted)", first, last)?;
        }
        write!(f, ", {} gaps, {} failed", self.gaps.len(), self.failed.len())?;
        if self.outcome == FetchOutcome::StoppedAtMaxId {
            write!(f, ", stopped at max id")?;
        }
        Ok(())
    }
}

impl FetchReport {
    fn skipped(outcome: FetchOutcome) -> Self {
        Self {
            outcome,
            attempted: None,
            fetched: 0,
            gaps: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// Where the crawl starts, decided from what is already on disk.
#[derive(Debug)]
enum StartPlan {
    Skip(FetchOutcome),
    Run(FetchManifest),
}

/// Crawls one endpoint into a download directory.
pub struct Fetcher {
    opts: RequestOptions,
    policy: RetryPolicy,
    end_threshold: u64,
    max_id: Option<u64>,
    max_consecutive_failures: u32,
}

impl Fetcher {
    pub fn new(cfg: &WtdlConfig, session: &Session) -> Self {
        Self {
            opts: RequestOptions::for_api(cfg, session),
            policy: cfg.network.retry.to_policy(),
            end_threshold: cfg.fetch.end_threshold,
            max_id: cfg.fetch.max_id,
            max_consecutive_failures: cfg.network.max_consecutive_failures,
        }
    }

    /// Fetch every item of `base_url` into `dest`.
    ///
    /// With `force`, any existing manifest is ignored and the walk restarts at id 1
    /// (existing payload files are overwritten as they are fetched again).
    pub fn run(&self, base_url: &str, dest: &Path, force: bool) -> Result<FetchReport> {
        let mut manifest = match plan_start(base_url, dest, force)? {
            StartPlan::Skip(outcome) => return Ok(FetchReport::skipped(outcome)),
            StartPlan::Run(m) => m,
        };
        fs::create_dir_all(dest)
            .with_context(|| format!("create download dir: {}", dest.display()))?;

        let first_id = manifest.next_id();
        let mut report = FetchReport::skipped(FetchOutcome::Completed);
        let mut id = first_id;
        let mut streak_start: Option<u64> = None;
        let mut streak_len = 0u32;

        loop {
            if self.max_id.is_some_and(|max| id > max) {
                tracing::info!(max_id = id - 1, "reached configured max id, stopping");
                report.outcome = FetchOutcome::StoppedAtMaxId;
                break;
            }

            let url = item_url(base_url, id);
            tracing::info!(id, "fetching {}", url);

            let mut fetched = false;
            match self.request(&url) {
                Ok(resp) if resp.status == 200 => {
                    let path = payload_path(dest, id);
                    storage::write_atomic(&path, &resp.body)
                        .with_context(|| format!("write payload: {}", path.display()))?;
                    tracing::info!(id, bytes = resp.body.len(), "fetched {}", url);
                    fetched = true;
                    report.fetched += 1;
                }
                Ok(resp) if resp.status == 404 && id > self.end_threshold => {
                    tracing::info!(id, "no more items after id {}, stopping", id - 1);
                    manifest.record_attempt(id, false);
                    manifest.complete = true;
                    manifest.save(dest)?;
                    report.attempted = Some((first_id, id));
                    break;
                }
                Ok(resp) if resp.status == 404 => {
                    tracing::warn!(id, "{} returned 404, treating as a gap", url);
                    report.gaps.push(id);
                }
                Ok(resp) => {
                    tracing::warn!(id, status = resp.status, "error fetching {}: HTTP {}", url, resp.status);
                    report.failed.push((id, format!("HTTP {}", resp.status)));
                }
                Err(e) if !e.is_transport() => {
                    tracing::warn!(id, "error fetching {}: {} (retries exhausted)", url, e);
                    report.failed.push((id, e.to_string()));
                }
                Err(e) => {
                    tracing::warn!(id, "error fetching {}: {}", url, e);
                    report.failed.push((id, e.to_string()));
                    streak_start.get_or_insert(id);
                    streak_len += 1;
                    if streak_len >= self.max_consecutive_failures {
                        // Ids in the failing streak were never answered; leave them for the next run.
                        let resume_at = streak_start.unwrap_or(id);
                        manifest.last_attempted = resume_at - 1;
                        manifest.save(dest)?;
                        anyhow::bail!(
                            "aborting fetch after {} consecutive transport failures (ids {}..={}): {}",
                            streak_len,
                            resume_at,
                            id,
                            e
                        );
                    }
                    manifest.record_attempt(id, false);
                    manifest.save(dest)?;
                    report.attempted = Some((first_id, id));
                    id += 1;
                    continue;
                }
            }

            streak_start = None;
            streak_len = 0;
            manifest.record_attempt(id, fetched);
            manifest.save(dest)?;
            report.attempted = Some((first_id, id));
            id += 1;
        }

        Ok(report)
    }

    /// One GET, retried per policy for transport errors and 429/5xx.
    fn request(&self, url: &str) -> Result<HttpResponse, TransferError> {
        retry::run_with_retry(&self.policy, || {
            let resp = http::get(url, &self.opts)?;
            if retry::classify_http_status(resp.status).is_retryable() {
                return Err(TransferError::Http(resp.status));
            }
            Ok(resp)
        })
    }
}

/// Path of the raw payload for `id`.
pub fn payload_path(dest: &Path, id: u64) -> PathBuf {
    dest.join(format!("{}.json", id))
}

fn plan_start(base_url: &str, dest: &Path, force: bool) -> Result<StartPlan> {
    if force {
        return Ok(StartPlan::Run(FetchManifest::new(base_url)));
    }
    if let Some(m) = FetchManifest::load(dest)? {
        if m.base_url != base_url {
            anyhow::bail!(
                "{} holds a crawl of {} (not {}); use --force-refetch or another folder",
                dest.display(),
                m.base_url,
                base_url
            );
        }
        if m.complete {
            tracing::info!(
                "{} already holds a complete crawl ({} items), skipping fetch",
                dest.display(),
                m.fetched
            );
            return Ok(StartPlan::Skip(FetchOutcome::AlreadyComplete));
        }
        tracing::info!("resuming crawl of {} at id {}", base_url, m.next_id());
        return Ok(StartPlan::Run(m));
    }
    if has_payloads(dest)? {
        tracing::warn!(
            "{} already exists with payloads but no manifest, skipping fetch",
            dest.display()
        );
        return Ok(StartPlan::Skip(FetchOutcome::LegacyDirectory));
    }
    Ok(StartPlan::Run(FetchManifest::new(base_url)))
}

fn has_payloads(dir: &Path) -> Result<bool> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e).with_context(|| format!("read dir: {}", dir.display())),
    };
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            return Ok(true);
        }
    }
    Ok(false)
}
