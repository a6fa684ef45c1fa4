//! `wtdl fetch` – crawl the API only.

use anyhow::Result;
use wtdl_core::config::WtdlConfig;
use wtdl_core::fetcher::Fetcher;
use wtdl_core::session::Session;

use crate::cli::SourceArgs;

pub fn run_fetch(cfg: &WtdlConfig, source: &SourceArgs, force_refetch: bool) -> Result<()> {
    let session = Session::load(&source.credentials.headers, &source.credentials.cookies)?;
    if session.is_empty() {
        tracing::warn!("headers and cookies are both empty; requests are unauthenticated");
    }
    let report = Fetcher::new(cfg, &session).run(&source.url, &source.folder, force_refetch)?;
    println!("{}", report);
    if !report.failed.is_empty() {
        let ids: Vec<String> = report.failed.iter().map(|(id, _)| id.to_string()).collect();
        println!("  failed ids: {}", ids.join(", "));
    }
    Ok(())
}
