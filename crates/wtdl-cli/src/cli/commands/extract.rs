//! `wtdl extract` – payloads to Markdown.

use anyhow::Result;
use std::path::Path;
use wtdl_core::config::WtdlConfig;
use wtdl_core::extractor;

pub fn run_extract(cfg: &WtdlConfig, folder: &Path, output: &Path) -> Result<()> {
    let report = extractor::extract_dir(folder, output, cfg.extract.collision)?;
    println!("{}", report);
    for (path, reason) in &report.skipped {
        println!("  skipped {}: {}", path.display(), reason);
    }
    Ok(())
}
