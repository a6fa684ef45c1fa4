//! `wtdl rewrite` – make image paths relative.

use anyhow::Result;
use std::path::Path;
use wtdl_core::config::WtdlConfig;
use wtdl_core::rewriter;

pub fn run_rewrite(cfg: &WtdlConfig, output: &Path) -> Result<()> {
    let report = rewriter::rewrite_dir(output, &cfg.assets.reference_prefix)?;
    println!("{}", report);
    Ok(())
}
