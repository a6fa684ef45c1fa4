//! `wtdl assets` – download referenced images.

use anyhow::Result;
use std::path::Path;
use wtdl_core::assets::AssetResolver;
use wtdl_core::config::WtdlConfig;
use wtdl_core::session::Session;

use crate::cli::CredentialArgs;

pub fn run_assets(cfg: &WtdlConfig, output: &Path, credentials: &CredentialArgs) -> Result<()> {
    let session = if cfg.assets.use_session {
        Some(Session::load(&credentials.headers, &credentials.cookies)?)
    } else {
        None
    };
    let report = AssetResolver::new(cfg, session.as_ref())?.resolve_dir(output, output)?;
    println!("{}", report);
    for (url, reason) in &report.failed {
        println!("  failed {}: {}", url, reason);
    }
    Ok(())
}
