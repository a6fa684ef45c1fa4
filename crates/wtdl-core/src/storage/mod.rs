//! Disk I/O and file lifecycle.
//!
//! Everything the pipeline persists (payloads, manifest, assets) goes through a
//! `.part` temp file that is renamed into place only once complete, so the final
//! name never holds a truncated file.

mod writer;

pub use writer::StorageWriter;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `12.json` → `12.json.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Write `data` to `final_path` via temp file + rename. Overwrites an existing file.
/// On failure the temp file is removed and `final_path` is left as it was.
pub fn write_atomic(final_path: &Path, data: &[u8]) -> Result<()> {
    let mut writer = StorageWriter::create(final_path)?;
    if let Err(e) = writer.write_chunk(data) {
        writer.discard();
        return Err(e).with_context(|| format!("write failed: {}", final_path.display()));
    }
    match writer.finalize() {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = std::fs::remove_file(temp_path(final_path));
            Err(e)
        }
    }
}
