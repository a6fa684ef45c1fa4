//! URL modeling and filename derivation.
//!
//! Builds per-item API URLs from the operator's base URL and derives safe local
//! filenames for assets referenced by absolute URL.

mod endpoint;
mod path;
mod sanitize;

pub use endpoint::item_url;
pub use path::filename_from_url_path;
pub use sanitize::sanitize_filename_for_linux;

/// Local filename for an asset referenced by absolute URL: the last path segment
/// (query and fragment dropped), sanitized for Linux.
///
/// Returns `None` when the URL has no usable final segment (e.g. `https://host/`).
///
/// # Examples
///
/// - `asset_basename("https://cdn.example.com/img/shot.png?v=2")` → `Some("shot.png")`
/// - `asset_basename("https://example.com/")` → `None`
pub fn asset_basename(url: &str) -> Option<String> {
    let raw = filename_from_url_path(url)?;
    let sanitized = sanitize_filename_for_linux(&raw);
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        None
    } else {
        Some(sanitized)
    }
}
