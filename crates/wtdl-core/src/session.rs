//! Authenticated session: request headers and cookies captured from a browser.
//!
//! Both files are flat JSON objects (`{"User-Agent": "...", "Authorization": "..."}`
//! and `{"session_id": "..."}`). String values are used verbatim; numbers and
//! booleans are stringified.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("{kind} file '{}' not found", .path.display())]
    Missing { kind: &'static str, path: PathBuf },
    #[error("read {kind} file '{}': {source}", .path.display())]
    Read {
        kind: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{kind} file '{}' is not a JSON object: {source}", .path.display())]
    Parse {
        kind: &'static str,
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{kind} file '{}': value for {name:?} must be a string, number or boolean", .path.display())]
    BadValue {
        kind: &'static str,
        path: PathBuf,
        name: String,
    },
}

/// Headers and cookies sent with every API request.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
}

impl Session {
    /// Load both credential files. Both must exist; absence of either is reported
    /// before anything is parsed so the caller can stop before any network call.
    pub fn load(headers_path: &Path, cookies_path: &Path) -> Result<Self, CredentialError> {
        for (kind, path) in [("headers", headers_path), ("cookies", cookies_path)] {
            if !path.is_file() {
                return Err(CredentialError::Missing {
                    kind,
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(Session {
            headers: read_map("headers", headers_path)?,
            cookies: read_map("cookies", cookies_path)?,
        })
    }

    /// `Name: value` lines for the request.
    ///
    /// An empty value is written as `Name;`, which libcurl sends as an empty
    /// header; `Name:` would remove the header instead.
    pub fn header_lines(&self) -> Vec<String> {
        self.headers
            .iter()
            .map(|(k, v)| match v.trim() {
                "" => format!("{};", k.trim()),
                v => format!("{}: {}", k.trim(), v),
            })
            .collect()
    }

    /// Value for a single `Cookie` header (`a=1; b=2`), or None when there are no cookies.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|(k, v)| format!("{}={}", k.trim(), v.trim()))
            .collect();
        Some(pairs.join("; "))
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.cookies.is_empty()
    }
}

fn read_map(kind: &'static str, path: &Path) -> Result<BTreeMap<String, String>, CredentialError> {
    let bytes = std::fs::read(path).map_err(|source| CredentialError::Read {
        kind,
        path: path.to_path_buf(),
        source,
    })?;
    let raw: BTreeMap<String, Value> =
        serde_json::from_slice(&bytes).map_err(|source| CredentialError::Parse {
            kind,
            path: path.to_path_buf(),
            source,
        })?;

    let mut out = BTreeMap::new();
    for (name, value) in raw {
        let text = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => {
                return Err(CredentialError::BadValue {
                    kind,
                    path: path.to_path_buf(),
                    name,
                })
            }
        };
        out.insert(name, text);
    }
    Ok(out)
}
