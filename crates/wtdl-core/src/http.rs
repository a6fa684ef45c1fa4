//! Blocking HTTP GET over libcurl (easy interface).
//!
//! Two shapes of request: `get` buffers the whole body in memory (API pages),
//! `download_to` streams the body to a `.part` file and renames it into place
//! only on HTTP 200 (assets). Both run on the calling thread.

use std::io;
use std::path::Path;
use std::time::Duration;

use crate::config::WtdlConfig;
use crate::retry::TransferError;
use crate::session::Session;
use crate::storage::StorageWriter;

/// Per-request transport settings.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub verify_tls: bool,
    pub connect_timeout: Option<Duration>,
    pub timeout: Option<Duration>,
    /// Receive buffer size; bounds the size of each chunk handed to the writer.
    pub buffer_size: Option<usize>,
    /// Extra request headers as `Name: value` lines.
    pub header_lines: Vec<String>,
    /// Value for the `Cookie` header.
    pub cookie: Option<String>,
}

impl RequestOptions {
    /// Options for the paginated API: session headers and cookies, `fetch.verify_tls`.
    pub fn for_api(cfg: &WtdlConfig, session: &Session) -> Self {
        Self {
            verify_tls: cfg.fetch.verify_tls,
            header_lines: session.header_lines(),
            cookie: session.cookie_header(),
            ..Self::network(cfg)
        }
    }

    /// Options for asset downloads: unauthenticated unless `assets.use_session` is set.
    pub fn for_assets(cfg: &WtdlConfig, session: Option<&Session>) -> Self {
        let mut opts = Self {
            verify_tls: cfg.assets.verify_tls,
            buffer_size: Some(cfg.assets.buffer_bytes),
            ..Self::network(cfg)
        };
        if cfg.assets.use_session {
            if let Some(s) = session {
                opts.header_lines = s.header_lines();
                opts.cookie = s.cookie_header();
            }
        }
        opts
    }

    fn network(cfg: &WtdlConfig) -> Self {
        Self {
            connect_timeout: cfg.network.connect_timeout_secs.map(Duration::from_secs),
            timeout: cfg.network.timeout_secs.map(Duration::from_secs),
            ..Self::default()
        }
    }
}

/// Status and body of a completed request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u32,
    pub body: Vec<u8>,
}

fn configure(easy: &mut curl::easy::Easy, url: &str, opts: &RequestOptions) -> Result<(), curl::Error> {
    easy.url(url)?;
    easy.get(true)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.ssl_verify_peer(opts.verify_tls)?;
    easy.ssl_verify_host(opts.verify_tls)?;
    if let Some(t) = opts.connect_timeout {
        easy.connect_timeout(t)?;
    }
    if let Some(t) = opts.timeout {
        easy.timeout(t)?;
    }
    if let Some(sz) = opts.buffer_size {
        easy.buffer_size(sz)?;
    }
    if !opts.header_lines.is_empty() {
        let mut list = curl::easy::List::new();
        for line in &opts.header_lines {
            list.append(line)?;
        }
        easy.http_headers(list)?;
    }
    if let Some(cookie) = &opts.cookie {
        easy.cookie(cookie)?;
    }
    Ok(())
}

/// GET `url` and buffer the body. Any HTTP status is returned as a response;
/// only transport failures are errors.
pub fn get(url: &str, opts: &RequestOptions) -> Result<HttpResponse, TransferError> {
    let mut body = Vec::new();
    let mut easy = curl::easy::Easy::new();
    configure(&mut easy, url, opts)?;

    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let status = easy.response_code()?;
    Ok(HttpResponse { status, body })
}

/// GET `url` and stream the body to `dest` (parent directory must exist).
///
/// The body lands in `dest.part` first. On HTTP 200 it is renamed to `dest` and
/// the byte count returned; on any other status or failure the temp file is
/// removed and `dest` is left untouched.
pub fn download_to(url: &str, dest: &Path, opts: &RequestOptions) -> Result<u64, TransferError> {
    let mut writer = StorageWriter::create(dest).map_err(into_storage_error)?;
    let mut storage_error: Option<io::Error> = None;

    let mut easy = curl::easy::Easy::new();
    if let Err(e) = configure(&mut easy, url, opts) {
        writer.discard();
        return Err(TransferError::Curl(e));
    }

    let performed = perform_into(&mut easy, &mut writer, &mut storage_error);

    if let Err(e) = performed {
        writer.discard();
        if e.is_write_error() {
            if let Some(io_err) = storage_error {
                return Err(TransferError::Storage(io_err));
            }
        }
        return Err(TransferError::Curl(e));
    }

    let status = match easy.response_code() {
        Ok(code) => code,
        Err(e) => {
            writer.discard();
            return Err(TransferError::Curl(e));
        }
    };
    if status != 200 {
        writer.discard();
        return Err(TransferError::Http(status));
    }

    let written = writer.written();
    writer.finalize().map_err(into_storage_error)?;
    Ok(written)
}

fn perform_into(
    easy: &mut curl::easy::Easy,
    writer: &mut StorageWriter,
    storage_error: &mut Option<io::Error>,
) -> Result<(), curl::Error> {
    let mut transfer = easy.transfer();
    transfer.write_function(|data| match writer.write_chunk(data) {
        Ok(()) => Ok(data.len()),
        Err(e) => {
            *storage_error = Some(e);
            Ok(0) // abort transfer
        }
    })?;
    transfer.perform()
}

fn into_storage_error(e: anyhow::Error) -> TransferError {
    let io_err = e
        .downcast::<io::Error>()
        .unwrap_or_else(|e| io::Error::new(io::ErrorKind::Other, format!("{:#}", e)));
    TransferError::Storage(io_err)
}
