pub mod config;
pub mod logging;

// Plumbing shared by the stages.
pub mod http;
pub mod retry;
pub mod session;
pub mod storage;
pub mod url_model;

// Pipeline stages, in run order.
pub mod manifest;
pub mod fetcher;
pub mod extractor;
pub mod assets;
pub mod rewriter;
pub mod pipeline;

pub(crate) mod markdown;
