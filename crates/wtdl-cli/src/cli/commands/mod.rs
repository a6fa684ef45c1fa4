//! CLI command handlers, one stage per file.

mod assets;
mod extract;
mod fetch;
mod rewrite;
mod run;

pub use assets::run_assets;
pub use extract::run_extract;
pub use fetch::run_fetch;
pub use rewrite::run_rewrite;
pub use run::run_pipeline;
