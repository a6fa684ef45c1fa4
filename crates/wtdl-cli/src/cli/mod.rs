//! CLI for the wtdl walkthrough harvester.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use wtdl_core::config::{self, WtdlConfig};
use wtdl_core::pipeline::{PipelineOptions, Stage};

use commands::{run_assets, run_extract, run_fetch, run_pipeline, run_rewrite};

const DEFAULT_FOLDER: &str = "./temp/";
const DEFAULT_OUTPUT: &str = "./output";

/// Top-level CLI for the wtdl walkthrough harvester.
#[derive(Debug, Parser)]
#[command(name = "wtdl")]
#[command(
    about = "wtdl: download walkthroughs from a paginated API into self-contained Markdown",
    long_about = None
)]
pub struct Cli {
    /// Config file to use instead of ~/.config/wtdl/config.toml.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Where to crawl from and with which credentials.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Base URL of the API; ids are appended as `/{id}` (or substituted for `{id}`).
    pub url: String,

    /// Folder for the raw JSON payloads.
    #[arg(long, default_value = DEFAULT_FOLDER, value_name = "DIR")]
    pub folder: PathBuf,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[derive(Debug, Clone, Args)]
pub struct CredentialArgs {
    /// JSON object of request headers.
    #[arg(long, default_value = "headers.json", value_name = "FILE")]
    pub headers: PathBuf,

    /// JSON object of cookies.
    #[arg(long, default_value = "cookies.json", value_name = "FILE")]
    pub cookies: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the whole pipeline: fetch, extract, assets, rewrite.
    Run {
        #[command(flatten)]
        source: SourceArgs,

        /// Folder for the Markdown documents and images.
        #[arg(long, default_value = DEFAULT_OUTPUT, value_name = "DIR")]
        output: PathBuf,

        /// Start at this stage (fetch, extract, assets or rewrite).
        #[arg(long, default_value = "fetch", value_name = "STAGE")]
        from: Stage,

        /// Ignore the crawl state in the download folder and fetch again from id 1.
        #[arg(long)]
        force_refetch: bool,
    },

    /// Crawl the API into the download folder.
    Fetch {
        #[command(flatten)]
        source: SourceArgs,

        /// Ignore the crawl state in the download folder and fetch again from id 1.
        #[arg(long)]
        force_refetch: bool,
    },

    /// Turn downloaded payloads into Markdown documents.
    Extract {
        #[arg(long, default_value = DEFAULT_FOLDER, value_name = "DIR")]
        folder: PathBuf,

        #[arg(long, default_value = DEFAULT_OUTPUT, value_name = "DIR")]
        output: PathBuf,
    },

    /// Download the images referenced by the documents.
    Assets {
        #[arg(long, default_value = DEFAULT_OUTPUT, value_name = "DIR")]
        output: PathBuf,

        // Only read when `assets.use_session` is enabled in the config.
        #[command(flatten)]
        credentials: CredentialArgs,
    },

    /// Make image paths in the documents relative.
    Rewrite {
        #[arg(long, default_value = DEFAULT_OUTPUT, value_name = "DIR")]
        output: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> Result<WtdlConfig> {
    match path {
        Some(p) => config::load_from(p),
        None => config::load_or_init(),
    }
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = load_config(cli.config.as_deref())?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run {
                source,
                output,
                from,
                force_refetch,
            } => {
                let opts = PipelineOptions {
                    base_url: source.url,
                    download_dir: source.folder,
                    output_dir: output,
                    headers_path: source.credentials.headers,
                    cookies_path: source.credentials.cookies,
                    from,
                    force_refetch,
                };
                run_pipeline(&cfg, &opts)?;
            }
            CliCommand::Fetch {
                source,
                force_refetch,
            } => run_fetch(&cfg, &source, force_refetch)?,
            CliCommand::Extract { folder, output } => run_extract(&cfg, &folder, &output)?,
            CliCommand::Assets {
                output,
                credentials,
            } => run_assets(&cfg, &output, &credentials)?,
            CliCommand::Rewrite { output } => run_rewrite(&cfg, &output)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
