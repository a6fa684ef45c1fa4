//! `wtdl run` – the whole pipeline.

use anyhow::Result;
use wtdl_core::config::WtdlConfig;
use wtdl_core::pipeline::{self, PipelineOptions};

pub fn run_pipeline(cfg: &WtdlConfig, opts: &PipelineOptions) -> Result<()> {
    if opts.from > pipeline::Stage::Fetch {
        println!("Starting at the {} stage.", opts.from);
    }
    let report = pipeline::run(cfg, opts)?;

    if let Some(r) = &report.fetch {
        println!("{}", r);
    }
    if let Some(r) = &report.extract {
        println!("{}", r);
    }
    if let Some(r) = &report.assets {
        println!("{}", r);
    }
    if let Some(r) = &report.rewrite {
        println!("{}", r);
    }
    println!("All done!");
    Ok(())
}
