use wtdl_core::logging;

mod cli;

use crate::cli::CliCommand;

fn main() {
    if let Err(err) = logging::init_logging() {
        logging::init_logging_stdout();
        tracing::warn!("log file unavailable ({:#}), logging to stdout only", err);
    }

    if let Err(err) = CliCommand::run_from_args() {
        eprintln!("wtdl error: {:#}", err);
        std::process::exit(1);
    }
}
