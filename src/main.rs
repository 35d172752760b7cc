use clap::Parser;
use gcodestream::{init_logging, Cli};
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let status = gcodestream::run(cli)?;
    Ok(ExitCode::from(status))
}
