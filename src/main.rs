use clap::Parser;
use color_eyre::Result;

use vpnwatch::cli::args::Args;
use vpnwatch::cli::commands;
use vpnwatch::logger::init_logger;

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    init_logger(args.log_level.into());

    commands::execute(args)
}
