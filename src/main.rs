//! Modgraph CLI: crawl the registry until interrupted.

use anyhow::Result;
use clap::Parser;
use modgraph::cli::Cli;
use modgraph::utils::setup_logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    modgraph::run(&cli)
}
