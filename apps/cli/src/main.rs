//! opws-builder CLI: static publisher for opws datasets.
//!
//! Reads a versioned directory of YAML documents and writes per-item and
//! bundled JSON/JSONP artifacts under `<outDir>/<tag>/latest/`.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
