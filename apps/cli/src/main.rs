//! kustbench CLI: synthetic configuration-tree generator and build benchmark.
//!
//! Writes deeply nested overlay trees (bases, file-backed resources, subtrees
//! and alternating patch encodings) and times a build engine over them.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
