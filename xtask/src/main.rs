//! `cargo xtask` entry point for ignition
//!
//! Publishes the launcher configuration format as JSON Schema.

mod gen_schemas;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask", about = "Repository maintenance for ignition")]
struct Cli {
    #[command(subcommand)]
    task: Task,
}

#[derive(Subcommand)]
enum Task {
    /// Write the config and record schemas as JSON
    GenSchemas {
        /// Output directory; defaults to `schemas/` at the workspace root
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    match Cli::parse().task {
        Task::GenSchemas { out_dir } => gen_schemas::run(out_dir),
    }
}
