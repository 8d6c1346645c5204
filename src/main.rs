//! Deskgraph - graph-powered ticket management engine
//!
//! Tickets, people, categories, SLAs and knowledge articles form a
//! property graph. The engine keeps derived relationships in sync,
//! classifies tickets through an external scorer behind a confidence
//! gate, and serves keyword-ranked search.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // Parse CLI args and run
    let cli = cli::Cli::parse();
    cli::run(cli)
}
