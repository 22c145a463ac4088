//! Entry point for the headless 3-D space-colonization runner.
//!
//! Parses [`runner::Args`], installs a `tracing` subscriber driven by
//! `RUST_LOG` (default `info`), and hands control to [`runner::Runner`].

mod runner;

use anyhow::Result;
use clap::Parser;
use runner::{Args, Runner};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut runner = Runner::new(args)?;
    runner.run();
    print!("{}", runner.summary());
    Ok(())
}
