//! Reefmark - Coral image annotation editor
//!
//! Headless entry point: opens a dataset, lets the editing session settle,
//! and writes the composited view to a PNG.

mod driver;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const USAGE: &str = concat!("usage: ", env!("CARGO_BIN_NAME"), " <frames.json> [output.png]");

fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut args = std::env::args().skip(1);
    let Some(dataset) = args.next().map(PathBuf::from) else {
        bail!(USAGE);
    };
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| dataset.with_extension("png"));

    info!("Reefmark starting...");
    let runtime = tokio::runtime::Runtime::new().context("Failed to start the async runtime")?;
    runtime.block_on(driver::run(&dataset, &output))
}
