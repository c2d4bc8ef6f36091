use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use ledger_harvest::{init_logger, BlockHeight, HarvestConfig, Walker, DEFAULT_BASE_URL};
use reqwest::Url;

/// Incrementally download blocks and their raw transactions from a block explorer.
///
/// Runs until interrupted. Heights already present in the blocks directory
/// are skipped, so it is safe to restart at any time.
#[derive(clap::Parser)]
struct Opt {
    /// Canonical block height to start from
    #[clap(default_value_t = 0)]
    start_height: u64,
    /// Directory holding one JSON file per stored block
    #[clap(long, env = "LEDGER_HARVEST_BLOCKS_DIR", default_value = "blocks")]
    blocks_dir: PathBuf,
    /// Root of the block explorer API
    #[clap(long, env = "LEDGER_HARVEST_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: Url,
    /// Concurrent transaction downloads per block
    #[clap(long, env = "LEDGER_HARVEST_WORKERS", default_value_t = 8)]
    workers: usize,
    /// Exit after this many failed iterations in a row
    #[clap(long, env = "LEDGER_HARVEST_MAX_CONSECUTIVE_FAILURES")]
    max_consecutive_failures: Option<u32>,
    /// Turn on verbose debugging?
    #[clap(long, env = "LEDGER_HARVEST_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    main_inner().await
}

async fn main_inner() -> Result<()> {
    let Opt {
        start_height,
        blocks_dir,
        base_url,
        workers,
        max_consecutive_failures,
        verbose,
    } = Opt::parse();

    init_logger(verbose, Some(env!("CARGO_CRATE_NAME")));

    let config = HarvestConfig {
        base_url: base_url.to_string(),
        blocks_dir,
        start_height: BlockHeight(start_height),
        max_consecutive_failures,
        ..HarvestConfig::default()
    }
    .with_workers(workers);

    let client = config.client()?;
    Walker::new(client, &config)?
        .run(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Unable to listen for Ctrl-C, running until killed: {e}");
        std::future::pending::<()>().await;
    }
}
