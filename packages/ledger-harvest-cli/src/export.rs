use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use ledger_harvest::{export, init_logger, BlockStore};

/// Convert stored blocks into a single `<N>_blocks.csv` file.
#[derive(clap::Parser)]
struct Opt {
    /// Directory holding one JSON file per stored block
    #[clap(long, env = "LEDGER_HARVEST_BLOCKS_DIR", default_value = "blocks")]
    blocks_dir: PathBuf,
    /// Where to write the CSV file
    #[clap(long, env = "LEDGER_EXPORT_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,
    /// Turn on verbose debugging?
    #[clap(long, env = "LEDGER_HARVEST_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let Opt {
        blocks_dir,
        output_dir,
        verbose,
    } = Opt::parse();

    init_logger(verbose, Some(env!("CARGO_CRATE_NAME")));

    let output = export::blocks_to_csv(&BlockStore::new(blocks_dir), output_dir).await?;
    println!("{}", output.display());
    Ok(())
}
