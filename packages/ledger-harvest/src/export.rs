//! Flat tabular export of persisted blocks.
//!
//! Produces `<N>_blocks.csv` with one line per block, in ascending height
//! order: `ver,prev_block,time,<hex>:<hex>:...`.
use std::path::{Path, PathBuf};

use tokio::io::{AsyncWriteExt, BufWriter};

use crate::{BlockRecord, BlockStore, Context, Result};

const PROGRESS_EVERY: usize = 1000;

/// Render a single block as a CSV line, without the trailing newline.
pub fn csv_line(block: &BlockRecord) -> String {
    let txs = block
        .transactions
        .iter()
        .map(|tx| tx.payload.as_deref().unwrap_or_default())
        .collect::<Vec<_>>()
        .join(":");
    format!(
        "{},{},{},{txs}",
        block.version, block.previous_block_id, block.timestamp
    )
}

/// Read a single stored block file.
pub async fn read_block(path: impl AsRef<Path>) -> Result<BlockRecord> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Unable to read block file {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("Unable to parse block file {}", path.display()))
}

/// Export every block in `store` to `<output_dir>/<N>_blocks.csv`, returning the written path.
pub async fn blocks_to_csv(store: &BlockStore, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let heights = store.heights().await?;
    let output = output_dir
        .as_ref()
        .join(format!("{}_blocks.csv", heights.len()));
    tracing::info!(
        "Exporting {} blocks from {} to {}",
        heights.len(),
        store.dir().display(),
        output.display()
    );

    let file = tokio::fs::File::create(&output)
        .await
        .with_context(|| format!("Unable to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);

    for (idx, height) in heights.iter().enumerate() {
        let block = read_block(store.path_for(*height)).await?;
        writer.write_all(csv_line(&block).as_bytes()).await?;
        writer.write_all(b"\n").await?;

        if (idx + 1) % PROGRESS_EVERY == 0 {
            tracing::info!("Exported {}/{} blocks", idx + 1, heights.len());
        }
    }
    writer.flush().await?;

    tracing::info!("Finished exporting {} blocks", heights.len());
    Ok(output)
}
