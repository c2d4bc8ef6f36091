use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::{BlockHeight, BlockRecord, HarvestError};

const EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "json.tmp";

/// Directory of persisted blocks, one `<height>.json` file per canonical height.
///
/// File presence is the checkpoint: a height counts as done once its file
/// exists, and files only ever appear through an atomic rename of a fully
/// written temporary file.
#[derive(Clone, Debug)]
pub struct BlockStore {
    dir: PathBuf,
}

impl BlockStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        BlockStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, height: BlockHeight) -> PathBuf {
        self.dir.join(format!("{height}.{EXTENSION}"))
    }

    fn temp_path_for(&self, height: BlockHeight) -> PathBuf {
        self.dir.join(format!("{height}.{TEMP_EXTENSION}"))
    }

    /// Has this height been fully persisted?
    pub async fn has_block(&self, height: BlockHeight) -> Result<bool, HarvestError> {
        let path = self.path_for(height);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| HarvestError::storage(path, e))
    }

    /// Durably write a fully resolved block, keyed by its height.
    ///
    /// Refuses blocks with any unresolved transaction. An existing file for
    /// the same height is replaced atomically.
    pub async fn persist(&self, block: BlockRecord) -> Result<PathBuf, HarvestError> {
        if let Some(tx) = block.first_unresolved() {
            return Err(HarvestError::ResolutionFailed {
                hash: tx.hash.clone(),
            });
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| HarvestError::storage(&self.dir, e))?;

        let path = self.path_for(block.height);
        let temp_path = self.temp_path_for(block.height);
        let bytes = serde_json::to_vec(&block).map_err(|source| HarvestError::Serialization {
            path: path.clone(),
            source,
        })?;

        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|e| HarvestError::storage(&temp_path, e))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| HarvestError::storage(&temp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| HarvestError::storage(&temp_path, e))?;
        drop(file);

        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| HarvestError::storage(&path, e))?;
        tracing::debug!("Persisted block {} to {}", block.height, path.display());
        Ok(path)
    }

    pub async fn load(&self, height: BlockHeight) -> Result<Option<BlockRecord>, HarvestError> {
        let path = self.path_for(height);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(HarvestError::storage(path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| HarvestError::Serialization { path, source })
    }

    /// All persisted heights in ascending order. A missing directory has none.
    pub async fn heights(&self) -> Result<Vec<BlockHeight>, HarvestError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(HarvestError::storage(&self.dir, e)),
        };

        let mut heights = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| HarvestError::storage(&self.dir, e))?
        {
            if let Some(height) = parse_height(&entry.path()) {
                heights.push(height);
            }
        }
        heights.sort();
        Ok(heights)
    }
}

fn parse_height(path: &Path) -> Option<BlockHeight> {
    if path.extension()? != EXTENSION {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok().map(BlockHeight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RemoteIndex, TransactionRecord};
    use pretty_assertions::assert_eq;

    fn block(height: u64, payloads: &[Option<&str>]) -> BlockRecord {
        BlockRecord {
            height: BlockHeight(height),
            remote_index: RemoteIndex(14849 + height),
            version: 1,
            previous_block_id: "00".repeat(32),
            timestamp: 1231006505 + height,
            transactions: payloads
                .iter()
                .enumerate()
                .map(|(idx, payload)| TransactionRecord {
                    payload: payload.map(str::to_owned),
                    ..TransactionRecord::new(format!("hash{idx}"))
                })
                .collect(),
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn persist_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::new(dir.path().join("blocks"));
        let height = BlockHeight(7);

        assert!(!store.has_block(height).await.unwrap());
        let original = block(7, &[Some("01"), Some("02")]);
        let path = store.persist(original.clone()).await.unwrap();

        assert_eq!(path, dir.path().join("blocks").join("7.json"));
        assert!(store.has_block(height).await.unwrap());
        assert!(!store.temp_path_for(height).exists());
        assert_eq!(store.load(height).await.unwrap(), Some(original));
    }

    #[tokio::test]
    async fn refuses_unresolved_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::new(dir.path());

        for payloads in [&[Some("01"), None][..], &[Some("")][..]] {
            let err = store.persist(block(3, payloads)).await.unwrap_err();
            assert!(matches!(err, HarvestError::ResolutionFailed { .. }));
        }
        assert!(!store.has_block(BlockHeight(3)).await.unwrap());
    }

    #[tokio::test]
    async fn overwrite_keeps_a_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::new(dir.path());
        store.persist(block(1, &[Some("aa")])).await.unwrap();
        store.persist(block(1, &[Some("bb")])).await.unwrap();

        let loaded = store.load(BlockHeight(1)).await.unwrap().unwrap();
        assert_eq!(loaded.transactions[0].payload.as_deref(), Some("bb"));
    }

    #[tokio::test]
    async fn heights_are_numeric_and_ignore_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::new(dir.path());
        assert!(store.heights().await.unwrap().is_empty());

        for height in [10, 2, 1] {
            store.persist(block(height, &[])).await.unwrap();
        }
        std::fs::write(dir.path().join("11.json.tmp"), b"{").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hi").unwrap();

        assert_eq!(
            store.heights().await.unwrap(),
            vec![BlockHeight(1), BlockHeight(2), BlockHeight(10)]
        );
        assert!(!store.has_block(BlockHeight(11)).await.unwrap());
    }

    #[tokio::test]
    async fn missing_block_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::new(dir.path());
        assert_eq!(store.load(BlockHeight(0)).await.unwrap(), None);
    }
}
