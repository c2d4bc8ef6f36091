use std::{path::PathBuf, time::Duration};

use reqwest::Url;

use crate::{
    BlockHeight, BlockStore, Context, HttpLedgerClient, RemoteIndex, Result, RetryPolicy, TxPool,
};

pub const DEFAULT_BASE_URL: &str = "https://blockchain.info";

/// Remote index of the genesis block on blockchain.info.
pub const GENESIS_INDEX: RemoteIndex = RemoteIndex(14849);

const DEFAULT_WORKERS: usize = 8;

/// Settings for a harvesting run.
#[derive(Clone, Debug)]
pub struct HarvestConfig {
    pub base_url: String,
    pub blocks_dir: PathBuf,
    pub start_height: BlockHeight,
    /// Remote index corresponding to height 0.
    pub genesis_index: RemoteIndex,
    /// Concurrent transaction fetches per block.
    pub workers: usize,
    pub tx_max_attempts: usize,
    pub tx_retry_delay: Duration,
    pub index_max_attempts: usize,
    pub index_retry_delay: Duration,
    pub request_timeout: Duration,
    /// Stop after this many failed iterations in a row. [None] never stops.
    pub max_consecutive_failures: Option<u32>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        HarvestConfig {
            base_url: DEFAULT_BASE_URL.to_owned(),
            blocks_dir: PathBuf::from("blocks"),
            start_height: BlockHeight::start(),
            genesis_index: GENESIS_INDEX,
            workers: DEFAULT_WORKERS,
            tx_max_attempts: DEFAULT_WORKERS * 10,
            tx_retry_delay: Duration::from_secs(1),
            index_max_attempts: 5,
            index_retry_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            max_consecutive_failures: None,
        }
    }
}

impl HarvestConfig {
    /// Change the worker count, keeping the retry ceiling at ten attempts per worker.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self.tx_max_attempts = self.workers * 10;
        self
    }

    pub fn client(&self) -> Result<HttpLedgerClient> {
        let base = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid indexing service URL: {}", self.base_url))?;
        HttpLedgerClient::new(base, self.request_timeout)
    }

    pub fn store(&self) -> BlockStore {
        BlockStore::new(&self.blocks_dir)
    }

    pub fn tx_pool(&self) -> TxPool {
        TxPool::new(
            self.workers,
            RetryPolicy::new(self.tx_max_attempts, self.tx_retry_delay),
        )
    }

    pub fn index_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.index_max_attempts, self.index_retry_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_public_service() {
        let config = HarvestConfig::default();
        assert_eq!(config.workers, 8);
        assert_eq!(config.tx_max_attempts, 80);
        assert_eq!(config.genesis_index, RemoteIndex(14849));
        assert_eq!(config.tx_pool().workers(), 8);
        assert!(config.client().is_ok());
    }

    #[test]
    fn workers_scale_retry_ceiling() {
        let config = HarvestConfig::default().with_workers(3);
        assert_eq!(config.tx_max_attempts, 30);
        assert_eq!(HarvestConfig::default().with_workers(0).workers, 1);
    }

    #[test]
    fn rejects_bad_base_url() {
        let config = HarvestConfig {
            base_url: "not a url".to_owned(),
            ..HarvestConfig::default()
        };
        assert!(config.client().is_err());
    }
}
