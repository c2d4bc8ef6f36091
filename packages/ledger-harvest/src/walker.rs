use std::future::Future;

use crate::{
    classify_block, BlockHeight, BlockRecord, BlockStore, Context, HarvestConfig, HarvestError,
    LedgerSource, RemoteIndex, Result, RetryPolicy, TxPool,
};

/// What a single iteration of the [Walker] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The height was already persisted, nothing was fetched.
    AlreadyStored { height: BlockHeight },
    /// The service has no block at this index.
    IndexNotFound { index: RemoteIndex },
    /// The index could not be fetched even after retries and was skipped.
    IndexFailed { index: RemoteIndex, reason: String },
    /// The block at this index reports a height behind the cursor.
    HeightRegressed {
        index: RemoteIndex,
        height: BlockHeight,
    },
    /// The block at this index reports a height which is already persisted.
    DuplicateHeight {
        index: RemoteIndex,
        height: BlockHeight,
    },
    /// A transaction could not be resolved, the whole block was dropped.
    Discarded {
        index: RemoteIndex,
        height: BlockHeight,
        hash: String,
    },
    /// The block and all of its transactions were persisted.
    Persisted {
        index: RemoteIndex,
        height: BlockHeight,
    },
}

impl Step {
    /// Did this iteration lose data it should have had?
    pub fn is_failure(&self) -> bool {
        matches!(self, Step::IndexFailed { .. } | Step::Discarded { .. })
    }
}

enum Probe {
    Finished(Step),
    Resolved(BlockRecord),
}

/// Walks the remote block index, persisting every block it can fully resolve.
///
/// Two cursors are tracked: `remote_index` probes the service's sequential
/// index, `height` is the canonical height we expect next. They start
/// `genesis_index` apart but drift as the service returns orphaned or
/// duplicate entries, so the height of a fetched block always wins.
pub struct Walker<S> {
    source: S,
    store: BlockStore,
    pool: TxPool,
    index_policy: RetryPolicy,
    remote_index: RemoteIndex,
    height: BlockHeight,
    max_consecutive_failures: Option<u32>,
    consecutive_failures: u32,
}

impl<S: LedgerSource> Walker<S> {
    pub fn new(source: S, config: &HarvestConfig) -> Result<Self> {
        let remote_index = RemoteIndex::for_height(config.genesis_index, config.start_height)
            .with_context(|| {
                format!(
                    "Start height {} is out of range for genesis index {}",
                    config.start_height, config.genesis_index
                )
            })?;
        Ok(Walker {
            source,
            store: config.store(),
            pool: config.tx_pool(),
            index_policy: config.index_policy(),
            remote_index,
            height: config.start_height,
            max_consecutive_failures: config.max_consecutive_failures,
            consecutive_failures: 0,
        })
    }

    pub fn height(&self) -> BlockHeight {
        self.height
    }

    pub fn remote_index(&self) -> RemoteIndex {
        self.remote_index
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    /// Run until `shutdown` resolves or a fatal error occurs.
    ///
    /// Shutdown is honored between iterations and while waiting on the
    /// network or a retry delay, never in the middle of persisting a block.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<(), HarvestError> {
        let mut shutdown = std::pin::pin!(shutdown);
        tracing::info!(
            "Beginning harvest at height {}, remote index #{}",
            self.height,
            self.remote_index
        );

        loop {
            let probe = tokio::select! {
                biased;
                () = &mut shutdown => None,
                probe = self.probe() => Some(probe?),
            };
            let Some(probe) = probe else {
                tracing::info!(
                    "Shutdown requested, stopping at height {}, remote index #{}",
                    self.height,
                    self.remote_index
                );
                return Ok(());
            };
            let step = self.finish(probe).await?;
            self.track(&step)?;
        }
    }

    /// Perform exactly one iteration.
    pub async fn step(&mut self) -> Result<Step, HarvestError> {
        let probe = self.probe().await?;
        let step = self.finish(probe).await?;
        self.track(&step)?;
        Ok(step)
    }

    /// Everything up to, but excluding, persisting.
    ///
    /// Cursors are only updated after the last await of each branch, so
    /// dropping this future leaves the walker where it was.
    async fn probe(&mut self) -> Result<Probe, HarvestError> {
        let height = self.height;
        let index = self.remote_index;

        if self.store.has_block(height).await? {
            tracing::info!("Skipped block {height}");
            let following = next_height(height)?;
            self.remote_index = next_index(index)?;
            self.height = following;
            return Ok(Probe::Finished(Step::AlreadyStored { height }));
        }

        tracing::info!("Retrieving index #{index}");
        let mut block = match self.fetch_block(index).await {
            Ok(block) => block,
            Err(HarvestError::NotFound) => {
                tracing::warn!("Block index #{index} not found, skipping block index...");
                self.remote_index = next_index(index)?;
                return Ok(Probe::Finished(Step::IndexNotFound { index }));
            }
            Err(err) => {
                tracing::warn!("Unable to retrieve block index #{index}, skipping: {err}");
                self.remote_index = next_index(index)?;
                return Ok(Probe::Finished(Step::IndexFailed {
                    index,
                    reason: err.to_string(),
                }));
            }
        };
        block.remote_index = index;

        if block.height < height {
            tracing::warn!(
                "Block index #{index} holds height {}, behind expected height {height}, skipping",
                block.height
            );
            self.remote_index = next_index(index)?;
            return Ok(Probe::Finished(Step::HeightRegressed {
                index,
                height: block.height,
            }));
        }

        let Some(after_block) = block.height.next() else {
            tracing::warn!(
                "Block index #{index} reports out of range height {}, skipping",
                block.height
            );
            self.remote_index = next_index(index)?;
            return Ok(Probe::Finished(Step::IndexFailed {
                index,
                reason: format!("height {} has no successor", block.height),
            }));
        };

        if block.height != height && self.store.has_block(block.height).await? {
            tracing::info!(
                "Block index #{index} holds already stored height {}",
                block.height
            );
            self.remote_index = next_index(index)?;
            self.height = after_block;
            return Ok(Probe::Finished(Step::DuplicateHeight {
                index,
                height: block.height,
            }));
        }

        tracing::info!(
            "Retrieved block #{} with {} transactions",
            block.height,
            block.transactions.len()
        );

        let resolved = self
            .pool
            .resolve(&self.source, &block.tx_hashes())
            .await
            .and_then(|payloads| block.attach_payloads(payloads));
        match resolved {
            Ok(()) => {
                self.remote_index = next_index(index)?;
                self.height = after_block;
                Ok(Probe::Resolved(block))
            }
            Err(HarvestError::ResolutionFailed { hash }) => {
                tracing::error!(
                    "Error retrieving transaction {hash}. Skipping block {}...",
                    block.height
                );
                self.remote_index = next_index(index)?;
                Ok(Probe::Finished(Step::Discarded {
                    index,
                    height: block.height,
                    hash,
                }))
            }
            Err(err) => Err(err),
        }
    }

    async fn fetch_block(&self, index: RemoteIndex) -> Result<BlockRecord, HarvestError> {
        let source = &self.source;
        self.index_policy
            .run(&format!("block index #{index}"), || async move {
                let raw = source.fetch_block_index(index).await?;
                classify_block(&raw.body).into_result()
            })
            .await
    }

    async fn finish(&mut self, probe: Probe) -> Result<Step, HarvestError> {
        match probe {
            Probe::Finished(step) => Ok(step),
            Probe::Resolved(block) => {
                let index = block.remote_index;
                let height = block.height;
                self.store.persist(block).await?;
                tracing::info!("Stored block {height} from remote index #{index}");
                Ok(Step::Persisted { index, height })
            }
        }
    }

    fn track(&mut self, step: &Step) -> Result<(), HarvestError> {
        if !step.is_failure() {
            self.consecutive_failures = 0;
            return Ok(());
        }

        self.consecutive_failures += 1;
        match self.max_consecutive_failures {
            Some(max) if self.consecutive_failures >= max => {
                tracing::error!("Reached {max} consecutive failures, giving up");
                Err(HarvestError::TooManyFailures {
                    count: self.consecutive_failures,
                })
            }
            _ => Ok(()),
        }
    }
}

fn next_index(index: RemoteIndex) -> Result<RemoteIndex, HarvestError> {
    index.next().ok_or(HarvestError::CursorOverflow {
        cursor: "remote index",
        value: index.0,
    })
}

fn next_height(height: BlockHeight) -> Result<BlockHeight, HarvestError> {
    height.next().ok_or(HarvestError::CursorOverflow {
        cursor: "height",
        value: height.0,
    })
}
