use futures_util::{stream, StreamExt, TryStreamExt};

use crate::{classify_tx, HarvestError, LedgerSource, RetryPolicy};

/// Resolves every transaction of one block to its hex payload, with bounded concurrency.
#[derive(Clone, Copy, Debug)]
pub struct TxPool {
    workers: usize,
    policy: RetryPolicy,
}

impl TxPool {
    pub fn new(workers: usize, policy: RetryPolicy) -> Self {
        TxPool {
            workers: workers.max(1),
            policy,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Resolve all `hashes`, returning the payloads in the same order.
    ///
    /// Either every hash gets a payload, or the call fails with
    /// [HarvestError::ResolutionFailed] for the first hash found to be
    /// unresolvable. On failure all other in-flight requests for the block
    /// are dropped.
    pub async fn resolve<S: LedgerSource>(
        &self,
        source: &S,
        hashes: &[String],
    ) -> Result<Vec<String>, HarvestError> {
        let mut slots: Vec<Option<String>> = vec![None; hashes.len()];

        let mut resolved = stream::iter(hashes.iter().enumerate())
            .map(|(idx, hash)| async move {
                self.resolve_one(source, hash)
                    .await
                    .map(|payload| (idx, payload))
            })
            .buffer_unordered(self.workers);

        while let Some((idx, payload)) = resolved.try_next().await? {
            slots[idx] = Some(payload);
        }

        slots
            .into_iter()
            .zip(hashes)
            .map(|(slot, hash)| {
                slot.ok_or_else(|| HarvestError::ResolutionFailed { hash: hash.clone() })
            })
            .collect()
    }

    async fn resolve_one<S: LedgerSource>(
        &self,
        source: &S,
        hash: &str,
    ) -> Result<String, HarvestError> {
        tracing::info!("Downloading tx: {hash}");
        self.policy
            .run(hash, || async {
                let raw = source.fetch_transaction(hash).await?;
                classify_tx(&raw.body).into_result()
            })
            .await
            .map_err(|err| {
                tracing::warn!("Giving up on transaction {hash}: {err}");
                HarvestError::ResolutionFailed {
                    hash: hash.to_owned(),
                }
            })
    }
}
