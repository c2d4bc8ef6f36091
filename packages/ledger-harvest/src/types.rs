use std::fmt::Display;

use serde_json::{Map, Value};

use crate::HarvestError;

/// Canonical height of a block in the ledger, used as the persistence key.
#[derive(
    serde::Serialize,
    serde::Deserialize,
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
#[serde(transparent)]
pub struct BlockHeight(pub u64);

impl BlockHeight {
    /// The following height, or [None] at `u64::MAX`.
    pub fn next(self) -> Option<BlockHeight> {
        self.0.checked_add(1).map(BlockHeight)
    }

    pub fn start() -> BlockHeight {
        BlockHeight(0)
    }
}

impl Display for BlockHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Position in the remote service's own sequential block index.
///
/// Not guaranteed to line up with [BlockHeight]: orphaned or superseded
/// entries occupy indices too.
#[derive(
    serde::Serialize,
    serde::Deserialize,
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
#[serde(transparent)]
pub struct RemoteIndex(pub u64);

impl RemoteIndex {
    pub fn next(self) -> Option<RemoteIndex> {
        self.0.checked_add(1).map(RemoteIndex)
    }

    /// Index the walker starts probing at for a given starting height.
    pub fn for_height(genesis: RemoteIndex, height: BlockHeight) -> Option<RemoteIndex> {
        genesis.0.checked_add(height.0).map(RemoteIndex)
    }
}

impl Display for RemoteIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A block as returned by the indexing service and as stored on disk.
///
/// Field names follow the remote service's JSON. Anything else the service
/// returns is kept in `extra` and written back out untouched.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct BlockRecord {
    pub height: BlockHeight,
    #[serde(rename = "block_index", default)]
    pub remote_index: RemoteIndex,
    #[serde(rename = "ver")]
    pub version: u64,
    #[serde(rename = "prev_block")]
    pub previous_block_id: String,
    #[serde(rename = "time")]
    pub timestamp: u64,
    #[serde(rename = "tx", default)]
    pub transactions: Vec<TransactionRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct TransactionRecord {
    pub hash: String,
    /// Raw hex-encoded transaction, absent until resolved.
    #[serde(rename = "hex", default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TransactionRecord {
    pub fn new(hash: impl Into<String>) -> Self {
        TransactionRecord {
            hash: hash.into(),
            payload: None,
            extra: Map::new(),
        }
    }
}

impl BlockRecord {
    /// Transaction hashes in the order the service returned them.
    pub fn tx_hashes(&self) -> Vec<String> {
        self.transactions.iter().map(|tx| tx.hash.clone()).collect()
    }

    /// Does every transaction carry a non-empty payload?
    pub fn is_fully_resolved(&self) -> bool {
        self.first_unresolved().is_none()
    }

    pub(crate) fn first_unresolved(&self) -> Option<&TransactionRecord> {
        self.transactions
            .iter()
            .find(|tx| !tx.payload.as_deref().is_some_and(|hex| !hex.is_empty()))
    }

    /// Attach resolved payloads, which must be in the same order as [Self::tx_hashes].
    ///
    /// Fails with the first transaction left without a payload.
    pub fn attach_payloads(&mut self, payloads: Vec<String>) -> Result<(), HarvestError> {
        for (tx, payload) in self.transactions.iter_mut().zip(payloads) {
            tx.payload = Some(payload);
        }
        match self.first_unresolved() {
            Some(tx) => Err(HarvestError::ResolutionFailed {
                hash: tx.hash.clone(),
            }),
            None => Ok(()),
        }
    }
}
