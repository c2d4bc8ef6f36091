//! Incremental, restartable harvesting of a public ledger from a remote indexing service.
//!
//! The [Walker] drives the crawl: it probes the remote block index, resolves
//! every transaction of a block through a bounded [TxPool], and hands the
//! fully resolved [BlockRecord] to the [BlockStore]. A height is only ever
//! checkpointed once all of its transactions have a payload.
mod classify;
mod client;
mod common;
mod config;
mod error;
pub mod export;
mod pool;
mod retry;
mod store;
mod types;
mod walker;

pub use classify::{classify_block, classify_tx, Classified, NOT_FOUND_BODY};
pub use client::{HttpLedgerClient, LedgerSource, RawResponse};
pub use common::init_logger;
pub use config::{HarvestConfig, DEFAULT_BASE_URL, GENESIS_INDEX};
pub use error::HarvestError;
pub use pool::TxPool;
pub use retry::RetryPolicy;
pub use store::BlockStore;
pub use types::{BlockHeight, BlockRecord, RemoteIndex, TransactionRecord};
pub use walker::{Step, Walker};

pub(crate) use anyhow::{Context, Result};
