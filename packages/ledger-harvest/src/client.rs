use std::time::Duration;

use reqwest::{Client, Url};

use crate::{HarvestError, RemoteIndex};

/// Raw, unclassified response from the indexing service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// A byte channel to the remote indexing service.
///
/// Each call issues exactly one request. Implementations neither retry nor
/// classify; the only error they report is [HarvestError::Transport].
#[allow(async_fn_in_trait)]
pub trait LedgerSource {
    async fn fetch_block_index(&self, index: RemoteIndex) -> Result<RawResponse, HarvestError>;
    async fn fetch_transaction(&self, hash: &str) -> Result<RawResponse, HarvestError>;
}

impl<T: LedgerSource> LedgerSource for &T {
    async fn fetch_block_index(&self, index: RemoteIndex) -> Result<RawResponse, HarvestError> {
        (**self).fetch_block_index(index).await
    }

    async fn fetch_transaction(&self, hash: &str) -> Result<RawResponse, HarvestError> {
        (**self).fetch_transaction(hash).await
    }
}

/// [LedgerSource] speaking to a blockchain.info style HTTP API.
#[derive(Clone, Debug)]
pub struct HttpLedgerClient {
    client: Client,
    base: Url,
}

impl HttpLedgerClient {
    pub fn new(base: Url, timeout: Duration) -> crate::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("ledger-harvest/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(HttpLedgerClient { client, base })
    }

    fn block_index_url(&self, index: RemoteIndex) -> Url {
        let mut url = self.base.clone();
        url.set_path(&format!("/block-index/{index}"));
        url.set_query(Some("format=json"));
        url
    }

    fn tx_url(&self, hash: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path(&format!("/tx/{hash}"));
        url.set_query(Some("format=hex"));
        url
    }

    async fn get(
        &self,
        url: Url,
        context: impl FnOnce() -> String,
    ) -> Result<RawResponse, HarvestError> {
        let transport = |source| HarvestError::Transport {
            context: context(),
            source,
        };
        let res = self.client.get(url).send().await.map_err(transport)?;
        let status = res.status().as_u16();
        match res.text().await {
            Ok(body) => Ok(RawResponse { status, body }),
            Err(source) => Err(HarvestError::Transport {
                context: format!("reading body (status {status})"),
                source,
            }),
        }
    }
}

impl LedgerSource for HttpLedgerClient {
    async fn fetch_block_index(&self, index: RemoteIndex) -> Result<RawResponse, HarvestError> {
        tracing::debug!("Requesting block index #{index}");
        self.get(self.block_index_url(index), || {
            format!("fetching block index {index}")
        })
        .await
    }

    async fn fetch_transaction(&self, hash: &str) -> Result<RawResponse, HarvestError> {
        tracing::debug!("Requesting transaction {hash}");
        self.get(self.tx_url(hash), || format!("fetching transaction {hash}"))
            .await
    }
}
