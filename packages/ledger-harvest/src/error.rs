use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("Transport failure while {context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Remote service reports the record does not exist")]
    NotFound,

    #[error("Transient service error: {0}")]
    Transient(String),

    #[error("Unable to resolve transaction {hash} after exhausting retries")]
    ResolutionFailed { hash: String },

    #[error("Storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to encode or decode block at {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("The {cursor} cursor cannot advance past {value}")]
    CursorOverflow { cursor: &'static str, value: u64 },

    #[error("Giving up after {count} consecutive failed iterations")]
    TooManyFailures { count: u32 },
}

impl HarvestError {
    /// Should a request that produced this error be attempted again?
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Transient(_))
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}
