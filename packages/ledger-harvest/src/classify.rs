//! Classification of raw-text responses from the indexing service.
//!
//! The service answers errors with plain text or HTML using the same status
//! codes and content types as real payloads, so the body has to be inspected.
//! Anything not recognized as a valid payload is treated as transient: a
//! malformed body is never accepted as data.
use crate::BlockRecord;

/// Exact body returned when a block index does not exist.
pub const NOT_FOUND_BODY: &str = "Block Not Found";

/// Number of leading characters inspected when matching error signatures.
const SIGNATURE_PREFIX_LEN: usize = 64;

/// Known error bodies, matched case-insensitively against the start of the response.
const ERROR_SIGNATURES: &[(&str, &str)] = &[
    ("<", "HTML error or rate limit page"),
    ("maximum concurrent requests", "maximum concurrent requests reached"),
    ("transaction not found", "transaction not found"),
    ("internal server error", "internal server error"),
    ("an attempt by a client", "client throttled"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified<T> {
    Ok(T),
    NotFound,
    Transient(String),
}

impl<T> Classified<T> {
    pub fn into_result(self) -> Result<T, crate::HarvestError> {
        match self {
            Classified::Ok(value) => Ok(value),
            Classified::NotFound => Err(crate::HarvestError::NotFound),
            Classified::Transient(reason) => Err(crate::HarvestError::Transient(reason)),
        }
    }
}

fn known_error(body: &str) -> Option<&'static str> {
    let prefix: String = body
        .chars()
        .take(SIGNATURE_PREFIX_LEN)
        .collect::<String>()
        .to_ascii_lowercase();
    ERROR_SIGNATURES
        .iter()
        .find(|(signature, _)| prefix.starts_with(signature))
        .map(|(_, reason)| *reason)
}

/// Classify the body of a transaction lookup, expected to be a raw hex string.
pub fn classify_tx(body: &str) -> Classified<String> {
    let body = body.trim();
    if body.is_empty() {
        return Classified::Transient("empty response body".to_owned());
    }
    if let Some(reason) = known_error(body) {
        return Classified::Transient(reason.to_owned());
    }
    match hex::decode(body) {
        Ok(_) => Classified::Ok(body.to_owned()),
        Err(e) => Classified::Transient(format!("unrecognized transaction response: {e}")),
    }
}

/// Classify the body of a block-index lookup, expected to be a JSON record.
pub fn classify_block(body: &str) -> Classified<BlockRecord> {
    let body = body.trim();
    if body == NOT_FOUND_BODY {
        return Classified::NotFound;
    }
    if let Some(reason) = known_error(body) {
        return Classified::Transient(reason.to_owned());
    }
    match serde_json::from_str(body) {
        Ok(block) => Classified::Ok(block),
        Err(e) => Classified::Transient(format!("malformed block response: {e}")),
    }
}
