//! Error types for idb-core.

use thiserror::Error;

/// All errors that can arise from the descriptor codec.
#[derive(Debug, Error)]
pub enum FormatError {
    /// JSON serialization error (record → text).
    #[error("failed to encode JSON: {0}")]
    Encode(#[source] serde_json::Error),

    /// Input was not valid JSON, had the wrong shape, or lacked a required key.
    /// Carries serde_json's line/column context.
    #[error("failed to decode JSON: {0}")]
    Decode(#[source] serde_json::Error),
}
