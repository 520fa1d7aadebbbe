//! Token-bounded document chunks
//!
//! Chunks are ephemeral: one evaluation pass owns them and discards them
//! after aggregation.

use serde::{Deserialize, Serialize};

/// One token-bounded span of a source document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub token_count: usize,
    /// Best-effort source page (PDF inputs only).
    pub page: Option<u32>,
    /// Detected section header, truncated to 100 characters.
    pub section: Option<String>,
    pub start_token: usize,
    pub end_token: usize,
}
