//! Token-bounded document chunking
//!
//! Splits extracted text into overlapping windows of cl100k_base tokens,
//! resolving a best-effort page number and section header for each chunk.
//! Chunking is a one-shot pure function of the input text.

use crate::config::ChunkConfig;
use crate::extract::ExtractionMetadata;
use anyhow::Result;
use compliance_types::Chunk;
use tiktoken_rs::CoreBPE;

pub struct Chunker {
    bpe: CoreBPE,
    config: ChunkConfig,
}

impl Chunker {
    pub fn new(config: ChunkConfig) -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()?;
        Ok(Self { bpe, config })
    }

    /// Split `text` into ordered, overlapping chunks.
    ///
    /// The window advances by `chunk_size - overlap` tokens, so each chunk
    /// after the first re-reads the last `overlap` tokens of its
    /// predecessor. The final chunk ends exactly at the token-stream end.
    pub fn chunk(&self, text: &str, metadata: &ExtractionMetadata) -> Vec<Chunk> {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.is_empty() {
            return Vec::new();
        }

        // Monotonic byte-offset index: offsets[i] is the byte offset of
        // token i in the decoded text. Avoids re-decoding the prefix for
        // every chunk.
        let mut offsets = Vec::with_capacity(tokens.len() + 1);
        let mut acc = 0usize;
        offsets.push(0);
        for token in &tokens {
            acc += self
                .bpe
                .decode(vec![*token])
                .map(|s| s.len())
                .unwrap_or(0);
            offsets.push(acc);
        }

        let page_map = metadata.page_map();
        let spans = window_spans(
            tokens.len(),
            self.config.chunk_size_tokens,
            self.config.overlap_tokens,
        );

        let mut chunks = Vec::with_capacity(spans.len());
        for (start, end) in spans {
            let chunk_text = self.bpe.decode(tokens[start..end].to_vec()).unwrap_or_default();

            // Highest page offset at or before the chunk start wins.
            let page = page_map.and_then(|pm| {
                pm.range(..=offsets[start]).next_back().map(|(_, p)| *p)
            });

            chunks.push(Chunk {
                text: chunk_text.trim().to_string(),
                token_count: end - start,
                page,
                section: extract_section_header(&chunk_text),
                start_token: start,
                end_token: end,
            });
        }

        chunks
    }
}

/// Compute `(start, end)` token spans for a stream of `total` tokens.
///
/// Requires `size > overlap`; the final span ends at `total` with no
/// further advance.
pub fn window_spans(total: usize, size: usize, overlap: usize) -> Vec<(usize, usize)> {
    debug_assert!(size > overlap);
    let mut spans = Vec::new();
    let mut start = 0;
    while start < total {
        let end = (start + size).min(total);
        spans.push((start, end));
        if end == total {
            break;
        }
        start = end - overlap;
    }
    spans
}

/// Scan the first three lines of a chunk for a section header: a line that
/// is fully upper-case or begins with a page marker. Truncated to 100
/// characters.
fn extract_section_header(text: &str) -> Option<String> {
    for line in text.lines().take(3) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("[PAGE") || is_upper_line(line) {
            return Some(line.chars().take(100).collect());
        }
    }
    None
}

fn is_upper_line(line: &str) -> bool {
    line.chars().any(|c| c.is_alphabetic()) && !line.chars().any(|c| c.is_lowercase())
}
