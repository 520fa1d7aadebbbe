//! Configuration for the compliance pipeline
//!
//! Loaded once from environment variables at startup; everything but the
//! provider API keys has a sensible default.

use anyhow::{anyhow, Result};
use std::time::Duration;

/// Which language-model backend serves a given role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Gemini,
    Groq,
}

impl LlmBackend {
    fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "gemini" => Ok(LlmBackend::Gemini),
            "groq" => Ok(LlmBackend::Groq),
            other => Err(anyhow!("Unknown LLM provider: {}", other)),
        }
    }
}

/// Chunker settings
#[derive(Debug, Clone, Copy)]
pub struct ChunkConfig {
    /// Maximum chunk length in tokens.
    pub chunk_size_tokens: usize,
    /// Backward re-read preserving cross-boundary context.
    pub overlap_tokens: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size_tokens: 512,
            overlap_tokens: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Provider credentials
    pub gemini_api_key: String,
    pub groq_api_key: String,
    pub pinecone_api_key: String,
    pub pinecone_host: String,

    // Role assignment
    pub generator_backend: LlmBackend,
    pub reviewer_backend: LlmBackend,

    // Duplicate detection
    pub semantic_similarity_threshold: f32,

    // Chunking
    pub chunking: ChunkConfig,
    /// Bounded concurrency for per-chunk LLM review.
    pub chunk_concurrency: usize,

    // External calls
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            groq_api_key: String::new(),
            pinecone_api_key: String::new(),
            pinecone_host: String::new(),
            generator_backend: LlmBackend::Groq,
            reviewer_backend: LlmBackend::Groq,
            semantic_similarity_threshold: 0.95,
            chunking: ChunkConfig::default(),
            chunk_concurrency: 4,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Expected variables:
    /// - GEMINI_API_KEY / GROQ_API_KEY
    /// - PINECONE_API_KEY, PINECONE_HOST
    /// - DEFAULT_LLM_PROVIDER / REVIEWER_LLM_PROVIDER: "gemini" or "groq"
    /// - SEMANTIC_SIMILARITY_THRESHOLD (default 0.95)
    /// - CHUNK_SIZE_TOKENS (512), CHUNK_OVERLAP_TOKENS (50), CHUNK_CONCURRENCY (4)
    /// - REQUEST_TIMEOUT_SECS (30)
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let generator_backend = match std::env::var("DEFAULT_LLM_PROVIDER") {
            Ok(v) => LlmBackend::parse(&v)?,
            Err(_) => defaults.generator_backend,
        };
        let reviewer_backend = match std::env::var("REVIEWER_LLM_PROVIDER") {
            Ok(v) => LlmBackend::parse(&v)?,
            Err(_) => defaults.reviewer_backend,
        };

        let chunking = ChunkConfig {
            chunk_size_tokens: env_parse("CHUNK_SIZE_TOKENS", defaults.chunking.chunk_size_tokens)?,
            overlap_tokens: env_parse("CHUNK_OVERLAP_TOKENS", defaults.chunking.overlap_tokens)?,
        };
        if chunking.chunk_size_tokens <= chunking.overlap_tokens {
            return Err(anyhow!(
                "CHUNK_SIZE_TOKENS ({}) must exceed CHUNK_OVERLAP_TOKENS ({})",
                chunking.chunk_size_tokens,
                chunking.overlap_tokens
            ));
        }

        Ok(Self {
            gemini_api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            groq_api_key: std::env::var("GROQ_API_KEY").unwrap_or_default(),
            pinecone_api_key: std::env::var("PINECONE_API_KEY").unwrap_or_default(),
            pinecone_host: std::env::var("PINECONE_HOST").unwrap_or_default(),
            generator_backend,
            reviewer_backend,
            semantic_similarity_threshold: env_parse(
                "SEMANTIC_SIMILARITY_THRESHOLD",
                defaults.semantic_similarity_threshold,
            )?,
            chunking,
            chunk_concurrency: env_parse("CHUNK_CONCURRENCY", defaults.chunk_concurrency)?,
            request_timeout: Duration::from_secs(env_parse(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
        })
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| anyhow!("Invalid value for {}: {}", name, value)),
        Err(_) => Ok(default),
    }
}
