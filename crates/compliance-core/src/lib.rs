//! Compliance Core - Review pipeline for AI-assisted regulated content
//!
//! This crate provides:
//! - Document text extraction (PDF, DOCX, plain text)
//! - Token-window chunking with page and section tracking
//! - Rule storage, immutable versioning, and embedding sync
//! - Duplicate rule detection (exact and semantic)
//! - LLM-judged compliance evaluation with a deterministic fallback
//! - The submission pipeline: document review, generation, approval
//! - Provider clients (Gemini, Groq, Pinecone) behind trait seams

pub mod audit;
pub mod chunker;
pub mod config;
pub mod dedup;
pub mod error;
pub mod evaluator;
pub mod extract;
pub mod pipeline;
pub mod providers;
pub mod rules;
pub mod testing;

// Re-export commonly used types
pub use audit::{AuditSink, MemoryAuditSink};
pub use chunker::Chunker;
pub use config::{ChunkConfig, Config, LlmBackend};
pub use dedup::{DuplicateDetector, DuplicateMatch, DuplicateReport};
pub use error::{ComplianceError, Result};
pub use evaluator::{AiReview, Evaluator};
pub use extract::{ExtractedDocument, ExtractionMetadata};
pub use pipeline::{
    ChunkReview, ContentPipeline, DocumentReviewOutcome, GenerateRequest, GenerationOutcome,
    MemorySubmissionRepository, SubmissionRepository,
};
pub use providers::{LlmProvider, VectorProvider};
pub use rules::{MemoryRuleRepository, RuleRepository, RuleService};
