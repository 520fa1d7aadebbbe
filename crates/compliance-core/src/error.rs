//! Error taxonomy for the compliance pipeline
//!
//! Failures split into two classes: primary input processing (extraction,
//! persistence) is fatal to the request, while auxiliary signal sources
//! (vector context, AI review) degrade gracefully and never block a verdict.

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ComplianceError {
    #[error("Unsupported file format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Failed to extract text from document: {0}")]
    ExtractionFailed(#[source] anyhow::Error),

    #[error("LLM call failed: {0}")]
    LlmCallFailed(String),

    #[error("Failed to parse structured LLM output: {0}")]
    StructuredParseFailed(String),

    #[error("Vector index unavailable: {0}")]
    VectorIndexUnavailable(String),

    #[error("Rule not found: {rule_id}")]
    RuleNotFound { rule_id: Uuid },

    #[error("Submission not found: {submission_id}")]
    SubmissionNotFound { submission_id: Uuid },
}

pub type Result<T> = std::result::Result<T, ComplianceError>;
