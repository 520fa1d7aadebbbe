//! Shared domain types for the compliance review backend
//!
//! This crate provides:
//! - Rule and rule versioning types
//! - Content submission and triggered-rule records
//! - Chunk records produced by the document pipeline
//! - Audit log entries

pub mod audit;
pub mod chunk;
pub mod content;
pub mod rule;

pub use audit::AuditLogEntry;
pub use chunk::Chunk;
pub use content::{
    ApprovalDecision, ApprovalStatus, ComplianceStatus, ContentSubmission, InputType, RuleRef,
    TriggeredRule, TriggeredStatus,
};
pub use rule::{Rule, RuleCategory, RuleSeverity};
