//! Content submissions and the rules they trigger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the content entered the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Prompt,
    Document,
}

/// Compliance verdict for a submission.
///
/// Computed once from the triggered-rule list at creation time and never
/// recomputed afterwards; admin approval is a separate human override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceStatus {
    Pending,
    Compliant,
    Violations,
}

/// Identity of the rule behind a triggered-rule record.
///
/// `AiDetected` is the sentinel for violations the reviewing model reported
/// that could not be mapped back to any stored rule row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleRef {
    Stored(Uuid),
    AiDetected,
}

/// Whether a rule merely matched or a prohibitive match was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggeredStatus {
    /// Matched but non-prohibitive; recorded for reviewer awareness.
    Triggered,
    /// A prohibitive match was found.
    Violated,
}

/// One rule hit embedded in a submission record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggeredRule {
    pub rule_id: RuleRef,
    /// Snapshot of the rule text (or the model's reported rule) at match time.
    pub rule_text: String,
    pub category: String,
    pub severity: String,
    pub status: TriggeredStatus,
    pub explanation: Option<String>,
}

/// Admin approval decision (orthogonal to the computed verdict)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approved_by: Uuid,
    pub status: ApprovalStatus,
    pub notes: Option<String>,
}

/// A persisted content-review record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentSubmission {
    pub submission_id: Uuid,
    pub user_id: Uuid,
    pub input_type: InputType,
    /// Original prompt text or uploaded filename.
    pub input_reference: String,
    /// Generated text, or an excerpt of the extracted document.
    pub final_content: String,
    pub compliance_status: ComplianceStatus,
    pub rules_triggered: Vec<TriggeredRule>,
    pub approval: Option<ApprovalDecision>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentSubmission {
    pub fn new(
        user_id: Uuid,
        input_type: InputType,
        input_reference: String,
        final_content: String,
        compliance_status: ComplianceStatus,
        rules_triggered: Vec<TriggeredRule>,
    ) -> Self {
        let now = Utc::now();
        Self {
            submission_id: Uuid::new_v4(),
            user_id,
            input_type,
            input_reference,
            final_content,
            compliance_status,
            rules_triggered,
            approval: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rule_ref_serde_shape() {
        let stored = RuleRef::Stored(Uuid::nil());
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "stored": "00000000-0000-0000-0000-000000000000" })
        );

        let sentinel = serde_json::to_value(RuleRef::AiDetected).unwrap();
        assert_eq!(sentinel, serde_json::json!("ai_detected"));
    }

    #[test]
    fn test_new_submission_has_no_approval() {
        let submission = ContentSubmission::new(
            Uuid::new_v4(),
            InputType::Prompt,
            "write a product blurb".to_string(),
            "blurb".to_string(),
            ComplianceStatus::Compliant,
            vec![],
        );
        assert!(submission.approval.is_none());
        assert_eq!(submission.compliance_status, ComplianceStatus::Compliant);
    }
}
