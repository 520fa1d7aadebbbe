//! Append-only audit log entries
//!
//! Entries are created once and never mutated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub log_id: Uuid,
    /// e.g. "rule_created", "document_checked", "content_generated"
    pub action_type: String,
    pub actor_id: Uuid,
    pub resource_type: Option<String>,
    pub resource_id: Option<Uuid>,
    pub decision_summary: Option<String>,
    pub rule_version_used: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(action_type: &str, actor_id: Uuid) -> Self {
        Self {
            log_id: Uuid::new_v4(),
            action_type: action_type.to_string(),
            actor_id,
            resource_type: None,
            resource_id: None,
            decision_summary: None,
            rule_version_used: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_resource(mut self, resource_type: &str, resource_id: Uuid) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self.resource_id = Some(resource_id);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.decision_summary = Some(summary.into());
        self
    }

    pub fn with_rule_version(mut self, version: i32) -> Self {
        self.rule_version_used = Some(version);
        self
    }
}
