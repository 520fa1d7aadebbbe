//! Versioned compliance rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rule category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    Regulatory,
    Brand,
    Seo,
}

impl RuleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::Regulatory => "regulatory",
            RuleCategory::Brand => "brand",
            RuleCategory::Seo => "seo",
        }
    }

    /// Parse a category label, accepting the upper-case spellings LLM
    /// responses tend to use.
    pub fn parse(label: &str) -> Option<Self> {
        match label.to_lowercase().as_str() {
            "regulatory" | "irdai" => Some(RuleCategory::Regulatory),
            "brand" => Some(RuleCategory::Brand),
            "seo" => Some(RuleCategory::Seo),
            _ => None,
        }
    }
}

/// Rule severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    Low,
    Medium,
    High,
}

impl RuleSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleSeverity::Low => "low",
            RuleSeverity::Medium => "medium",
            RuleSeverity::High => "high",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.to_lowercase().as_str() {
            "low" => Some(RuleSeverity::Low),
            "medium" => Some(RuleSeverity::Medium),
            "high" => Some(RuleSeverity::High),
            _ => None,
        }
    }
}

/// A single versioned rule row.
///
/// Updating a rule never mutates an existing row: the current version is
/// deactivated and a new row is inserted at `max(version for the lineage) + 1`.
/// Only rows with `is_active` participate in compliance evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: Uuid,
    pub rule_text: String,
    pub category: RuleCategory,
    pub severity: RuleSeverity,
    pub is_active: bool,
    pub version: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// Build a fresh version-1 rule row.
    pub fn new(
        rule_text: String,
        category: RuleCategory,
        severity: RuleSeverity,
        created_by: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            rule_id: Uuid::new_v4(),
            rule_text,
            category,
            severity,
            is_active: true,
            version: 1,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}
