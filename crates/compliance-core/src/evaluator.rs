//! Compliance evaluation
//!
//! Two coexisting modes: a structured LLM judgment (primary) and
//! deterministic keyword heuristics (fallback for a failed chunk review,
//! and a parallel secondary pass in the content-generation flow). An LLM
//! failure never aborts evaluation; it downgrades that one step to the
//! deterministic check.

use crate::error::Result;
use crate::providers::LlmProvider;
use compliance_types::{Chunk, Rule, RuleRef, TriggeredRule, TriggeredStatus};
use serde_json::json;
use std::sync::Arc;

/// Phrases marking a rule as prohibitive.
const PROHIBITIVE_MARKERS: [&str; 3] = ["must not", "never", "prohibited"];

/// Words carrying no matching signal, dropped before keyword extraction.
const STOP_WORDS: [&str; 11] = [
    "must", "not", "never", "should", "be", "the", "a", "an", "is", "prohibited", "forbidden",
];

/// A rule is prohibitive when its text forbids something outright.
pub fn is_prohibitive(rule_text: &str) -> bool {
    let lower = rule_text.to_lowercase();
    PROHIBITIVE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Extract up to five matchable keywords from a rule: stop-words removed,
/// boundary punctuation stripped, tokens longer than three characters.
pub fn extract_keywords(rule_text: &str) -> Vec<String> {
    rule_text
        .to_lowercase()
        .split_whitespace()
        .filter(|w| !STOP_WORDS.contains(w) && w.len() > 3)
        .map(|w| w.trim_matches(|c: char| ".,;:!?".contains(c)).to_string())
        .filter(|w| !w.is_empty())
        .take(5)
        .collect()
}

/// Result of the deterministic full-content pass
#[derive(Debug, Clone, Default)]
pub struct ContentValidation {
    pub violations: Vec<TriggeredRule>,
    /// Non-prohibitive rules, recorded for reviewer awareness.
    pub triggered: Vec<TriggeredRule>,
}

/// One issue the reviewing model flagged
#[derive(Debug, Clone)]
pub struct AiIssue {
    pub rule_violated: String,
    pub severity: String,
    pub explanation: Option<String>,
}

/// Full-content AI review outcome
#[derive(Debug, Clone)]
pub struct AiReview {
    pub compliance_issues: Vec<AiIssue>,
    pub risk_level: String,
    pub recommendations: Vec<String>,
}

impl Default for AiReview {
    fn default() -> Self {
        Self {
            compliance_issues: Vec::new(),
            risk_level: "UNKNOWN".to_string(),
            recommendations: Vec::new(),
        }
    }
}

pub struct Evaluator {
    llm: Arc<dyn LlmProvider>,
}

impl Evaluator {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Review one chunk against the active rules via a structured LLM call.
    ///
    /// Reported violations are resolved back to stored rules by substring
    /// containment of the rule's canonical text inside the model's
    /// `rule_violated` string; paraphrased reports keep their signal under
    /// the `AiDetected` sentinel. An LLM failure falls back to the
    /// deterministic keyword check for this chunk only.
    pub async fn review_chunk(&self, chunk: &Chunk, rules: &[Rule]) -> Vec<TriggeredRule> {
        match self.llm_review(&chunk.text, rules).await {
            Ok(violations) => violations,
            Err(e) => {
                tracing::warn!(error = %e, "Chunk AI review failed; using keyword fallback");
                keyword_violations(&chunk.text, rules)
            }
        }
    }

    async fn llm_review(&self, text: &str, rules: &[Rule]) -> Result<Vec<TriggeredRule>> {
        let rules_text = rule_bullets(rules, rules.len());
        let schema = json!({
            "compliance_issues": [
                {
                    "rule_violated": "string",
                    "severity": "string",
                    "category": "string",
                    "explanation": "string"
                }
            ]
        });

        let prompt = format!(
            "Role: You are a precise Compliance Auditor.\n\
             Check this document section for compliance violations.\n\n\
             Section Content:\n\"\"\"\n{text}\n\"\"\"\n\n\
             Active Regulations:\n{rules_text}\n\n\
             INSTRUCTIONS:\n\
             1. Identify specific violations of the regulations.\n\
             2. Return ONLY violations that are clearly present.\n\
             3. If no violations, return empty list.\n\
             4. Categorize each violation (e.g. REGULATORY, BRAND, SEO)."
        );

        let parsed = self
            .llm
            .generate_structured(
                &prompt,
                Some("You are a strict but fair compliance auditor."),
                Some(&schema),
            )
            .await?;

        let issues = parsed
            .get("compliance_issues")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut violations = Vec::with_capacity(issues.len());
        for issue in issues {
            let rule_violated = issue
                .get("rule_violated")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            let matched = rules.iter().find(|r| rule_violated.contains(&r.rule_text));

            violations.push(TriggeredRule {
                rule_id: matched
                    .map(|r| RuleRef::Stored(r.rule_id))
                    .unwrap_or(RuleRef::AiDetected),
                rule_text: rule_violated,
                category: field_upper(&issue, "category", "GENERAL"),
                severity: field_upper(&issue, "severity", "MEDIUM"),
                status: TriggeredStatus::Violated,
                explanation: issue
                    .get("explanation")
                    .and_then(|v| v.as_str())
                    .map(String::from),
            });
        }

        Ok(violations)
    }

    /// Full-content AI review. Failures degrade to an empty review with
    /// risk level UNKNOWN rather than blocking the verdict.
    pub async fn ai_review(&self, content: &str, rules: &[Rule]) -> AiReview {
        let rules_text = rule_bullets(rules, 15);
        let schema = json!({
            "compliance_issues": [
                { "rule_violated": "string", "severity": "string", "explanation": "string" }
            ],
            "risk_level": "string",
            "recommendations": ["string"]
        });

        let prompt = format!(
            "Review this content for compliance issues.\n\n\
             Content:\n{content}\n\n\
             Rules to check:\n{rules_text}\n\n\
             Identify any violations or risks."
        );

        let parsed = match self
            .llm
            .generate_structured(
                &prompt,
                Some("You are a strict compliance reviewer. Flag any potential violations."),
                Some(&schema),
            )
            .await
        {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "AI review failed");
                return AiReview::default();
            }
        };

        let compliance_issues = parsed
            .get("compliance_issues")
            .and_then(|v| v.as_array())
            .map(|issues| {
                issues
                    .iter()
                    .map(|issue| AiIssue {
                        rule_violated: issue
                            .get("rule_violated")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        severity: field_upper(issue, "severity", "MEDIUM"),
                        explanation: issue
                            .get("explanation")
                            .and_then(|v| v.as_str())
                            .map(String::from),
                    })
                    .collect()
            })
            .unwrap_or_default();

        AiReview {
            compliance_issues,
            risk_level: parsed
                .get("risk_level")
                .and_then(|v| v.as_str())
                .unwrap_or("UNKNOWN")
                .to_string(),
            recommendations: parsed
                .get("recommendations")
                .and_then(|v| v.as_array())
                .map(|r| {
                    r.iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// Deterministic keyword check: prohibitive rules whose keyword extract
/// appears in the content are violations. Used as the per-chunk fallback.
pub fn keyword_violations(content: &str, rules: &[Rule]) -> Vec<TriggeredRule> {
    let content_lower = content.to_lowercase();
    rules
        .iter()
        .filter(|rule| is_prohibitive(&rule.rule_text))
        .filter(|rule| {
            extract_keywords(&rule.rule_text)
                .iter()
                .any(|kw| content_lower.contains(kw))
        })
        .map(|rule| TriggeredRule {
            rule_id: RuleRef::Stored(rule.rule_id),
            rule_text: rule.rule_text.clone(),
            category: rule.category.as_str().to_string(),
            severity: rule.severity.as_str().to_string(),
            status: TriggeredStatus::Violated,
            explanation: None,
        })
        .collect()
}

/// Deterministic full-content pass: prohibitive keyword hits become
/// violations; non-prohibitive rules are unconditionally recorded as
/// triggered so reviewers see them even absent a hit.
pub fn validate_content(content: &str, rules: &[Rule]) -> ContentValidation {
    let content_lower = content.to_lowercase();
    let mut result = ContentValidation::default();

    for rule in rules {
        if is_prohibitive(&rule.rule_text) {
            let hit = extract_keywords(&rule.rule_text)
                .iter()
                .any(|kw| content_lower.contains(kw));
            if hit {
                result.violations.push(TriggeredRule {
                    rule_id: RuleRef::Stored(rule.rule_id),
                    rule_text: rule.rule_text.clone(),
                    category: rule.category.as_str().to_string(),
                    severity: rule.severity.as_str().to_string(),
                    status: TriggeredStatus::Violated,
                    explanation: None,
                });
            }
        } else {
            result.triggered.push(TriggeredRule {
                rule_id: RuleRef::Stored(rule.rule_id),
                rule_text: rule.rule_text.clone(),
                category: rule.category.as_str().to_string(),
                severity: rule.severity.as_str().to_string(),
                status: TriggeredStatus::Triggered,
                explanation: None,
            });
        }
    }

    result
}

fn rule_bullets(rules: &[Rule], limit: usize) -> String {
    rules
        .iter()
        .take(limit)
        .map(|r| format!("- {}", r.rule_text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn field_upper(issue: &serde_json::Value, field: &str, default: &str) -> String {
    issue
        .get(field)
        .and_then(|v| v.as_str())
        .unwrap_or(default)
        .to_uppercase()
}
