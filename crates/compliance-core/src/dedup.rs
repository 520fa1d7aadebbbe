//! Duplicate rule detection
//!
//! Two-phase check against the full rule set (all versions, not just
//! active): exact normalized comparison first, then vector
//! nearest-neighbor similarity. A vector index outage degrades to
//! exact-matches-only with no overall failure.

use crate::error::Result;
use crate::providers::{LlmProvider, VectorProvider};
use crate::rules::{RuleRepository, RULE_NAMESPACE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateMatchType {
    Exact,
    Semantic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateMatch {
    pub rule_id: String,
    pub rule_text: String,
    /// 1.0 means identical; semantic matches carry the index's score.
    pub similarity_score: f32,
    pub match_type: DuplicateMatchType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateReport {
    pub is_duplicate: bool,
    pub matches: Vec<DuplicateMatch>,
}

pub struct DuplicateDetector {
    repo: Arc<dyn RuleRepository>,
    llm: Arc<dyn LlmProvider>,
    vectors: Arc<dyn VectorProvider>,
    similarity_threshold: f32,
}

impl DuplicateDetector {
    pub fn new(
        repo: Arc<dyn RuleRepository>,
        llm: Arc<dyn LlmProvider>,
        vectors: Arc<dyn VectorProvider>,
        similarity_threshold: f32,
    ) -> Self {
        Self {
            repo,
            llm,
            vectors,
            similarity_threshold,
        }
    }

    /// Check a candidate rule text for duplicates.
    pub async fn check_duplicates(&self, rule_text: &str) -> Result<DuplicateReport> {
        let mut matches = Vec::new();

        // Phase 1: exact normalized match among rules whose raw text
        // loosely contains the candidate.
        let normalized = normalize_text(rule_text);
        let candidate_lower = rule_text.to_lowercase();
        for rule in self.repo.list_all().await? {
            if !rule.rule_text.to_lowercase().contains(&candidate_lower) {
                continue;
            }
            if normalize_text(&rule.rule_text) == normalized {
                matches.push(DuplicateMatch {
                    rule_id: rule.rule_id.to_string(),
                    rule_text: rule.rule_text,
                    similarity_score: 1.0,
                    match_type: DuplicateMatchType::Exact,
                });
            }
        }

        // Phase 2: vector nearest neighbors above the threshold, skipping
        // ids already matched exactly.
        match self.semantic_matches(rule_text).await {
            Ok(semantic) => {
                for m in semantic {
                    if m.score >= self.similarity_threshold
                        && !matches.iter().any(|existing| existing.rule_id == m.id)
                    {
                        let rule_text = m
                            .metadata
                            .get("rule_text")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string();
                        matches.push(DuplicateMatch {
                            rule_id: m.id,
                            rule_text,
                            similarity_score: m.score,
                            match_type: DuplicateMatchType::Semantic,
                        });
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Semantic similarity check failed; exact matches only");
            }
        }

        Ok(DuplicateReport {
            is_duplicate: !matches.is_empty(),
            matches,
        })
    }

    async fn semantic_matches(
        &self,
        rule_text: &str,
    ) -> Result<Vec<crate::providers::VectorMatch>> {
        let embedding = self.llm.create_embedding(rule_text).await?;
        self.vectors
            .query(&embedding, 5, None, Some(RULE_NAMESPACE))
            .await
    }
}

/// Normalize rule text for comparison: lowercase, collapse whitespace,
/// strip boundary punctuation. Idempotent.
pub fn normalize_text(text: &str) -> String {
    let collapsed = text
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    collapsed
        .trim_matches(|c: char| ".,;:!? ".contains(c))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::VectorMatch;
    use crate::rules::MemoryRuleRepository;
    use crate::testing::{StubLlm, StubVectors};
    use compliance_types::{Rule, RuleCategory, RuleSeverity};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use uuid::Uuid;

    async fn seeded_repo(texts: &[&str]) -> Arc<MemoryRuleRepository> {
        let repo = Arc::new(MemoryRuleRepository::new());
        for text in texts {
            repo.insert(Rule::new(
                text.to_string(),
                RuleCategory::Regulatory,
                RuleSeverity::High,
                Uuid::new_v4(),
            ))
            .await
            .unwrap();
        }
        repo
    }

    #[test]
    fn test_normalize_collapses_and_strips() {
        assert_eq!(
            normalize_text("  Claims   MUST not\tpromise returns!  "),
            "claims must not promise returns"
        );
    }

    #[tokio::test]
    async fn test_exact_duplicate_scores_one() {
        let repo = seeded_repo(&["Never promise guaranteed returns."]).await;
        let detector = DuplicateDetector::new(
            repo,
            Arc::new(StubLlm::failing()),
            Arc::new(StubVectors::unavailable()),
            0.95,
        );

        let report = detector
            .check_duplicates("Never promise guaranteed returns.")
            .await
            .unwrap();
        assert!(report.is_duplicate);
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].match_type, DuplicateMatchType::Exact);
        assert_eq!(report.matches[0].similarity_score, 1.0);
    }

    #[tokio::test]
    async fn test_fresh_text_is_not_duplicate() {
        let repo = seeded_repo(&["Never promise guaranteed returns."]).await;
        let detector = DuplicateDetector::new(
            repo,
            Arc::new(StubLlm::failing().with_embedding(vec![0.1; 4])),
            Arc::new(StubVectors::empty()),
            0.95,
        );

        let report = detector
            .check_duplicates("Cite sources for every statistic")
            .await
            .unwrap();
        assert!(!report.is_duplicate);
        assert!(report.matches.is_empty());
    }

    #[tokio::test]
    async fn test_semantic_match_filtered_by_threshold() {
        let repo = seeded_repo(&[]).await;
        let near = Uuid::new_v4().to_string();
        let far = Uuid::new_v4().to_string();
        let matches = vec![
            VectorMatch {
                id: near.clone(),
                score: 0.97,
                metadata: serde_json::json!({ "rule_text": "No guaranteed returns" }),
            },
            VectorMatch {
                id: far,
                score: 0.60,
                metadata: serde_json::json!({ "rule_text": "Unrelated" }),
            },
        ];
        let detector = DuplicateDetector::new(
            repo,
            Arc::new(StubLlm::failing().with_embedding(vec![0.1; 4])),
            Arc::new(StubVectors::with_matches(matches)),
            0.95,
        );

        let report = detector.check_duplicates("no guaranteed returns").await.unwrap();
        assert!(report.is_duplicate);
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].rule_id, near);
        assert_eq!(report.matches[0].match_type, DuplicateMatchType::Semantic);
    }

    #[tokio::test]
    async fn test_index_outage_degrades_to_exact_only() {
        let repo = seeded_repo(&["Disclose all fees upfront"]).await;
        let detector = DuplicateDetector::new(
            repo,
            Arc::new(StubLlm::failing().with_embedding(vec![0.1; 4])),
            Arc::new(StubVectors::unavailable()),
            0.95,
        );

        let report = detector
            .check_duplicates("Disclose all fees upfront")
            .await
            .unwrap();
        assert!(report.is_duplicate);
        assert!(report
            .matches
            .iter()
            .all(|m| m.match_type == DuplicateMatchType::Exact));
    }

    proptest! {
        /// normalize(normalize(x)) == normalize(x)
        #[test]
        fn prop_normalize_is_idempotent(text in ".{0,200}") {
            let once = normalize_text(&text);
            prop_assert_eq!(normalize_text(&once), once);
        }
    }
}
