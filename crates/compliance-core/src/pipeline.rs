//! Submission pipeline: document review, content generation, approval
//!
//! Both entry points end the same way: an aggregated triggered-rule list, a
//! computed verdict, a persisted submission, and an audit entry. Auxiliary
//! signals (prompt enhancement, regulatory retrieval, the AI review pass)
//! degrade individually instead of failing the submission.

use crate::audit::AuditSink;
use crate::chunker::Chunker;
use crate::config::Config;
use crate::error::{ComplianceError, Result};
use crate::evaluator::{self, AiReview, Evaluator};
use crate::extract;
use crate::providers::{LlmProvider, VectorProvider};
use crate::rules::{RuleRepository, RULE_NAMESPACE};
use async_trait::async_trait;
use compliance_types::{
    ApprovalDecision, ApprovalStatus, AuditLogEntry, ComplianceStatus, ContentSubmission,
    InputType, Rule, RuleRef, TriggeredRule, TriggeredStatus,
};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Stored excerpt cap for document submissions, in characters.
const EXCERPT_CHARS: usize = 5000;

/// Submission persistence seam (external collaborator)
#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    async fn insert(&self, submission: ContentSubmission) -> Result<()>;

    async fn get(&self, submission_id: Uuid) -> Result<Option<ContentSubmission>>;

    /// Every submission, newest first.
    async fn list(&self) -> Result<Vec<ContentSubmission>>;

    /// Record an approval decision. Only the approval fields and
    /// `updated_at` change; the computed verdict and triggered rules are
    /// never rewritten.
    async fn set_approval(
        &self,
        submission_id: Uuid,
        decision: ApprovalDecision,
    ) -> Result<ContentSubmission>;
}

/// In-memory submission repository
#[derive(Default)]
pub struct MemorySubmissionRepository {
    rows: RwLock<Vec<ContentSubmission>>,
}

impl MemorySubmissionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubmissionRepository for MemorySubmissionRepository {
    async fn insert(&self, submission: ContentSubmission) -> Result<()> {
        self.rows.write().await.push(submission);
        Ok(())
    }

    async fn get(&self, submission_id: Uuid) -> Result<Option<ContentSubmission>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|s| s.submission_id == submission_id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<ContentSubmission>> {
        let mut rows = self.rows.read().await.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn set_approval(
        &self,
        submission_id: Uuid,
        decision: ApprovalDecision,
    ) -> Result<ContentSubmission> {
        let mut rows = self.rows.write().await;
        let row = rows
            .iter_mut()
            .find(|s| s.submission_id == submission_id)
            .ok_or(ComplianceError::SubmissionNotFound { submission_id })?;
        row.approval = Some(decision);
        row.updated_at = chrono::Utc::now();
        Ok(row.clone())
    }
}

/// One reviewed chunk that produced violations
#[derive(Debug, Clone, Serialize)]
pub struct ChunkReview {
    pub chunk_text: String,
    pub page: Option<u32>,
    pub section: Option<String>,
    pub violations: Vec<TriggeredRule>,
}

/// Everything a document review produced: the persisted submission plus
/// the per-chunk violation detail behind it.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReviewOutcome {
    pub submission: ContentSubmission,
    /// Only chunks that produced at least one violation.
    pub chunk_reviews: Vec<ChunkReview>,
}

/// Content-generation request
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub user_id: Uuid,
    /// Run the prompt through an enhancement pass before generating.
    pub enhance_prompt: bool,
}

/// Everything the generation flow produced
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub submission: ContentSubmission,
    pub ai_review: AiReview,
    /// Present only when enhancement ran and succeeded.
    pub enhanced_prompt: Option<String>,
}

pub struct ContentPipeline {
    rules: Arc<dyn RuleRepository>,
    submissions: Arc<dyn SubmissionRepository>,
    generator: Arc<dyn LlmProvider>,
    vectors: Arc<dyn VectorProvider>,
    audit: Arc<dyn AuditSink>,
    evaluator: Evaluator,
    chunker: Chunker,
    chunk_concurrency: usize,
}

impl ContentPipeline {
    pub fn new(
        rules: Arc<dyn RuleRepository>,
        submissions: Arc<dyn SubmissionRepository>,
        generator: Arc<dyn LlmProvider>,
        reviewer: Arc<dyn LlmProvider>,
        vectors: Arc<dyn VectorProvider>,
        audit: Arc<dyn AuditSink>,
        config: &Config,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            rules,
            submissions,
            generator,
            vectors,
            audit,
            evaluator: Evaluator::new(reviewer),
            chunker: Chunker::new(config.chunking)?,
            chunk_concurrency: config.chunk_concurrency.max(1),
        })
    }

    /// Review an uploaded document against the active rules.
    ///
    /// Extraction and chunking run first; each chunk is reviewed with
    /// bounded concurrency and results come back in document order. Repeat
    /// hits of the same rule across chunks keep the first occurrence.
    pub async fn check_document(
        &self,
        content: &[u8],
        filename: &str,
        user_id: Uuid,
    ) -> Result<DocumentReviewOutcome> {
        let document = extract::extract(content, filename)?;
        let chunks = self.chunker.chunk(&document.text, &document.metadata);
        let rules = Arc::new(self.rules.list_active().await?);

        tracing::info!(
            filename,
            chunks = chunks.len(),
            rules = rules.len(),
            "Reviewing document"
        );

        let reviews: Vec<ChunkReview> = stream::iter(chunks)
            .map(|chunk| {
                let rules = Arc::clone(&rules);
                async move {
                    let mut violations = self.evaluator.review_chunk(&chunk, &rules).await;
                    if let Some(page) = chunk.page {
                        for v in &mut violations {
                            v.explanation = Some(match v.explanation.take() {
                                Some(text) => format!("{text} (page {page})"),
                                None => format!("Flagged on page {page}"),
                            });
                        }
                    }
                    ChunkReview {
                        chunk_text: chunk.text,
                        page: chunk.page,
                        section: chunk.section,
                        violations,
                    }
                }
            })
            .buffered(self.chunk_concurrency)
            .collect()
            .await;

        let aggregated =
            dedupe_first_wins(reviews.iter().flat_map(|r| r.violations.iter().cloned()));
        let status = verdict(&aggregated);

        let submission = ContentSubmission::new(
            user_id,
            InputType::Document,
            filename.to_string(),
            excerpt(&document.text),
            status,
            aggregated,
        );
        self.submissions.insert(submission.clone()).await?;

        self.audit
            .log(
                AuditLogEntry::new("document_checked", user_id)
                    .with_resource("submission", submission.submission_id)
                    .with_summary(format!(
                        "{} rule hits in {}",
                        submission.rules_triggered.len(),
                        filename
                    )),
            )
            .await;

        let chunk_reviews = reviews
            .into_iter()
            .filter(|r| !r.violations.is_empty())
            .collect();

        Ok(DocumentReviewOutcome {
            submission,
            chunk_reviews,
        })
    }

    /// Generate content from a prompt, then review the result.
    ///
    /// Generation itself must succeed; everything around it (enhancement,
    /// regulatory retrieval, the AI review) degrades on failure.
    pub async fn generate_content(&self, request: GenerateRequest) -> Result<GenerationOutcome> {
        let rules = self.rules.list_active().await?;

        let enhanced_prompt = if request.enhance_prompt {
            self.enhance_prompt(&request.prompt).await
        } else {
            None
        };
        let prompt = enhanced_prompt.as_deref().unwrap_or(&request.prompt);

        let regulatory_context = self.regulatory_context(prompt).await;
        let generated = self
            .generator
            .generate(
                prompt,
                Some(&generation_system_prompt(&rules, &regulatory_context)),
                0.7,
                1500,
            )
            .await?;

        let ai_review = self.evaluator.ai_review(&generated.content, &rules).await;
        let validation = evaluator::validate_content(&generated.content, &rules);

        let mut combined = validation.violations;
        combined.extend(ai_review.compliance_issues.iter().map(|issue| TriggeredRule {
            rule_id: RuleRef::AiDetected,
            rule_text: issue.rule_violated.clone(),
            category: "AI_REVIEW".to_string(),
            severity: issue.severity.clone(),
            status: TriggeredStatus::Violated,
            explanation: issue.explanation.clone(),
        }));
        combined.extend(validation.triggered);

        let aggregated = dedupe_first_wins(combined.into_iter());
        let status = verdict(&aggregated);

        let submission = ContentSubmission::new(
            request.user_id,
            InputType::Prompt,
            request.prompt.clone(),
            generated.content,
            status,
            aggregated,
        );
        self.submissions.insert(submission.clone()).await?;

        self.audit
            .log(
                AuditLogEntry::new("content_generated", request.user_id)
                    .with_resource("submission", submission.submission_id)
                    .with_summary(format!("verdict: {:?}", submission.compliance_status)),
            )
            .await;

        Ok(GenerationOutcome {
            submission,
            ai_review,
            enhanced_prompt,
        })
    }

    /// Rewrite content so the listed violations no longer apply.
    pub async fn rewrite_compliant(
        &self,
        content: &str,
        violations: &[TriggeredRule],
    ) -> Result<String> {
        let issues = violations
            .iter()
            .map(|v| format!("- {} ({})", v.rule_text, v.severity))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Rewrite the following content to fix these compliance issues \
             while preserving the message and tone.\n\n\
             Issues:\n{issues}\n\nContent:\n{content}"
        );

        let generation = self
            .generator
            .generate(
                &prompt,
                Some("You are a compliance-aware copy editor."),
                0.5,
                1000,
            )
            .await?;
        Ok(generation.content)
    }

    /// Record an admin approval decision on a submission.
    pub async fn apply_approval(
        &self,
        submission_id: Uuid,
        decision: ApprovalDecision,
    ) -> Result<ContentSubmission> {
        let actor = decision.approved_by;
        let action = match decision.status {
            ApprovalStatus::Approved => "content_approved",
            ApprovalStatus::Rejected => "content_rejected",
        };
        let submission = self.submissions.set_approval(submission_id, decision).await?;

        self.audit
            .log(
                AuditLogEntry::new(action, actor).with_resource("submission", submission_id),
            )
            .await;

        Ok(submission)
    }

    pub async fn get_submission(&self, submission_id: Uuid) -> Result<Option<ContentSubmission>> {
        self.submissions.get(submission_id).await
    }

    pub async fn list_submissions(&self) -> Result<Vec<ContentSubmission>> {
        self.submissions.list().await
    }

    /// Expand a terse prompt into a fuller brief. Failure keeps the
    /// original prompt.
    async fn enhance_prompt(&self, prompt: &str) -> Option<String> {
        let instruction = format!(
            "Expand this content request into a clear, detailed brief for a \
             copywriter. Keep the original intent. Return only the brief.\n\n\
             Request: {prompt}"
        );
        match self.generator.generate(&instruction, None, 0.5, 500).await {
            Ok(generation) => Some(generation.content),
            Err(e) => {
                tracing::warn!(error = %e, "Prompt enhancement failed; using original prompt");
                None
            }
        }
    }

    /// Retrieve the nearest active rules from the vector index for
    /// grounding generation. Degrades to no context.
    async fn regulatory_context(&self, prompt: &str) -> Vec<String> {
        let embedding = match self.generator.create_embedding(prompt).await {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(error = %e, "Context embedding failed; generating without retrieval");
                return Vec::new();
            }
        };

        let filter = json!({ "is_active": true });
        match self
            .vectors
            .query(&embedding, 5, Some(filter), Some(RULE_NAMESPACE))
            .await
        {
            Ok(matches) => matches
                .into_iter()
                .filter_map(|m| {
                    m.metadata
                        .get("rule_text")
                        .and_then(|v| v.as_str())
                        .map(String::from)
                })
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Context retrieval failed; generating without retrieval");
                Vec::new()
            }
        }
    }
}

fn generation_system_prompt(rules: &[Rule], regulatory_context: &[String]) -> String {
    let mut prompt = String::from(
        "You are a marketing copywriter for a regulated industry. \
         Follow every rule below without exception.\n\nRules:\n",
    );
    for rule in rules.iter().take(10) {
        prompt.push_str(&format!("- {}\n", rule.rule_text));
    }
    if !regulatory_context.is_empty() {
        prompt.push_str("\nRelevant regulations:\n");
        for context in regulatory_context {
            prompt.push_str(&format!("- {context}\n"));
        }
    }
    prompt
}

/// Keep the first occurrence per rule identity. All model-detected issues
/// that map to no stored rule share the sentinel identity, so they collapse
/// to the first one reported.
fn dedupe_first_wins(hits: impl Iterator<Item = TriggeredRule>) -> Vec<TriggeredRule> {
    let mut seen = HashSet::new();
    hits.filter(|hit| seen.insert(hit.rule_id.clone()))
        .collect()
}

fn verdict(hits: &[TriggeredRule]) -> ComplianceStatus {
    if hits.iter().any(|h| h.status == TriggeredStatus::Violated) {
        ComplianceStatus::Violations
    } else {
        ComplianceStatus::Compliant
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::rules::MemoryRuleRepository;
    use crate::testing::{StubLlm, StubVectors};
    use compliance_types::{Rule, RuleCategory, RuleSeverity};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rule(text: &str) -> Rule {
        Rule::new(
            text.to_string(),
            RuleCategory::Regulatory,
            RuleSeverity::High,
            Uuid::new_v4(),
        )
    }

    fn hit(rule_ref: RuleRef, text: &str) -> TriggeredRule {
        TriggeredRule {
            rule_id: rule_ref,
            rule_text: text.to_string(),
            category: "regulatory".to_string(),
            severity: "high".to_string(),
            status: TriggeredStatus::Violated,
            explanation: None,
        }
    }

    struct Harness {
        pipeline: ContentPipeline,
        submissions: Arc<MemorySubmissionRepository>,
        audit: Arc<MemoryAuditSink>,
    }

    async fn harness(generator: StubLlm, reviewer: StubLlm, rules: Vec<Rule>) -> Harness {
        let repo = Arc::new(MemoryRuleRepository::new());
        for r in rules {
            repo.insert(r).await.unwrap();
        }
        let submissions = Arc::new(MemorySubmissionRepository::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let pipeline = ContentPipeline::new(
            repo,
            submissions.clone(),
            Arc::new(generator),
            Arc::new(reviewer),
            Arc::new(StubVectors::unavailable()),
            audit.clone(),
            &Config::default(),
        )
        .unwrap();
        Harness {
            pipeline,
            submissions,
            audit,
        }
    }

    #[test]
    fn test_dedupe_keeps_first_stored_hit() {
        let id = Uuid::new_v4();
        let kept = dedupe_first_wins(
            vec![
                hit(RuleRef::Stored(id), "first"),
                hit(RuleRef::Stored(id), "second"),
                hit(RuleRef::Stored(Uuid::new_v4()), "other"),
            ]
            .into_iter(),
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].rule_text, "first");
    }

    #[test]
    fn test_dedupe_collapses_sentinel_hits_to_first() {
        let kept = dedupe_first_wins(
            vec![
                hit(RuleRef::AiDetected, "claim A"),
                hit(RuleRef::AiDetected, "claim A"),
                hit(RuleRef::AiDetected, "claim B"),
            ]
            .into_iter(),
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].rule_text, "claim A");
    }

    #[test]
    fn test_verdict() {
        assert_eq!(verdict(&[]), ComplianceStatus::Compliant);

        let mut triggered = hit(RuleRef::AiDetected, "x");
        triggered.status = TriggeredStatus::Triggered;
        assert_eq!(verdict(&[triggered.clone()]), ComplianceStatus::Compliant);

        assert_eq!(
            verdict(&[triggered, hit(RuleRef::AiDetected, "y")]),
            ComplianceStatus::Violations
        );
    }

    #[tokio::test]
    async fn test_document_check_flags_with_reviewer_down() {
        // Reviewer fails every chunk; the keyword fallback still flags.
        let r = rule("Copy must not promise guaranteed returns");
        let h = harness(StubLlm::failing(), StubLlm::failing(), vec![r.clone()]).await;

        let outcome = h
            .pipeline
            .check_document(
                b"Our new plan gives guaranteed returns every year.",
                "plan.txt",
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        let submission = &outcome.submission;
        assert_eq!(submission.compliance_status, ComplianceStatus::Violations);
        assert_eq!(submission.rules_triggered.len(), 1);
        assert_eq!(submission.rules_triggered[0].rule_id, RuleRef::Stored(r.rule_id));
        assert_eq!(submission.input_type, InputType::Document);

        assert_eq!(outcome.chunk_reviews.len(), 1);
        let review = &outcome.chunk_reviews[0];
        assert!(review.chunk_text.contains("guaranteed returns"));
        assert_eq!(review.violations.len(), 1);

        let stored = h.submissions.get(submission.submission_id).await.unwrap();
        assert!(stored.is_some());

        let entries = h.audit.entries().await;
        assert_eq!(entries.last().unwrap().action_type, "document_checked");
    }

    #[tokio::test]
    async fn test_document_check_runs_on_a_spawned_task() {
        let r = rule("Copy must not promise guaranteed returns");
        let h = harness(StubLlm::failing(), StubLlm::failing(), vec![r]).await;
        let pipeline = Arc::new(h.pipeline);

        // Server handlers run reviews on executor tasks, which need the
        // future to be Send and self-contained.
        let task = tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            async move {
                pipeline
                    .check_document(
                        b"This plan has guaranteed returns.",
                        "plan.txt",
                        Uuid::new_v4(),
                    )
                    .await
            }
        });

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(
            outcome.submission.compliance_status,
            ComplianceStatus::Violations
        );
    }

    #[tokio::test]
    async fn test_document_check_rejects_unknown_extension() {
        let h = harness(StubLlm::failing(), StubLlm::failing(), vec![]).await;
        let err = h
            .pipeline
            .check_document(b"data", "report.xlsx", Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ComplianceError::UnsupportedFormat { .. }));
    }

    #[tokio::test]
    async fn test_generation_survives_degraded_auxiliaries() {
        // Index down, reviewer down, enhancement requested but generator
        // has only one canned response; the submission still lands.
        let r = rule("Copy must not promise guaranteed returns");
        let generator = StubLlm::failing().with_generation("A safe, balanced product story.");
        let h = harness(generator, StubLlm::failing(), vec![r]).await;

        let outcome = h
            .pipeline
            .generate_content(GenerateRequest {
                prompt: "Write a fund blurb".to_string(),
                user_id: Uuid::new_v4(),
                enhance_prompt: false,
            })
            .await
            .unwrap();

        assert_eq!(
            outcome.submission.compliance_status,
            ComplianceStatus::Compliant
        );
        assert_eq!(outcome.submission.input_type, InputType::Prompt);
        assert_eq!(outcome.ai_review.risk_level, "UNKNOWN");
        assert!(outcome.enhanced_prompt.is_none());

        let entries = h.audit.entries().await;
        assert_eq!(entries.last().unwrap().action_type, "content_generated");
    }

    #[tokio::test]
    async fn test_generation_flags_keyword_violation_in_output() {
        let r = rule("Copy must not promise guaranteed returns");
        let generator =
            StubLlm::failing().with_generation("Enjoy guaranteed returns with zero risk!");
        let h = harness(generator, StubLlm::failing(), vec![r.clone()]).await;

        let outcome = h
            .pipeline
            .generate_content(GenerateRequest {
                prompt: "Write a fund blurb".to_string(),
                user_id: Uuid::new_v4(),
                enhance_prompt: false,
            })
            .await
            .unwrap();

        assert_eq!(
            outcome.submission.compliance_status,
            ComplianceStatus::Violations
        );
        assert_eq!(
            outcome.submission.rules_triggered[0].rule_id,
            RuleRef::Stored(r.rule_id)
        );
    }

    #[tokio::test]
    async fn test_unmatched_reviewer_findings_collapse_to_one_sentinel_entry() {
        let issues = json!({
            "compliance_issues": [
                { "rule_violated": "Unsubstantiated health claim", "severity": "high" },
                { "rule_violated": "Implied regulator endorsement", "severity": "medium" }
            ],
            "risk_level": "HIGH",
            "recommendations": []
        });
        let generator = StubLlm::failing().with_generation("Bold copy.");
        let reviewer = StubLlm::failing().with_structured(issues);
        let h = harness(generator, reviewer, vec![]).await;

        let outcome = h
            .pipeline
            .generate_content(GenerateRequest {
                prompt: "supplement blurb".to_string(),
                user_id: Uuid::new_v4(),
                enhance_prompt: false,
            })
            .await
            .unwrap();

        // Sentinel hits share one identity; only the first survives.
        let triggered = &outcome.submission.rules_triggered;
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].rule_id, RuleRef::AiDetected);
        assert_eq!(triggered[0].rule_text, "Unsubstantiated health claim");
    }

    #[tokio::test]
    async fn test_generation_fails_when_generator_down() {
        let h = harness(StubLlm::failing(), StubLlm::failing(), vec![]).await;
        let err = h
            .pipeline
            .generate_content(GenerateRequest {
                prompt: "Write a blurb".to_string(),
                user_id: Uuid::new_v4(),
                enhance_prompt: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ComplianceError::LlmCallFailed(_)));
    }

    #[tokio::test]
    async fn test_approval_touches_only_approval_fields() {
        let generator = StubLlm::failing().with_generation("Plain copy.");
        let h = harness(generator, StubLlm::failing(), vec![]).await;

        let outcome = h
            .pipeline
            .generate_content(GenerateRequest {
                prompt: "blurb".to_string(),
                user_id: Uuid::new_v4(),
                enhance_prompt: false,
            })
            .await
            .unwrap();
        let before = outcome.submission.clone();

        let admin = Uuid::new_v4();
        let updated = h
            .pipeline
            .apply_approval(
                before.submission_id,
                ApprovalDecision {
                    approved_by: admin,
                    status: ApprovalStatus::Rejected,
                    notes: Some("tone".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.compliance_status, before.compliance_status);
        assert_eq!(updated.final_content, before.final_content);
        let approval = updated.approval.unwrap();
        assert_eq!(approval.status, ApprovalStatus::Rejected);
        assert_eq!(approval.approved_by, admin);

        let entries = h.audit.entries().await;
        assert_eq!(entries.last().unwrap().action_type, "content_rejected");
    }

    #[tokio::test]
    async fn test_approval_of_unknown_submission_fails() {
        let h = harness(StubLlm::failing(), StubLlm::failing(), vec![]).await;
        let err = h
            .pipeline
            .apply_approval(
                Uuid::new_v4(),
                ApprovalDecision {
                    approved_by: Uuid::new_v4(),
                    status: ApprovalStatus::Approved,
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ComplianceError::SubmissionNotFound { .. }));
    }
}
