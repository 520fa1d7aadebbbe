//! Rule store: persistence seam, versioning semantics, vector index sync
//!
//! Updating a rule is immutable versioning: the current row is deactivated
//! and a new active row is inserted at `max(version for the lineage) + 1`.
//! A lineage is keyed by equality of the (possibly new) rule text; an update
//! that changes the text starts a fresh max-version lookup under the new
//! text. That chain behavior is what existing data assumes, so it is kept
//! as-is.

use crate::audit::AuditSink;
use crate::error::{ComplianceError, Result};
use crate::extract;
use crate::providers::{LlmProvider, VectorProvider, VectorRecord};
use async_trait::async_trait;
use chrono::Utc;
use compliance_types::{AuditLogEntry, Rule, RuleCategory, RuleSeverity};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Vector index namespace holding rule embeddings.
pub const RULE_NAMESPACE: &str = "rules";

/// Embedding sync runs in small batches to respect upstream rate limits.
const EMBEDDING_BATCH_SIZE: usize = 10;

/// Rule persistence seam (external collaborator)
#[async_trait]
pub trait RuleRepository: Send + Sync {
    async fn insert(&self, rule: Rule) -> Result<()>;

    async fn get(&self, rule_id: Uuid) -> Result<Option<Rule>>;

    /// Rows with the active flag set; the only scope evaluation sees.
    async fn list_active(&self) -> Result<Vec<Rule>>;

    /// Every row, all versions, newest first.
    async fn list_all(&self) -> Result<Vec<Rule>>;

    /// Highest version across rows sharing `rule_text`, or 0.
    async fn max_version_for_text(&self, rule_text: &str) -> Result<i32>;

    /// Flip the active flag on one row. `RuleNotFound` if the id is unknown.
    async fn set_active(&self, rule_id: Uuid, active: bool) -> Result<Rule>;

    /// Atomically deactivate `old_id` and insert `new_rule`, so concurrent
    /// readers never observe a lineage with zero active versions.
    async fn replace_version(&self, old_id: Uuid, new_rule: Rule) -> Result<()>;
}

/// In-memory rule repository
#[derive(Default)]
pub struct MemoryRuleRepository {
    rows: RwLock<Vec<Rule>>,
}

impl MemoryRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuleRepository for MemoryRuleRepository {
    async fn insert(&self, rule: Rule) -> Result<()> {
        self.rows.write().await.push(rule);
        Ok(())
    }

    async fn get(&self, rule_id: Uuid) -> Result<Option<Rule>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|r| r.rule_id == rule_id)
            .cloned())
    }

    async fn list_active(&self) -> Result<Vec<Rule>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|r| r.is_active)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Rule>> {
        let mut rows = self.rows.read().await.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn max_version_for_text(&self, rule_text: &str) -> Result<i32> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|r| r.rule_text == rule_text)
            .map(|r| r.version)
            .max()
            .unwrap_or(0))
    }

    async fn set_active(&self, rule_id: Uuid, active: bool) -> Result<Rule> {
        let mut rows = self.rows.write().await;
        let row = rows
            .iter_mut()
            .find(|r| r.rule_id == rule_id)
            .ok_or(ComplianceError::RuleNotFound { rule_id })?;
        row.is_active = active;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn replace_version(&self, old_id: Uuid, new_rule: Rule) -> Result<()> {
        let mut rows = self.rows.write().await;
        if let Some(old) = rows.iter_mut().find(|r| r.rule_id == old_id) {
            old.is_active = false;
            old.updated_at = Utc::now();
        }
        rows.push(new_rule);
        Ok(())
    }
}

/// Rule management with versioning, embedding upkeep, and audit logging
pub struct RuleService {
    repo: Arc<dyn RuleRepository>,
    llm: Arc<dyn LlmProvider>,
    vectors: Arc<dyn VectorProvider>,
    audit: Arc<dyn AuditSink>,
}

impl RuleService {
    pub fn new(
        repo: Arc<dyn RuleRepository>,
        llm: Arc<dyn LlmProvider>,
        vectors: Arc<dyn VectorProvider>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            repo,
            llm,
            vectors,
            audit,
        }
    }

    /// Insert version 1 of a new rule, active.
    pub async fn create_rule(
        &self,
        rule_text: String,
        category: RuleCategory,
        severity: RuleSeverity,
        created_by: Uuid,
    ) -> Result<Rule> {
        let rule = Rule::new(rule_text, category, severity, created_by);
        self.repo.insert(rule.clone()).await?;
        self.store_rule_embedding(&rule).await;

        self.audit
            .log(
                AuditLogEntry::new("rule_created", created_by)
                    .with_resource("rule", rule.rule_id)
                    .with_summary(format!(
                        "Created {} rule (severity: {})",
                        rule.category.as_str(),
                        rule.severity.as_str()
                    )),
            )
            .await;

        Ok(rule)
    }

    /// Create a new version of an existing rule and deactivate the old row.
    pub async fn update_rule(
        &self,
        rule_id: Uuid,
        updated_by: Uuid,
        rule_text: Option<String>,
        category: Option<RuleCategory>,
        severity: Option<RuleSeverity>,
    ) -> Result<Rule> {
        let current = self
            .repo
            .get(rule_id)
            .await?
            .ok_or(ComplianceError::RuleNotFound { rule_id })?;

        let new_text = rule_text.unwrap_or_else(|| current.rule_text.clone());
        let new_version = self.repo.max_version_for_text(&new_text).await? + 1;

        let now = Utc::now();
        let new_rule = Rule {
            rule_id: Uuid::new_v4(),
            rule_text: new_text,
            category: category.unwrap_or(current.category),
            severity: severity.unwrap_or(current.severity),
            is_active: true,
            version: new_version,
            created_by: updated_by,
            created_at: now,
            updated_at: now,
        };

        self.repo
            .replace_version(current.rule_id, new_rule.clone())
            .await?;
        self.store_rule_embedding(&new_rule).await;

        self.audit
            .log(
                AuditLogEntry::new("rule_updated", updated_by)
                    .with_resource("rule", new_rule.rule_id)
                    .with_summary(format!("Updated rule to version {new_version}"))
                    .with_rule_version(new_version),
            )
            .await;

        Ok(new_rule)
    }

    pub async fn activate_rule(&self, rule_id: Uuid, actor_id: Uuid) -> Result<Rule> {
        let rule = self.repo.set_active(rule_id, true).await?;
        self.audit
            .log(AuditLogEntry::new("rule_activated", actor_id).with_resource("rule", rule_id))
            .await;
        Ok(rule)
    }

    pub async fn deactivate_rule(&self, rule_id: Uuid, actor_id: Uuid) -> Result<Rule> {
        let rule = self.repo.set_active(rule_id, false).await?;
        self.audit
            .log(AuditLogEntry::new("rule_deactivated", actor_id).with_resource("rule", rule_id))
            .await;
        Ok(rule)
    }

    pub async fn get_active_rules(&self) -> Result<Vec<Rule>> {
        self.repo.list_active().await
    }

    pub async fn get_all_rules(&self) -> Result<Vec<Rule>> {
        self.repo.list_all().await
    }

    /// Extract candidate rules from a regulatory PDF via the LLM and create
    /// each one. Entries the model returns with unknown categories or
    /// severities are skipped rather than failing the batch.
    pub async fn extract_rules_from_pdf(
        &self,
        pdf_content: &[u8],
        created_by: Uuid,
    ) -> Result<Vec<Rule>> {
        let document = extract::extract(pdf_content, "upload.pdf")?;
        let excerpt: String = document.text.chars().take(4000).collect();

        let prompt = format!(
            "Extract compliance rules from this regulatory document.\n\n\
             For each rule you find:\n\
             1. Extract the exact rule text\n\
             2. Classify it as regulatory, brand, or seo\n\
             3. Assign severity: low, medium, or high\n\n\
             Document:\n{excerpt}\n\n\
             Respond with a JSON array:\n\
             [{{\"rule_text\": \"...\", \"category\": \"regulatory\", \"severity\": \"high\"}}]"
        );

        let parsed = self
            .llm
            .generate_structured(
                &prompt,
                Some("You are a compliance rule extraction system. Extract clear, actionable rules."),
                None,
            )
            .await?;

        let items = parsed
            .as_array()
            .cloned()
            .ok_or_else(|| {
                ComplianceError::StructuredParseFailed("expected a JSON array of rules".into())
            })?;

        let mut created = Vec::new();
        for item in items {
            let text = item.get("rule_text").and_then(|v| v.as_str());
            let category = item
                .get("category")
                .and_then(|v| v.as_str())
                .and_then(RuleCategory::parse);
            let severity = item
                .get("severity")
                .and_then(|v| v.as_str())
                .and_then(RuleSeverity::parse);

            match (text, category, severity) {
                (Some(text), Some(category), Some(severity)) => {
                    let rule = self
                        .create_rule(text.to_string(), category, severity, created_by)
                        .await?;
                    created.push(rule);
                }
                _ => {
                    tracing::warn!(?item, "Skipping malformed extracted rule");
                }
            }
        }

        Ok(created)
    }

    /// Re-embed every stored rule into the vector index, in batches.
    /// Per-rule embedding failures and per-batch upsert failures are logged
    /// and skipped; returns the number of vectors upserted.
    pub async fn sync_embeddings(&self) -> Result<usize> {
        let rules = self.repo.list_all().await?;
        let mut synced = 0;

        for batch in rules.chunks(EMBEDDING_BATCH_SIZE) {
            let mut records = Vec::with_capacity(batch.len());
            for rule in batch {
                match self.llm.create_embedding(&rule.rule_text).await {
                    Ok(values) => records.push(rule_vector(rule, values)),
                    Err(e) => {
                        tracing::warn!(rule_id = %rule.rule_id, error = %e, "Embedding failed")
                    }
                }
            }

            if records.is_empty() {
                continue;
            }
            let count = records.len();
            match self.vectors.upsert(records, Some(RULE_NAMESPACE)).await {
                Ok(()) => synced += count,
                Err(e) => tracing::warn!(error = %e, "Batch upsert failed"),
            }
        }

        Ok(synced)
    }

    /// Upsert one rule's embedding. Failures are logged and swallowed: the
    /// vector index is an auxiliary signal source, never a reason to fail a
    /// rule write.
    async fn store_rule_embedding(&self, rule: &Rule) {
        let values = match self.llm.create_embedding(&rule.rule_text).await {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(rule_id = %rule.rule_id, error = %e, "Embedding failed");
                return;
            }
        };

        if let Err(e) = self
            .vectors
            .upsert(vec![rule_vector(rule, values)], Some(RULE_NAMESPACE))
            .await
        {
            tracing::warn!(rule_id = %rule.rule_id, error = %e, "Embedding upsert failed");
        }
    }
}

fn rule_vector(rule: &Rule, values: Vec<f32>) -> VectorRecord {
    VectorRecord {
        id: rule.rule_id.to_string(),
        values,
        metadata: json!({
            "rule_text": rule.rule_text,
            "category": rule.category.as_str(),
            "severity": rule.severity.as_str(),
            "version": rule.version,
            "is_active": rule.is_active,
        }),
    }
}
