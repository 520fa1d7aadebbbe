//! Application state for the Compliance Server
//!
//! Wires provider clients, in-memory repositories, and the pipeline
//! services from environment configuration.

use anyhow::Result;
use compliance_core::audit::{AuditSink, MemoryAuditSink};
use compliance_core::config::{Config, LlmBackend};
use compliance_core::providers::{GeminiClient, GroqClient, LlmProvider, PineconeClient, VectorProvider};
use compliance_core::rules::{MemoryRuleRepository, RuleService};
use compliance_core::{ContentPipeline, DuplicateDetector, MemorySubmissionRepository};
use std::sync::Arc;
use tracing::info;

/// Shared application state
pub struct AppState {
    pub pipeline: ContentPipeline,
    pub rule_service: RuleService,
    pub duplicates: DuplicateDetector,
    pub audit: Arc<dyn AuditSink>,
}

impl AppState {
    /// Initialize application state from environment configuration
    pub fn new() -> Result<Self> {
        let config = Config::from_env()?;
        info!(
            generator = ?config.generator_backend,
            reviewer = ?config.reviewer_backend,
            "Configuring LLM backends"
        );

        let generator = build_llm(config.generator_backend, &config)?;
        let reviewer = build_llm(config.reviewer_backend, &config)?;
        let vectors: Arc<dyn VectorProvider> = Arc::new(PineconeClient::new(
            config.pinecone_api_key.clone(),
            config.pinecone_host.clone(),
            config.request_timeout,
        )?);

        let rules = Arc::new(MemoryRuleRepository::new());
        let submissions = Arc::new(MemorySubmissionRepository::new());
        let audit: Arc<dyn AuditSink> = Arc::new(MemoryAuditSink::new());

        let pipeline = ContentPipeline::new(
            rules.clone(),
            submissions,
            generator.clone(),
            reviewer.clone(),
            vectors.clone(),
            audit.clone(),
            &config,
        )?;
        let rule_service =
            RuleService::new(rules.clone(), reviewer.clone(), vectors.clone(), audit.clone());
        let duplicates = DuplicateDetector::new(
            rules,
            reviewer,
            vectors,
            config.semantic_similarity_threshold,
        );

        Ok(Self {
            pipeline,
            rule_service,
            duplicates,
            audit,
        })
    }
}

fn build_llm(backend: LlmBackend, config: &Config) -> Result<Arc<dyn LlmProvider>> {
    Ok(match backend {
        LlmBackend::Gemini => Arc::new(GeminiClient::new(
            config.gemini_api_key.clone(),
            config.request_timeout,
        )?),
        LlmBackend::Groq => Arc::new(GroqClient::new(
            config.groq_api_key.clone(),
            config.gemini_api_key.clone(),
            config.request_timeout,
        )?),
    })
}
