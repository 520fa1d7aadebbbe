//! Stub providers for tests
//!
//! Deterministic `LlmProvider` / `VectorProvider` implementations used by
//! the crate's own tests and the integration suite. Each can be configured
//! to succeed with canned data or to fail, exercising the fallback paths.

use crate::error::{ComplianceError, Result};
use crate::providers::{Generation, LlmProvider, TokenUsage, VectorMatch, VectorProvider, VectorRecord};
use async_trait::async_trait;
use std::sync::Mutex;

/// Canned language-model provider
pub struct StubLlm {
    generation: Option<String>,
    structured: Option<serde_json::Value>,
    embedding: Option<Vec<f32>>,
}

impl StubLlm {
    /// Every call fails with `LlmCallFailed`.
    pub fn failing() -> Self {
        Self {
            generation: None,
            structured: None,
            embedding: None,
        }
    }

    pub fn with_generation(mut self, text: &str) -> Self {
        self.generation = Some(text.to_string());
        self
    }

    pub fn with_structured(mut self, value: serde_json::Value) -> Self {
        self.structured = Some(value);
        self
    }

    pub fn with_embedding(mut self, values: Vec<f32>) -> Self {
        self.embedding = Some(values);
        self
    }
}

#[async_trait]
impl LlmProvider for StubLlm {
    async fn generate(
        &self,
        _prompt: &str,
        _system_prompt: Option<&str>,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<Generation> {
        match &self.generation {
            Some(content) => Ok(Generation {
                content: content.clone(),
                usage: TokenUsage::default(),
            }),
            None => Err(ComplianceError::LlmCallFailed("stub generation disabled".into())),
        }
    }

    async fn generate_structured(
        &self,
        _prompt: &str,
        _system_prompt: Option<&str>,
        _response_schema: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value> {
        match &self.structured {
            Some(value) => Ok(value.clone()),
            None => Err(ComplianceError::LlmCallFailed("stub review disabled".into())),
        }
    }

    async fn create_embedding(&self, _text: &str) -> Result<Vec<f32>> {
        match &self.embedding {
            Some(values) => Ok(values.clone()),
            None => Err(ComplianceError::LlmCallFailed("stub embedding disabled".into())),
        }
    }
}

/// Canned vector index
pub struct StubVectors {
    matches: Option<Vec<VectorMatch>>,
    /// Records captured by `upsert`, for asserting index upkeep.
    pub upserted: Mutex<Vec<VectorRecord>>,
}

impl StubVectors {
    /// Every call fails with `VectorIndexUnavailable`.
    pub fn unavailable() -> Self {
        Self {
            matches: None,
            upserted: Mutex::new(Vec::new()),
        }
    }

    /// Queries succeed with no neighbors.
    pub fn empty() -> Self {
        Self::with_matches(Vec::new())
    }

    pub fn with_matches(matches: Vec<VectorMatch>) -> Self {
        Self {
            matches: Some(matches),
            upserted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorProvider for StubVectors {
    async fn upsert(&self, vectors: Vec<VectorRecord>, _namespace: Option<&str>) -> Result<()> {
        if self.matches.is_none() {
            return Err(ComplianceError::VectorIndexUnavailable("stub index down".into()));
        }
        self.upserted.lock().unwrap().extend(vectors);
        Ok(())
    }

    async fn query(
        &self,
        _vector: &[f32],
        top_k: usize,
        _filter: Option<serde_json::Value>,
        _namespace: Option<&str>,
    ) -> Result<Vec<VectorMatch>> {
        match &self.matches {
            Some(matches) => Ok(matches.iter().take(top_k).cloned().collect()),
            None => Err(ComplianceError::VectorIndexUnavailable("stub index down".into())),
        }
    }

    async fn delete(&self, _ids: &[String], _namespace: Option<&str>) -> Result<()> {
        if self.matches.is_none() {
            return Err(ComplianceError::VectorIndexUnavailable("stub index down".into()));
        }
        Ok(())
    }
}
