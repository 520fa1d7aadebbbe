//! External provider interfaces
//!
//! The pipeline talks to a language-model provider and a vector index
//! through these traits. Each has concrete implementations selected once by
//! configuration; business logic never names a vendor.

pub mod gemini;
pub mod groq;
pub mod pinecone;

pub use gemini::GeminiClient;
pub use groq::GroqClient;
pub use pinecone::PineconeClient;

use crate::error::{ComplianceError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Token accounting reported by a generation call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// A completed generation
#[derive(Debug, Clone)]
pub struct Generation {
    pub content: String,
    pub usage: TokenUsage,
}

/// Language-model provider seam
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate free text from a prompt.
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Generation>;

    /// Generate a JSON object. Markdown code fences are stripped before
    /// parsing; malformed output fails with `StructuredParseFailed`.
    async fn generate_structured(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        response_schema: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value>;

    /// Embed text into a similarity vector.
    async fn create_embedding(&self, text: &str) -> Result<Vec<f32>>;
}

/// One vector to upsert into the index
#[derive(Debug, Clone, Serialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: serde_json::Value,
}

/// One nearest-neighbor result
#[derive(Debug, Clone, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Vector index seam
#[async_trait]
pub trait VectorProvider: Send + Sync {
    async fn upsert(&self, vectors: Vec<VectorRecord>, namespace: Option<&str>) -> Result<()>;

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<serde_json::Value>,
        namespace: Option<&str>,
    ) -> Result<Vec<VectorMatch>>;

    async fn delete(&self, ids: &[String], namespace: Option<&str>) -> Result<()>;
}

/// Parse a model's structured response, tolerating the markdown code fences
/// models wrap JSON in despite instructions.
pub(crate) fn parse_structured_response(raw: &str) -> Result<serde_json::Value> {
    let mut content = raw.trim();
    if let Some(rest) = content.strip_prefix("```json") {
        content = rest;
    } else if let Some(rest) = content.strip_prefix("```") {
        content = rest;
    }
    if let Some(rest) = content.strip_suffix("```") {
        content = rest;
    }
    let content = content.trim();

    serde_json::from_str(content).map_err(|e| {
        ComplianceError::StructuredParseFailed(format!("{e}; content: {content}"))
    })
}

/// Build the JSON-only instruction appended to structured-generation
/// prompts, echoing the expected schema when one is given.
pub(crate) fn json_instruction(response_schema: Option<&serde_json::Value>) -> String {
    let mut instruction =
        "Respond ONLY with valid JSON. No markdown, no explanations.".to_string();
    if let Some(schema) = response_schema {
        instruction.push_str(&format!("\nExpected schema: {schema}"));
    }
    instruction
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_plain_json() {
        let value = parse_structured_response(r#"{"a": 1}"#).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_parse_strips_json_fence() {
        let raw = "```json\n{\"compliance_issues\": []}\n```";
        let value = parse_structured_response(raw).unwrap();
        assert_eq!(value, json!({"compliance_issues": []}));
    }

    #[test]
    fn test_parse_strips_bare_fence() {
        let raw = "```\n[1, 2]\n```";
        assert_eq!(parse_structured_response(raw).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_parse_rejects_prose() {
        let err = parse_structured_response("Sure! Here is the JSON you asked for").unwrap_err();
        assert!(matches!(err, ComplianceError::StructuredParseFailed(_)));
    }

    #[test]
    fn test_json_instruction_includes_schema() {
        let schema = json!({"items": ["string"]});
        let instruction = json_instruction(Some(&schema));
        assert!(instruction.contains("Expected schema"));
        assert!(instruction.contains("items"));
        assert!(json_instruction(None).contains("ONLY with valid JSON"));
    }
}
