//! Gemini provider
//!
//! Text generation via `generateContent` and embeddings via `embedContent`
//! on the Generative Language API.

use super::{json_instruction, parse_structured_response, Generation, LlmProvider, TokenUsage};
use crate::error::{ComplianceError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const GENERATION_MODEL: &str = "gemini-2.0-flash";
const EMBEDDING_MODEL: &str = "embedding-001";

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

impl GeminiClient {
    pub fn new(api_key: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, api_key })
    }
}

#[async_trait]
impl LlmProvider for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Generation> {
        // Gemini takes a single prompt; fold the system prompt in front.
        let full_prompt = match system_prompt {
            Some(system) => format!("{system}\n\n{prompt}"),
            None => prompt.to_string(),
        };

        let url = format!(
            "{API_BASE}/models/{GENERATION_MODEL}:generateContent?key={}",
            self.api_key
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": full_prompt }] }],
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": max_tokens,
            },
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ComplianceError::LlmCallFailed(format!("Gemini request: {e}")))?
            .error_for_status()
            .map_err(|e| ComplianceError::LlmCallFailed(format!("Gemini status: {e}")))?
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| ComplianceError::LlmCallFailed(format!("Gemini response: {e}")))?;

        let content = response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| ComplianceError::LlmCallFailed("Gemini returned no candidates".into()))?;

        let usage = response
            .usage_metadata
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        Ok(Generation { content, usage })
    }

    async fn generate_structured(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        response_schema: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let instruction = json_instruction(response_schema);
        let full_prompt = match system_prompt {
            Some(system) => format!("{system}\n\n{instruction}\n\n{prompt}"),
            None => format!("{instruction}\n\n{prompt}"),
        };

        let generation = self.generate(&full_prompt, None, 0.3, 2000).await?;
        parse_structured_response(&generation.content)
    }

    async fn create_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!(
            "{API_BASE}/models/{EMBEDDING_MODEL}:embedContent?key={}",
            self.api_key
        );
        let body = json!({
            "model": format!("models/{EMBEDDING_MODEL}"),
            "content": { "parts": [{ "text": text }] },
            "taskType": "RETRIEVAL_DOCUMENT",
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ComplianceError::LlmCallFailed(format!("Gemini embedding: {e}")))?
            .error_for_status()
            .map_err(|e| ComplianceError::LlmCallFailed(format!("Gemini embedding status: {e}")))?
            .json::<EmbedContentResponse>()
            .await
            .map_err(|e| ComplianceError::LlmCallFailed(format!("Gemini embedding response: {e}")))?;

        Ok(response.embedding.values)
    }
}
