//! Groq provider
//!
//! OpenAI-compatible chat completions. Groq exposes no embedding endpoint,
//! so embedding requests delegate to the Gemini embedding model.

use super::{json_instruction, parse_structured_response, GeminiClient, Generation, LlmProvider, TokenUsage};
use crate::error::{ComplianceError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const CHAT_COMPLETIONS_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const MODEL: &str = "llama-3.3-70b-versatile";

pub struct GroqClient {
    http: reqwest::Client,
    api_key: String,
    embedder: GeminiClient,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl GroqClient {
    pub fn new(api_key: String, gemini_api_key: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let embedder = GeminiClient::new(gemini_api_key, timeout)?;
        Ok(Self {
            http,
            api_key,
            embedder,
        })
    }
}

#[async_trait]
impl LlmProvider for GroqClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Generation> {
        let mut messages = Vec::new();
        if let Some(system) = system_prompt {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let body = json!({
            "model": MODEL,
            "messages": messages,
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        let response = self
            .http
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ComplianceError::LlmCallFailed(format!("Groq request: {e}")))?
            .error_for_status()
            .map_err(|e| ComplianceError::LlmCallFailed(format!("Groq status: {e}")))?
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| ComplianceError::LlmCallFailed(format!("Groq response: {e}")))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ComplianceError::LlmCallFailed("Groq returned no choices".into()))?;

        let usage = response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
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
        let full_system = match system_prompt {
            Some(system) => format!("{system}\n\n{instruction}"),
            None => instruction,
        };

        let generation = self.generate(prompt, Some(&full_system), 0.3, 2000).await?;
        parse_structured_response(&generation.content)
    }

    async fn create_embedding(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder.create_embedding(text).await
    }
}
