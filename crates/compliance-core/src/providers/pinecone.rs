//! Pinecone vector index provider

use super::{VectorMatch, VectorProvider, VectorRecord};
use crate::error::{ComplianceError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub struct PineconeClient {
    http: reqwest::Client,
    api_key: String,
    /// Index host, e.g. `https://poc-abc123.svc.us-east-1.pinecone.io`.
    host: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<VectorMatch>,
}

impl PineconeClient {
    pub fn new(api_key: String, host: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let host = host.trim_end_matches('/').to_string();
        Ok(Self {
            http,
            api_key,
            host,
        })
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        self.http
            .post(format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ComplianceError::VectorIndexUnavailable(format!("{path}: {e}")))?
            .error_for_status()
            .map_err(|e| ComplianceError::VectorIndexUnavailable(format!("{path}: {e}")))
    }
}

#[async_trait]
impl VectorProvider for PineconeClient {
    async fn upsert(&self, vectors: Vec<VectorRecord>, namespace: Option<&str>) -> Result<()> {
        let body = json!({
            "vectors": vectors,
            "namespace": namespace.unwrap_or(""),
        });
        self.post("/vectors/upsert", body).await?;
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<serde_json::Value>,
        namespace: Option<&str>,
    ) -> Result<Vec<VectorMatch>> {
        let mut body = json!({
            "vector": vector,
            "topK": top_k,
            "namespace": namespace.unwrap_or(""),
            "includeMetadata": true,
        });
        if let Some(filter) = filter {
            body["filter"] = filter;
        }

        let response = self
            .post("/query", body)
            .await?
            .json::<QueryResponse>()
            .await
            .map_err(|e| ComplianceError::VectorIndexUnavailable(format!("query decode: {e}")))?;

        Ok(response.matches)
    }

    async fn delete(&self, ids: &[String], namespace: Option<&str>) -> Result<()> {
        let body = json!({
            "ids": ids,
            "namespace": namespace.unwrap_or(""),
        });
        self.post("/vectors/delete", body).await?;
        Ok(())
    }
}
