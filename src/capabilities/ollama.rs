//! Ollama-backed completion and embedding capabilities
//!
//! - Completion: POST /api/generate (non-streaming)
//! - Embedding: POST /api/embeddings

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::capabilities::{CompletionModel, Embedder};
use crate::errors::{CapabilityError, PipelineError, Result};

/// Default Ollama API endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default chat model
pub const DEFAULT_MODEL: &str = "qwen2.5:7b-instruct";

/// Default embedding model
pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";

/// Transport-level request timeout; callers bound calls more tightly
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(PipelineError::HttpError)
}

/// Map transport failures onto the capability error tiers
fn classify(capability: &str, err: reqwest::Error) -> CapabilityError {
    if err.is_connect() {
        CapabilityError::unavailable(capability, format!("Failed to connect to Ollama: {}", err))
    } else {
        CapabilityError::transient(capability, err.to_string())
    }
}

fn classify_status(capability: &str, status: StatusCode, body: String) -> CapabilityError {
    match status {
        StatusCode::NOT_FOUND => {
            CapabilityError::unavailable(capability, format!("model not found: {}", body))
        }
        StatusCode::BAD_REQUEST => CapabilityError::invalid(capability, body),
        _ => CapabilityError::transient(capability, format!("HTTP {}: {}", status, body)),
    }
}

/// Completion model served by Ollama
#[derive(Debug, Clone)]
pub struct OllamaCompletion {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaCompletion {
    pub fn new() -> Result<Self> {
        Self::with_config(DEFAULT_OLLAMA_URL, DEFAULT_MODEL)
    }

    pub fn with_config(base_url: &str, model: &str) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature: 0.1,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CompletionModel for OllamaCompletion {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, CapabilityError> {
        const CAPABILITY: &str = "generate";
        let url = format!("{}/api/generate", self.base_url);

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify(CAPABILITY, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_status(CAPABILITY, status, body));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::transient(CAPABILITY, format!("Failed to parse response: {}", e)))?;

        Ok(parsed.response)
    }
}

/// Embedding model served by Ollama
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn with_config(base_url: &str, model: &str) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, CapabilityError> {
        const CAPABILITY: &str = "embed";
        let url = format!("{}/api/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| classify(CAPABILITY, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(CAPABILITY, status, body));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::transient(CAPABILITY, format!("Failed to parse response: {}", e)))?;

        if parsed.embedding.is_empty() {
            return Err(CapabilityError::transient(CAPABILITY, "empty embedding"));
        }
        Ok(parsed.embedding)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}
