//! `OpenAI`-compatible embedding and chat completion backend

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::ensure_success;
use super::invalid_response;
use super::EmbeddingBackend;
use super::GenerationBackend;
use crate::errors::Result;
use crate::models::EmbeddingVector;

const PROVIDER: &str = "OpenAI";

/// Client for `/embeddings` and `/chat/completions`
pub struct OpenAiBackend {
    client: Client,
    endpoint: String,
    api_key: String,
    embedding_model: String,
    generation_model: String,
    dimensions: Option<usize>,
}

impl OpenAiBackend {
    pub fn new(
        client: Client,
        endpoint: String,
        api_key: String,
        embedding_model: String,
        generation_model: String,
        dimensions: Option<usize>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            embedding_model,
            generation_model,
            dimensions,
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl EmbeddingBackend for OpenAiBackend {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let url = format!("{}/embeddings", self.endpoint);
        debug!("Calling OpenAI embeddings API: {}", url);

        let request = EmbeddingRequest {
            input: text,
            model: &self.embedding_model,
            dimensions: self.dimensions,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response, PROVIDER).await?;

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| invalid_response(PROVIDER, e))?;

        result
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| invalid_response(PROVIDER, "no embedding in response"))
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint);
        debug!("Calling OpenAI chat completions API: {}", url);

        let request = ChatRequest {
            model: &self.generation_model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response, PROVIDER).await?;

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| invalid_response(PROVIDER, e))?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| invalid_response(PROVIDER, "no message content in response"))
    }
}
