//! Google Gemini embedding and generation backend

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

const PROVIDER: &str = "Gemini";

/// Client for the Gemini `embedContent` and `generateContent` endpoints
pub struct GeminiBackend {
    client: Client,
    endpoint: String,
    api_key: String,
    embedding_model: String,
    generation_model: String,
    output_dimensionality: Option<usize>,
}

impl GeminiBackend {
    pub fn new(
        client: Client,
        endpoint: String,
        api_key: String,
        embedding_model: String,
        generation_model: String,
        output_dimensionality: Option<usize>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            embedding_model: qualified_model(&embedding_model),
            generation_model: qualified_model(&generation_model),
            output_dimensionality,
        }
    }

    fn url(&self, model: &str, method: &str) -> String {
        format!("{}/{}:{}", self.endpoint, model, method)
    }
}

/// Gemini model names are addressed as `models/<name>`
fn qualified_model(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl EmbeddingBackend for GeminiBackend {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let url = self.url(&self.embedding_model, "embedContent");
        debug!("Calling Gemini embeddings API: {}", url);

        let request = EmbedRequest {
            model: &self.embedding_model,
            content: Content {
                role: None,
                parts: vec![Part { text }],
            },
            task_type: "RETRIEVAL_DOCUMENT",
            output_dimensionality: self.output_dimensionality,
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response, PROVIDER).await?;

        let result: EmbedResponse = response
            .json()
            .await
            .map_err(|e| invalid_response(PROVIDER, e))?;
        Ok(result.embedding.values)
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = self.url(&self.generation_model, "generateContent");
        debug!("Calling Gemini generation API: {}", url);

        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "text/plain",
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response, PROVIDER).await?;

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| invalid_response(PROVIDER, e))?;

        let text: String = result
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().map(|part| part.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(invalid_response(PROVIDER, "no text in first candidate"));
        }
        Ok(text)
    }
}
