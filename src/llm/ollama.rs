//! Ollama local model backend

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

const PROVIDER: &str = "Ollama";

pub struct OllamaBackend {
    client: Client,
    endpoint: String,
    embedding_model: String,
    generation_model: String,
}

impl OllamaBackend {
    pub fn new(
        client: Client,
        endpoint: String,
        embedding_model: String,
        generation_model: String,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            embedding_model,
            generation_model,
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let url = format!("{}/api/embeddings", self.endpoint);
        debug!("Calling Ollama embeddings API: {}", url);

        let request = EmbeddingRequest {
            model: &self.embedding_model,
            prompt: text,
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let response = ensure_success(response, PROVIDER).await?;

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| invalid_response(PROVIDER, e))?;
        if result.embedding.is_empty() {
            return Err(invalid_response(PROVIDER, "empty embedding"));
        }
        Ok(result.embedding)
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.endpoint);
        debug!("Calling Ollama generate API: {}", url);

        let request = GenerateRequest {
            model: &self.generation_model,
            prompt,
            stream: false,
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let response = ensure_success(response, PROVIDER).await?;

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| invalid_response(PROVIDER, e))?;
        Ok(result.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_disables_streaming() {
        let request = GenerateRequest {
            model: "llama3.1",
            prompt: "hi",
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
    }

    #[tokio::test]
    #[ignore = "Requires a running Ollama server"]
    async fn test_ollama_embedding() {
        let backend = OllamaBackend::new(
            Client::new(),
            "http://localhost:11434".to_string(),
            "nomic-embed-text".to_string(),
            "llama3.1".to_string(),
        );
        let embedding = backend.embed("Hello, world!").await.unwrap();
        assert!(!embedding.is_empty());
    }
}
