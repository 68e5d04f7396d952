//! External model services: embedding and text generation
//!
//! Backends talk to one provider each and classify their failures; the
//! [`ResilientModelClient`] wraps a pair of backends with the retry policy.
//!
//! # Examples
//!
//! ```rust,no_run
//! use lumina::config::AppConfig;
//! use lumina::llm::ResilientModelClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let client = ResilientModelClient::from_config(&config)?;
//!
//!     let embedding = client.embed("Hello, world!").await?;
//!     println!("Generated embedding with {} dimensions", embedding.len());
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod retry;

use std::sync::Arc;

use async_trait::async_trait;
pub use client::ResilientModelClient;
pub use client::DEFAULT_BATCH_PAUSE;
pub use gemini::GeminiBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;
use reqwest::Client;
pub use retry::RetryPolicy;
use serde::Deserialize;
use serde::Serialize;

use crate::config::AppConfig;
use crate::errors::LuminaError;
use crate::errors::ModelErrorKind;
use crate::errors::Result;
use crate::models::EmbeddingVector;

/// Produces an embedding vector for a piece of text
///
/// Implementations must be deterministic for identical input within one
/// model version, and report failures as classified `LuminaError::Model`.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector>;
}

/// Produces text from a prompt
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Supported model providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// Google Gemini (`generativelanguage.googleapis.com`)
    Gemini,
    /// `OpenAI` or any compatible endpoint
    OpenAI,
    /// Ollama local models
    Ollama,
}

/// Build the embedding and generation backends selected by configuration
pub fn build_backends(
    config: &AppConfig,
) -> Result<(Arc<dyn EmbeddingBackend>, Arc<dyn GenerationBackend>)> {
    let http = http_client(config)?;
    let endpoint = config.llm_endpoint().to_string();

    match config.llm.provider {
        ModelProvider::Gemini => {
            let api_key = require_api_key(config)?;
            let backend = Arc::new(GeminiBackend::new(
                http,
                endpoint,
                api_key,
                config.embedding_model().to_string(),
                config.llm_model().to_string(),
                Some(config.embedding_dimension()),
            ));
            Ok(split_backend(backend))
        }
        ModelProvider::OpenAI => {
            let api_key = require_api_key(config)?;
            let backend = Arc::new(OpenAiBackend::new(
                http,
                endpoint,
                api_key,
                config.embedding_model().to_string(),
                config.llm_model().to_string(),
                Some(config.embedding_dimension()),
            ));
            Ok(split_backend(backend))
        }
        ModelProvider::Ollama => {
            let backend = Arc::new(OllamaBackend::new(
                http,
                endpoint,
                config.embedding_model().to_string(),
                config.llm_model().to_string(),
            ));
            Ok(split_backend(backend))
        }
    }
}

/// One provider object serves both capabilities
fn split_backend<B>(backend: Arc<B>) -> (Arc<dyn EmbeddingBackend>, Arc<dyn GenerationBackend>)
where
    B: EmbeddingBackend + GenerationBackend + 'static,
{
    let embedder: Arc<dyn EmbeddingBackend> = backend.clone();
    let generator: Arc<dyn GenerationBackend> = backend;
    (embedder, generator)
}

fn http_client(config: &AppConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.request_timeout())
        .pool_idle_timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| LuminaError::Http(e.to_string()))
}

fn require_api_key(config: &AppConfig) -> Result<String> {
    config
        .llm
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            LuminaError::Config(format!(
                "{:?} provider requires llm.api_key (or LUMINA_LLM_API_KEY)",
                config.llm.provider
            ))
        })
}

/// Turn a non-2xx response into a classified model error
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    provider: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(LuminaError::model(
        ModelErrorKind::from_status(status.as_u16()),
        format!("{provider} API error ({status}): {body}"),
    ))
}

/// Model error for a 2xx response we could not use
pub(crate) fn invalid_response(provider: &str, detail: impl std::fmt::Display) -> LuminaError {
    LuminaError::model(
        ModelErrorKind::InvalidResponse,
        format!("{provider} returned an unusable response: {detail}"),
    )
}
