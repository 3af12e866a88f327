//! Remote embeddings over the OpenAI-compatible `/embeddings` API.
//!
//! Enabled by the `openai` feature. Any server that speaks the same wire
//! format (a local gateway, a self-hosted model) can be used by pointing
//! [`OpenAIEmbeddingProvider::with_base_url`] at it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::RagConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const PROVIDER: &str = "OpenAI";

/// Embeds passages and queries with a hosted embedding model.
///
/// The requested output size is always sent, so the vectors match the
/// index dimensions even for models that natively produce longer ones.
/// One batch is one HTTP request; when the request fails, every text in
/// the batch carries that failure.
///
/// # Example
///
/// ```rust,ignore
/// let config = RagConfig::from_env()?;
/// let provider = OpenAIEmbeddingProvider::from_config(&config)?;
/// let vector = provider.embed("gold loan interest rate").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    model_version: String,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider producing `dimensions`-component vectors.
    ///
    /// # Errors
    ///
    /// [`RagError::ConfigError`] for an empty key or zero dimensions.
    pub fn new(api_key: impl Into<String>, dimensions: usize) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RagError::ConfigError("embedding API key is empty".into()));
        }
        if dimensions == 0 {
            return Err(RagError::ConfigError("embedding dimensions must be positive".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            dimensions,
            model_version: versioned(DEFAULT_MODEL, dimensions),
        })
    }

    /// Create a provider sized by `config.embedding_dimensions`, with the key
    /// taken from `OPENAI_API_KEY`.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| RagError::ConfigError("OPENAI_API_KEY is not set".into()))?;
        Self::new(api_key, config.embedding_dimensions)
    }

    /// Use another embedding model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self.model_version = versioned(&self.model, self.dimensions);
        self
    }

    /// Send requests to an OpenAI-compatible server instead, e.g.
    /// `http://localhost:8080/v1`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn call(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let body = ApiRequest { model: &self.model, input: inputs, dimensions: self.dimensions };

        let response =
            self.client.post(&url).bearer_auth(&self.api_key).json(&body).send().await.map_err(
                |e| {
                    error!(provider = PROVIDER, %url, error = %e, "embedding request failed");
                    failure(format!("request failed: {e}"))
                },
            )?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiError>(&text) {
                Ok(err) => err.error.message,
                Err(_) => text,
            };
            error!(provider = PROVIDER, %status, "embedding API rejected request");
            return Err(failure(format!("{status}: {message}")));
        }

        let mut reply: ApiResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "unreadable embedding response");
            failure(format!("unreadable response: {e}"))
        })?;
        if reply.data.len() != inputs.len() {
            return Err(failure(format!(
                "{} embeddings returned for {} inputs",
                reply.data.len(),
                inputs.len()
            )));
        }
        reply.data.sort_by_key(|item| item.index);
        Ok(reply.data.into_iter().map(|item| item.embedding).collect())
    }
}

fn versioned(model: &str, dimensions: usize) -> String {
    format!("openai/{model}/{dimensions}")
}

fn failure(message: String) -> RagError {
    RagError::EmbeddingError { provider: PROVIDER.into(), message }
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    dimensions: usize,
}

#[derive(Deserialize)]
struct ApiResponse {
    data: Vec<ApiEmbedding>,
}

#[derive(Deserialize)]
struct ApiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RagError::EmptyInput);
        }
        let mut vectors = self.call(&[text]).await?;
        vectors.pop().ok_or_else(|| failure("no embedding returned".into()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Vec<Result<Vec<f32>>> {
        let mut results: Vec<Result<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut positions = Vec::new();
        let mut inputs = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            if text.trim().is_empty() {
                results.push(Err(RagError::EmptyInput));
            } else {
                results.push(Ok(Vec::new()));
                positions.push(i);
                inputs.push(*text);
            }
        }
        if inputs.is_empty() {
            return results;
        }

        debug!(provider = PROVIDER, model = %self.model, batch_size = inputs.len(), "embedding batch");
        match self.call(&inputs).await {
            Ok(vectors) => {
                for (i, vector) in positions.into_iter().zip(vectors) {
                    results[i] = Ok(vector);
                }
            }
            Err(e) => {
                let message = e.to_string();
                for i in positions {
                    results[i] = Err(failure(message.clone()));
                }
            }
        }
        results
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_version(&self) -> &str {
        &self.model_version
    }
}
