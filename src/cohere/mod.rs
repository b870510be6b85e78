
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::CohereConfig;
use crate::embeddings::{Embedder, InputType};
use crate::session::{ChatModel, ChatRequest, DialogueTurn};

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Credential wrapper that keeps the key out of debug output
#[derive(Clone)]
struct ApiKey(String);

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Blocking client for the Cohere `embed` and `chat` endpoints
#[derive(Debug, Clone)]
pub struct CohereClient {
    base_url: Url,
    api_key: ApiKey,
    embed_model: String,
    chat_model: String,
    batch_size: u32,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
    model: &'a str,
    input_type: InputType,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct ChatDocument<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct CohereChatRequest<'a> {
    message: &'a str,
    model: &'a str,
    documents: Vec<ChatDocument<'a>>,
    chat_history: &'a [DialogueTurn],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl CohereClient {
    /// Create a client for the configured service using `api_key`
    #[inline]
    pub fn new(config: &CohereConfig, api_key: impl Into<String>) -> Result<Self> {
        let mut base_url = config
            .cohere_url()
            .context("Failed to generate Cohere URL from config")?;
        // Endpoint paths are joined relative to the base, so keep any path prefix
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            base_url,
            api_key: ApiKey(api_key.into()),
            embed_model: config.embed_model.clone(),
            chat_model: config.chat_model.clone(),
            batch_size: config.batch_size,
            agent,
            retry_attempts: config.retry_attempts.max(1),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Verify the credential works and both configured models are available
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Cohere at {}", self.base_url);

        let models = self.list_models().context("Failed to list models")?;

        for model in [&self.embed_model, &self.chat_model] {
            if !models.iter().any(|m| &m.name == model) {
                let available_models: Vec<&str> =
                    models.iter().map(|m| m.name.as_str()).collect();
                warn!(
                    "Model {} not found. Available models: {:?}",
                    model, available_models
                );
                return Err(anyhow::anyhow!("Model '{}' is not available", model));
            }
        }

        info!(
            "Health check passed for Cohere at {} with models {} and {}",
            self.base_url, self.embed_model, self.chat_model
        );
        Ok(())
    }

    /// List the models the credential has access to
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let mut url = self
            .base_url
            .join("v1/models")
            .context("Failed to build models URL")?;
        url.query_pairs_mut().append_pair("page_size", "1000");

        debug!("Fetching available models from {}", url);

        let response_text = self
            .make_request_with_retry(|| {
                self.agent
                    .get(url.as_str())
                    .header("Authorization", self.bearer())
                    .call()
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to fetch models")?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// Embed one request's worth of texts
    #[inline]
    pub fn embed(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Generating {:?} embeddings for {} texts",
            input_type,
            texts.len()
        );

        let request = EmbedRequest {
            texts,
            model: &self.embed_model,
            input_type,
        };

        let response_text = self
            .post_json("v1/embed", &request)
            .context("Failed to generate embeddings")?;

        let embed_response: EmbedResponse =
            serde_json::from_str(&response_text).context("Failed to parse embedding response")?;

        if embed_response.embeddings.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                embed_response.embeddings.len()
            ));
        }

        debug!(
            "Generated {} embeddings with {} dimensions",
            embed_response.embeddings.len(),
            embed_response.embeddings.first().map_or(0, Vec::len)
        );

        Ok(embed_response.embeddings)
    }

    /// Ask the chat model a question grounded in `request.documents`
    #[inline]
    pub fn generate(&self, request: &ChatRequest<'_>) -> Result<String> {
        debug!(
            "Requesting chat completion with {} documents and {} history turns",
            request.documents.len(),
            request.history.len()
        );

        let body = CohereChatRequest {
            message: request.message,
            model: &self.chat_model,
            documents: request
                .documents
                .iter()
                .map(|text| ChatDocument {
                    text: text.as_str(),
                })
                .collect(),
            chat_history: request.history,
        };

        let response_text = self
            .post_json("v1/chat", &body)
            .context("Failed to generate chat response")?;

        let chat_response: ChatResponse =
            serde_json::from_str(&response_text).context("Failed to parse chat response")?;

        Ok(chat_response.text)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key.0)
    }

    fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<String> {
        let url = self
            .base_url
            .join(path)
            .with_context(|| format!("Failed to build URL for {}", path))?;

        let request_json = serde_json::to_string(body)
            .with_context(|| format!("Failed to serialize request for {}", path))?;

        self.make_request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Authorization", self.bearer())
                .header("Content-Type", "application/json")
                .header("Accept", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 || *status == 429 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(anyhow::anyhow!("Client error: HTTP {}", status));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            false
                        }
                    };

                    if !should_retry {
                        return Err(anyhow::anyhow!("Non-retryable error: {}", error));
                    }

                    last_error = Some(anyhow::anyhow!("Request error: {}", error));

                    if attempt < self.retry_attempts {
                        let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                        let delay = Duration::from_millis(delay_ms);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }
}

impl Embedder for CohereClient {
    #[inline]
    fn embed_batch(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>> {
        self.embed(texts, input_type)
    }

    #[inline]
    fn batch_size(&self) -> usize {
        self.batch_size as usize
    }
}

impl ChatModel for CohereClient {
    #[inline]
    fn chat(&self, request: &ChatRequest<'_>) -> Result<String> {
        self.generate(request)
    }
}
