//! Generation backend implementations
//!
//! Supports Ollama-compatible HTTP endpoints. Requests retry on transient
//! failures with a doubling backoff; the streaming variant forwards
//! chunks through an mpsc channel as they arrive.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use knowledge_agent_config::GenerationSettings;

use crate::LlmError;

/// Generation configuration
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Model name/ID
    pub model: String,
    /// API endpoint
    pub endpoint: String,
    /// API key (optional)
    pub api_key: Option<String>,
    /// Maximum tokens to generate
    pub max_tokens: usize,
    /// Temperature
    pub temperature: f32,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
    /// Initial backoff duration (doubles each retry)
    pub initial_backoff: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::from(&GenerationSettings::default())
    }
}

impl From<&GenerationSettings> for GenerationConfig {
    fn from(settings: &GenerationSettings) -> Self {
        Self {
            model: settings.model.clone(),
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            timeout: Duration::from_millis(settings.timeout_ms),
            max_retries: settings.max_retries,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

/// Generation result
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Generated text
    pub text: String,
    /// Tokens generated, when the backend reports it
    pub tokens: usize,
    /// Total generation time (ms)
    pub total_time_ms: u64,
    /// Finish reason
    pub finish_reason: FinishReason,
}

/// Finish reason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    Error,
}

/// Generation backend trait
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a completion for a prompt
    async fn generate(&self, prompt: &str) -> Result<GenerationResult, LlmError>;

    /// Generate with streaming; chunks are sent as they arrive and the
    /// final result is returned once the stream closes
    async fn generate_stream(
        &self,
        prompt: &str,
        tx: mpsc::Sender<String>,
    ) -> Result<GenerationResult, LlmError>;

    /// Check if the backend is reachable
    async fn is_available(&self) -> bool;

    /// Model name
    fn model_name(&self) -> &str;
}

/// Ollama-compatible HTTP backend
pub struct OllamaBackend {
    config: GenerationConfig,
    client: Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<usize>,
    #[serde(default)]
    done: bool,
}

impl OllamaBackend {
    pub fn new(config: GenerationConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Request(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn request_body<'a>(&'a self, prompt: &'a str, stream: bool) -> OllamaRequest<'a> {
        OllamaRequest {
            model: &self.config.model,
            prompt,
            stream,
            options: OllamaOptions {
                num_predict: self.config.max_tokens,
                temperature: self.config.temperature,
            },
        }
    }

    async fn generate_once(&self, prompt: &str) -> Result<GenerationResult, LlmError> {
        let start = Instant::now();

        let mut request = self
            .client
            .post(format!("{}/api/generate", self.config.endpoint))
            .json(&self.request_body(prompt, false));
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(self.config.timeout.as_millis() as u64)
            } else {
                LlmError::Request(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(LlmError::Request(format!(
                "HTTP {} from generation endpoint",
                response.status()
            )));
        }

        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let tokens = body.eval_count.unwrap_or(0);
        Ok(GenerationResult {
            text: body.response,
            tokens,
            total_time_ms: start.elapsed().as_millis() as u64,
            finish_reason: if tokens >= self.config.max_tokens {
                FinishReason::Length
            } else {
                FinishReason::Stop
            },
        })
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn generate(&self, prompt: &str) -> Result<GenerationResult, LlmError> {
        let mut backoff = self.config.initial_backoff;
        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            match self.generate_once(prompt).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "generation attempt failed");
                    last_err = Some(e);
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| LlmError::Request("no attempts made".into())))
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        tx: mpsc::Sender<String>,
    ) -> Result<GenerationResult, LlmError> {
        let start = Instant::now();

        let mut request = self
            .client
            .post(format!("{}/api/generate", self.config.endpoint))
            .json(&self.request_body(prompt, true));
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }

        let mut response = request
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::Request(format!(
                "HTTP {} from generation endpoint",
                response.status()
            )));
        }

        let mut full = String::new();
        let mut tokens = 0usize;
        let mut buffer = String::new();

        // Ollama streams newline-delimited JSON objects
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?
        {
            buffer.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(pos) = buffer.find('\n') {
                let line: String = buffer.drain(..=pos).collect();
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let parsed: OllamaResponse = serde_json::from_str(line)
                    .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
                if !parsed.response.is_empty() {
                    full.push_str(&parsed.response);
                    tokens += 1;
                    // A closed receiver just means the consumer went away
                    let _ = tx.send(parsed.response).await;
                }
                if parsed.done {
                    tokens = parsed.eval_count.unwrap_or(tokens);
                }
            }
        }

        Ok(GenerationResult {
            text: full,
            tokens,
            total_time_ms: start.elapsed().as_millis() as u64,
            finish_reason: FinishReason::Stop,
        })
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.config.endpoint))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
