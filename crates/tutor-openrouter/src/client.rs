//! OpenRouter chat-completions client implementation

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use tutor_core::{ChatMessage, Error, GenerationConfig, GenerationProvider, GenerationResult, Result};

use crate::config::OpenRouterConfig;

/// OpenRouter (OpenAI-compatible) chat-completions client
pub struct OpenRouterClient {
    config: OpenRouterConfig,
    generation: GenerationConfig,
    client: Client,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionUsage {
    total_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    usage: Option<CompletionUsage>,
    error: Option<ApiErrorBody>,
}

/// Failure of a single attempt, tagged with whether another attempt may help
enum AttemptError {
    Transient(Error),
    Fatal(Error),
}

impl OpenRouterClient {
    /// Create a new client from configuration
    pub fn new(config: OpenRouterConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        let generation = config.generation_config();

        Ok(Self {
            config,
            generation,
            client,
        })
    }

    /// Create a new client from environment variables
    pub fn from_env() -> Result<Self> {
        let config = OpenRouterConfig::from_env()?;
        Self::new(config)
    }

    /// Override generation parameters (model, limits, timeout, retries)
    pub fn with_generation_config(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    /// Perform one request against the completions endpoint
    async fn perform_generation(
        &self,
        messages: &[ChatMessage],
    ) -> std::result::Result<GenerationResult, AttemptError> {
        let request_body = CompletionRequest {
            model: &self.generation.model_id,
            messages,
            max_tokens: self.generation.max_tokens,
            temperature: self.generation.temperature,
        };

        let url = format!("{}/chat/completions", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .bearer_auth(&self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| AttemptError::Transient(Error::Network(e.to_string())))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| AttemptError::Transient(Error::Network(e.to_string())))?;

        if !status.is_success() {
            let err = Error::Generation(format!(
                "OpenRouter request failed with status {}: {}",
                status, response_text
            ));
            return Err(if is_transient(status) {
                AttemptError::Transient(err)
            } else {
                AttemptError::Fatal(err)
            });
        }

        let (text, tokens_used) = parse_completion(&response_text).map_err(AttemptError::Fatal)?;

        Ok(GenerationResult {
            text,
            model_id: self.generation.model_id.clone(),
            tokens_used,
        })
    }
}

const BACKOFF_BASE_MS: u64 = 250;
const BACKOFF_CAP_MS: u64 = 30_000;

/// Delay after the given failed attempt (1-based), doubling up to a cap
fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(BACKOFF_BASE_MS.saturating_mul(factor).min(BACKOFF_CAP_MS))
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Extract the first candidate's text from a completions response body
pub(crate) fn parse_completion(body: &str) -> Result<(String, Option<u32>)> {
    let parsed: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| Error::Generation(format!("Malformed completion response: {e}")))?;

    if let Some(error) = parsed.error {
        return Err(Error::Generation(error.message));
    }

    let tokens_used = parsed.usage.and_then(|u| u.total_tokens);

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::Generation("No choices returned".to_string()))?;

    let text = choice
        .message
        .content
        .ok_or_else(|| Error::Generation("First choice has no content".to_string()))?;

    Ok((text, tokens_used))
}

#[async_trait]
impl GenerationProvider for OpenRouterClient {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<GenerationResult> {
        let attempts = self.generation.max_retries.saturating_add(1);
        let mut last_error = Error::Generation("No generation attempt was made".to_string());

        for attempt in 1..=attempts {
            debug!(model = %self.generation.model_id, attempt, "requesting completion");

            let outcome = match timeout(self.generation.timeout, self.perform_generation(messages)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(AttemptError::Transient(Error::Timeout(format!(
                    "No completion within {:?}",
                    self.generation.timeout
                )))),
            };

            match outcome {
                Ok(result) => return Ok(result),
                Err(AttemptError::Fatal(e)) => return Err(into_generation_error(e)),
                Err(AttemptError::Transient(e)) => {
                    if attempt < attempts {
                        let backoff = backoff_delay(attempt);
                        warn!(attempt, error = %e, ?backoff, "completion attempt failed, retrying");
                        tokio::time::sleep(backoff).await;
                    }
                    last_error = e;
                }
            }
        }

        Err(into_generation_error(last_error))
    }

    fn model_id(&self) -> &str {
        &self.generation.model_id
    }
}

fn into_generation_error(err: Error) -> Error {
    match err {
        Error::Generation(_) => err,
        other => Error::Generation(other.to_string()),
    }
}
