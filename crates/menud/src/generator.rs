//! External AI generator client.
//!
//! One attempt per resolution; retry/backoff is the caller's concern. The
//! daemon talks to the Google Generative Language API, but everything
//! behind the [`Generator`] trait is swappable and tests use a scripted
//! fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::GeneratorConfig;

/// Structured output of one generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedDish {
    pub explanation: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub allergens: Vec<String>,
    pub cuisine: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("generator API key is not configured")]
    MissingApiKey,

    #[error("generator request failed: {0}")]
    Http(String),

    #[error("generator returned no candidates")]
    EmptyResponse,

    #[error("generator returned unparseable output: {0}")]
    InvalidJson(String),
}

/// Opaque `generate(prompt) -> JSON` collaborator.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<GeneratedDish, GeneratorError>;
}

// ============================================================================
// Gemini wire format
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

/// Gemini-backed generator.
pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, GeneratorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GeneratorError::Http(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.resolve_api_key(),
        })
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<GeneratedDish, GeneratorError> {
        let api_key = self.api_key.as_ref().ok_or(GeneratorError::MissingApiKey)?;

        let url = format!(
            "{}/{}:generateContent?key={}",
            self.endpoint, self.model, api_key
        );
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.4,
                max_output_tokens: 512,
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GeneratorError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GeneratorError::Http(format!(
                "status {}",
                response.status()
            )));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| GeneratorError::InvalidJson(e.to_string()))?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .filter(|t| !t.trim().is_empty())
            .ok_or(GeneratorError::EmptyResponse)?;

        debug!("Generator returned {} bytes", text.len());
        parse_generated_dish(&text)
    }
}

/// Parse model output into a [`GeneratedDish`], tolerating markdown fences
/// the model sometimes wraps JSON in despite instructions.
pub fn parse_generated_dish(text: &str) -> Result<GeneratedDish, GeneratorError> {
    let cleaned = strip_code_fences(text);
    serde_json::from_str(cleaned).map_err(|e| GeneratorError::InvalidJson(e.to_string()))
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}
