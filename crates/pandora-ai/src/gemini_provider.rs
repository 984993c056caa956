use crate::backend::{process_memory_mib, transport_error, ModelBackend};
use async_trait::async_trait;
use pandora_core::{Device, GeminiConfig, ModelStatus, PandoraError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Configuration for the Gemini `generateContent` API
#[derive(Debug, Clone)]
pub struct GeminiBackendConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl GeminiBackendConfig {
    pub fn from_config(config: &GeminiConfig, timeout_secs: u64) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                PandoraError::Config(
                    "Gemini API key not found. Set 'gemini.api_key' in config \
                     or GEMINI_API_KEY environment variable"
                        .to_string(),
                )
            })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// Remote backend for Google's Gemini models
pub struct GeminiBackend {
    client: Client,
    config: GeminiBackendConfig,
}

impl GeminiBackend {
    pub fn new(config: GeminiBackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PandoraError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }
}

/// Pull `candidates[0].content.parts[0].text` out of a response body
fn extract_text(body: &str) -> Result<String> {
    let envelope: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| PandoraError::Upstream(format!("Malformed Gemini response: {}", e)))?;

    envelope
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| {
            PandoraError::Upstream(
                "Gemini response missing candidates[0].content.parts[0].text".to_string(),
            )
        })
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let start_time = Instant::now();
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        debug!(
            "Sending {} prompt chars to Gemini model {}",
            prompt.len(),
            self.config.model
        );

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("Gemini", self.config.timeout, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error("Gemini", self.config.timeout, e))?;

        if !status.is_success() {
            return Err(PandoraError::Upstream(format!(
                "Gemini API error ({}): {}",
                status, body
            )));
        }

        let text = extract_text(&body)?;

        info!(
            "Gemini generation completed: {}ms, {} chars",
            start_time.elapsed().as_millis(),
            text.len()
        );

        Ok(text)
    }

    fn status(&self) -> ModelStatus {
        ModelStatus::ready(self.config.model.clone(), Device::Cpu)
            .with_memory_usage(process_memory_mib())
    }

    fn backend_name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
