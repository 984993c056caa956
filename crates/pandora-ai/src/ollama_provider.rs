use crate::backend::{process_memory_mib, transport_error, ModelBackend};
use async_trait::async_trait;
use pandora_core::{Device, ModelStatus, OllamaConfig, PandoraError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct OllamaBackendConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: usize,
    pub timeout: Duration,
}

impl Default for OllamaBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "deepseek-coder:6.7b".to_string(),
            temperature: 0.7,
            top_p: 0.95,
            max_tokens: 1024,
            timeout: Duration::from_secs(30),
        }
    }
}

impl OllamaBackendConfig {
    pub fn from_config(config: &OllamaConfig, timeout_secs: u64) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout: Duration::from_secs(timeout_secs),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
    top_p: f64,
    num_predict: usize,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<usize>,
    #[serde(default)]
    prompt_eval_count: Option<usize>,
}

/// Remote backend for a model served by Ollama's `/api/generate`
pub struct OllamaBackend {
    client: Client,
    config: OllamaBackendConfig,
}

impl OllamaBackend {
    pub fn new(config: OllamaBackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PandoraError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl ModelBackend for OllamaBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let start_time = Instant::now();
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                num_predict: self.config.max_tokens,
            },
        };

        debug!("Sending request to Ollama model {}", self.config.model);

        let response = self
            .client
            .post(format!("{}/api/generate", self.config.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("Ollama", self.config.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PandoraError::Upstream(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let data: GenerateResponse = response
            .json()
            .await
            .map_err(|e| PandoraError::Upstream(format!("Failed to parse Ollama response: {}", e)))?;

        info!(
            "Ollama generation completed: {}ms, context: {} tokens, completion: {} tokens",
            start_time.elapsed().as_millis(),
            data.prompt_eval_count.unwrap_or(0),
            data.eval_count.unwrap_or(0)
        );

        Ok(data.response)
    }

    fn status(&self) -> ModelStatus {
        ModelStatus::ready(self.config.model.clone(), Device::Cpu)
            .with_memory_usage(process_memory_mib())
    }

    fn backend_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
