use crate::backend::{process_memory_mib, ModelBackend};
use async_trait::async_trait;
use pandora_core::{Device, LocalModelConfig, ModelStatus, PandoraError, Result};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task;
use tracing::{debug, error, info, warn};

use candle_core::quantized::gguf_file;
use candle_core::{DType, Device as CandleDevice, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama::ModelWeights;
use hf_hub::api::tokio::Api;
use tokenizers::Tokenizer;

/// Weights and tokenizer, ready for decoding
struct LoadedModel {
    weights: ModelWeights,
    tokenizer: Tokenizer,
    device: CandleDevice,
    eos_token_id: Option<u32>,
}

/// In-process causal language model backed by a quantized GGUF checkpoint.
///
/// Loading happens once through [`ModelBackend::initialize`]. The outcome is
/// stored write-once; until then `generate` fails fast with `ModelNotLoaded`.
/// Concurrent `initialize` calls share a single load.
pub struct LocalBackend {
    config: LocalModelConfig,
    state: OnceLock<std::result::Result<Arc<LoadedModel>, String>>,
    load_lock: Mutex<()>,
}

fn inference_error(context: &str, err: impl Display) -> PandoraError {
    PandoraError::Inference(format!("{}: {}", context, err))
}

impl LocalBackend {
    pub fn new(config: LocalModelConfig) -> Self {
        Self {
            config,
            state: OnceLock::new(),
            load_lock: Mutex::new(()),
        }
    }

    fn loaded(&self) -> Result<Arc<LoadedModel>> {
        match self.state.get() {
            Some(Ok(model)) => Ok(Arc::clone(model)),
            Some(Err(e)) => Err(PandoraError::ModelNotLoaded(format!(
                "local model failed to load: {}",
                e
            ))),
            None => Err(PandoraError::ModelNotLoaded(
                "local model is still loading".to_string(),
            )),
        }
    }

    async fn resolve_model_path(&self) -> Result<PathBuf> {
        let local = PathBuf::from(&self.config.model_file);
        if self.config.model_repo.is_empty() || local.exists() {
            return Ok(local);
        }

        info!(
            "Fetching {} from {}",
            self.config.model_file, self.config.model_repo
        );
        let api = Api::new().map_err(|e| inference_error("HuggingFace Hub error", e))?;
        api.model(self.config.model_repo.clone())
            .get(&self.config.model_file)
            .await
            .map_err(|e| inference_error("Failed to download model weights", e))
    }

    async fn resolve_tokenizer_path(&self) -> Result<PathBuf> {
        if self.config.tokenizer_repo.ends_with(".json") {
            return Ok(PathBuf::from(&self.config.tokenizer_repo));
        }

        let api = Api::new().map_err(|e| inference_error("HuggingFace Hub error", e))?;
        api.model(self.config.tokenizer_repo.clone())
            .get("tokenizer.json")
            .await
            .map_err(|e| inference_error("Failed to download tokenizer", e))
    }

    async fn load(&self) -> Result<Arc<LoadedModel>> {
        let model_path = self.resolve_model_path().await?;
        let tokenizer_path = self.resolve_tokenizer_path().await?;
        let eos_token = self.config.eos_token.clone();

        task::spawn_blocking(move || read_model(&model_path, &tokenizer_path, &eos_token))
            .await
            .map_err(|e| inference_error("Model load task failed", e))?
            .map(Arc::new)
    }
}

fn read_model(model_path: &Path, tokenizer_path: &Path, eos_token: &str) -> Result<LoadedModel> {
    let device = CandleDevice::cuda_if_available(0)
        .map_err(|e| inference_error("Failed to select device", e))?;

    let mut file = std::fs::File::open(model_path).map_err(|e| {
        inference_error(&format!("Failed to open {}", model_path.display()), e)
    })?;
    let content = gguf_file::Content::read(&mut file)
        .map_err(|e| inference_error("Failed to read GGUF header", e))?;
    let weights = ModelWeights::from_gguf(content, &mut file, &device)
        .map_err(|e| inference_error("Failed to load GGUF weights", e))?;

    let tokenizer = Tokenizer::from_file(tokenizer_path)
        .map_err(|e| inference_error("Failed to load tokenizer", e))?;

    let eos_token_id = tokenizer.token_to_id(eos_token);
    if eos_token_id.is_none() {
        warn!("EOS token {:?} not in vocabulary; decoding stops at the token limit", eos_token);
    }

    Ok(LoadedModel {
        weights,
        tokenizer,
        device,
        eos_token_id,
    })
}

struct SamplingParams {
    max_input_tokens: usize,
    max_new_tokens: usize,
    temperature: f64,
    top_p: f64,
    seed: u64,
}

fn decode(model: &LoadedModel, prompt: &str, params: &SamplingParams) -> Result<String> {
    let encoding = model
        .tokenizer
        .encode(prompt, true)
        .map_err(|e| inference_error("Tokenization failed", e))?;

    let ids = encoding.get_ids();
    let prompt_tokens = &ids[..params.max_input_tokens.min(ids.len())];
    if prompt_tokens.is_empty() {
        return Err(PandoraError::Inference("prompt produced no tokens".to_string()));
    }
    if prompt_tokens.len() < ids.len() {
        debug!(
            "Prompt truncated from {} to {} tokens",
            ids.len(),
            prompt_tokens.len()
        );
    }

    // Each call gets its own KV cache
    let mut weights = model.weights.clone();
    let mut sampler = LogitsProcessor::new(params.seed, Some(params.temperature), Some(params.top_p));

    let step = |weights: &mut ModelWeights, tokens: &[u32], index_pos: usize| -> Result<Tensor> {
        let input = Tensor::new(tokens, &model.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| inference_error("Failed to build input tensor", e))?;
        weights
            .forward(&input, index_pos)
            .and_then(|logits| logits.squeeze(0))
            .and_then(|logits| logits.to_dtype(DType::F32))
            .map_err(|e| inference_error("Forward pass failed", e))
    };

    let mut generated: Vec<u32> = Vec::with_capacity(params.max_new_tokens);
    let mut logits = step(&mut weights, prompt_tokens, 0)?;

    while generated.len() < params.max_new_tokens {
        let next = sampler
            .sample(&logits)
            .map_err(|e| inference_error("Sampling failed", e))?;
        if Some(next) == model.eos_token_id {
            break;
        }
        generated.push(next);

        if generated.len() < params.max_new_tokens {
            let index_pos = prompt_tokens.len() + generated.len() - 1;
            logits = step(&mut weights, &[next], index_pos)?;
        }
    }

    model
        .tokenizer
        .decode(&generated, true)
        .map_err(|e| inference_error("Detokenization failed", e))
}

#[async_trait]
impl ModelBackend for LocalBackend {
    async fn initialize(&self) -> Result<()> {
        // Only the lock holder loads; later callers see its outcome
        let _guard = self.load_lock.lock().await;
        if self.state.get().is_some() {
            return self.loaded().map(|_| ());
        }

        let start_time = Instant::now();
        info!("Loading local model: {}", self.config.model_file);

        let outcome = self.load().await;
        match &outcome {
            Ok(model) => info!(
                "Local model loaded on {} in {:.1}s",
                if model.device.is_cuda() { "gpu" } else { "cpu" },
                start_time.elapsed().as_secs_f64()
            ),
            Err(e) => error!("Local model failed to load: {}", e),
        }

        let _ = self.state.set(outcome.map_err(|e| e.to_string()));
        self.loaded().map(|_| ())
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let model = self.loaded()?;
        let params = SamplingParams {
            max_input_tokens: self.config.max_input_tokens,
            max_new_tokens: self.config.max_new_tokens,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            seed: self.config.seed,
        };
        let prompt = prompt.to_string();
        let start_time = Instant::now();

        let text = task::spawn_blocking(move || decode(&model, &prompt, &params))
            .await
            .map_err(|e| inference_error("Decoding task failed", e))??;

        info!(
            "Local generation completed: {}ms, {} chars",
            start_time.elapsed().as_millis(),
            text.len()
        );
        Ok(text)
    }

    fn status(&self) -> ModelStatus {
        let name = self.model_name().to_string();
        let status = match self.state.get() {
            Some(Ok(model)) => {
                let device = if model.device.is_cuda() {
                    Device::Gpu
                } else {
                    Device::Cpu
                };
                ModelStatus::ready(name, device)
            }
            Some(Err(e)) => ModelStatus::pending(name).with_error(e.clone()),
            None => ModelStatus::pending(name),
        };
        status.with_memory_usage(process_memory_mib())
    }

    fn backend_name(&self) -> &str {
        "local"
    }

    fn model_name(&self) -> &str {
        &self.config.model_file
    }
}
