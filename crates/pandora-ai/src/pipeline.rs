use crate::backend::ModelBackend;
use crate::{normalizer, prompts};
use pandora_core::{AnalysisRequest, AnalysisResult, ModelStatus, Result, Task};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Build, generate, normalize.
///
/// Holds no per-request state, so one instance is shared by every handler.
pub struct AnalysisPipeline {
    backend: Arc<dyn ModelBackend>,
    fallback_on_backend_error: bool,
}

impl AnalysisPipeline {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            backend,
            fallback_on_backend_error: false,
        }
    }

    /// Degrade backend failures into the default analysis instead of
    /// returning them.
    pub fn with_fallback_on_backend_error(mut self, enabled: bool) -> Self {
        self.fallback_on_backend_error = enabled;
        self
    }

    pub fn backend(&self) -> &Arc<dyn ModelBackend> {
        &self.backend
    }

    pub fn status(&self) -> ModelStatus {
        self.backend.status()
    }

    /// Run one request through the full pipeline
    pub async fn run(&self, task: Task, request: &AnalysisRequest) -> Result<AnalysisResult> {
        let start_time = Instant::now();

        debug!(%task, "building prompt");
        let prompt = prompts::build_for_task(task, request)?;

        debug!(%task, prompt_chars = prompt.len(), "awaiting backend");
        let raw = match self.backend.generate(&prompt).await {
            Ok(raw) => raw,
            Err(e) if self.fallback_on_backend_error && e.is_backend_failure() => {
                warn!(%task, "backend failed, using default analysis: {}", e);
                return Ok(normalizer::degrade(&request.code, e.to_string()));
            }
            Err(e) => {
                debug!(%task, "responding with error: {}", e);
                return Err(e);
            }
        };

        debug!(%task, raw_chars = raw.len(), "normalizing");
        let result = normalizer::normalize(&raw, &request.code);

        debug!(
            %task,
            fallback = result.fallback,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "responding"
        );
        Ok(result)
    }

    /// Send the code itself as the prompt and return the raw generation
    pub async fn generate_raw(&self, request: &AnalysisRequest) -> Result<String> {
        prompts::validate_code(&request.code)?;
        debug!(prompt_chars = request.code.len(), "raw generation");
        self.backend.generate(&request.code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pandora_core::{Device, PandoraError};
    use std::sync::Mutex;

    /// Backend that replays a fixed outcome and records prompts
    struct ScriptedBackend {
        outcome: fn() -> Result<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(outcome: fn() -> Result<String>) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ModelBackend for ScriptedBackend {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            (self.outcome)()
        }

        fn status(&self) -> ModelStatus {
            ModelStatus::ready("scripted", Device::Cpu)
        }

        fn backend_name(&self) -> &str {
            "scripted"
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    const FIB: &str = "def fib(n):\n    if n < 2:\n        return n\n    return fib(n-1) + fib(n-2)\n";

    fn long_review() -> Result<String> {
        Ok("1. Complexity: exponential time.\n2. Readability: fine.\n3. Suggestions: memoize.".to_string())
    }

    fn short_reply() -> Result<String> {
        Ok("ok".to_string())
    }

    fn upstream_failure() -> Result<String> {
        Err(PandoraError::Upstream("Gemini API error (500): boom".to_string()))
    }

    fn not_loaded() -> Result<String> {
        Err(PandoraError::ModelNotLoaded("still loading".to_string()))
    }

    #[tokio::test]
    async fn test_run_passes_model_output_through() {
        let backend = ScriptedBackend::new(long_review);
        let pipeline = AnalysisPipeline::new(backend.clone());

        let request = AnalysisRequest::new(FIB).with_language("python");
        let result = pipeline.run(Task::Analyze, &request).await.unwrap();

        assert!(!result.fallback);
        assert_eq!(result.suggestions.len(), 3);

        let prompts = backend.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("```python"));
        assert!(prompts[0].contains(FIB));
    }

    #[tokio::test]
    async fn test_short_output_uses_default_analysis() {
        let pipeline = AnalysisPipeline::new(ScriptedBackend::new(short_reply));
        let result = pipeline
            .run(Task::Analyze, &AnalysisRequest::new(FIB))
            .await
            .unwrap();

        assert!(result.fallback);
        assert!(result.text.contains("recursive implementation"));
    }

    #[tokio::test]
    async fn test_empty_code_never_reaches_backend() {
        let backend = ScriptedBackend::new(long_review);
        let pipeline = AnalysisPipeline::new(backend.clone());

        let err = pipeline
            .run(Task::Analyze, &AnalysisRequest::new("  \n"))
            .await
            .unwrap_err();
        assert!(matches!(err, PandoraError::InvalidRequest(_)));

        let err = pipeline
            .generate_raw(&AnalysisRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PandoraError::InvalidRequest(_)));

        assert!(backend.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_propagates_by_default() {
        let pipeline = AnalysisPipeline::new(ScriptedBackend::new(upstream_failure));
        let err = pipeline
            .run(Task::Analyze, &AnalysisRequest::new(FIB))
            .await
            .unwrap_err();
        assert!(matches!(err, PandoraError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_backend_failure_degrades_when_enabled() {
        let pipeline = AnalysisPipeline::new(ScriptedBackend::new(upstream_failure))
            .with_fallback_on_backend_error(true);
        let result = pipeline
            .run(Task::Analyze, &AnalysisRequest::new(FIB))
            .await
            .unwrap();

        assert!(result.fallback);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("boom"));
    }

    #[tokio::test]
    async fn test_model_not_loaded_is_never_degraded() {
        let pipeline = AnalysisPipeline::new(ScriptedBackend::new(not_loaded))
            .with_fallback_on_backend_error(true);
        let err = pipeline
            .run(Task::Analyze, &AnalysisRequest::new(FIB))
            .await
            .unwrap_err();
        assert!(matches!(err, PandoraError::ModelNotLoaded(_)));
    }

    #[tokio::test]
    async fn test_generate_raw_sends_code_verbatim() {
        let backend = ScriptedBackend::new(short_reply);
        let pipeline = AnalysisPipeline::new(backend.clone());

        let text = pipeline
            .generate_raw(&AnalysisRequest::new("def add(a, b):"))
            .await
            .unwrap();
        assert_eq!(text, "ok");
        assert_eq!(backend.prompts.lock().unwrap()[0], "def add(a, b):");
    }
}
