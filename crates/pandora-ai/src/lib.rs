pub mod backend;
pub mod backend_factory;
pub mod gemini_provider;
pub mod normalizer;
pub mod ollama_provider;
pub mod pipeline;
pub mod prompts;
pub mod security;

// In-process inference
#[cfg(feature = "local-inference")]
pub mod local_provider;

pub use backend::{process_memory_mib, ModelBackend};
pub use backend_factory::BackendFactory;
pub use gemini_provider::{GeminiBackend, GeminiBackendConfig};
pub use ollama_provider::{OllamaBackend, OllamaBackendConfig};
pub use pipeline::AnalysisPipeline;
pub use security::{parse_vulnerabilities, Severity, Vulnerability};

#[cfg(feature = "local-inference")]
pub use local_provider::LocalBackend;
