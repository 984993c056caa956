use crate::backend::ModelBackend;
use crate::gemini_provider::{GeminiBackend, GeminiBackendConfig};
use crate::ollama_provider::{OllamaBackend, OllamaBackendConfig};
use pandora_core::{PandoraConfig, PandoraError, Result};
use std::sync::Arc;
use tracing::info;

#[cfg(feature = "local-inference")]
use crate::local_provider::LocalBackend;

/// Factory for creating the model backend named in configuration
pub struct BackendFactory;

impl BackendFactory {
    /// Create the configured backend. Called once at startup.
    pub fn create_from_config(config: &PandoraConfig) -> Result<Arc<dyn ModelBackend>> {
        let kind = config.backend.kind.to_lowercase();

        let backend = match kind.as_str() {
            "local" => Self::create_local_backend(config)?,
            "gemini" => Self::create_gemini_backend(config)?,
            "ollama" => Self::create_ollama_backend(config)?,
            _ => {
                return Err(PandoraError::Config(format!(
                    "Unsupported backend: {}. Available backends: {}",
                    kind,
                    Self::supported_backends().join(", ")
                )))
            }
        };

        info!(
            "Using {} backend with model {}",
            backend.backend_name(),
            backend.model_name()
        );
        Ok(backend)
    }

    /// Backend names accepted by `create_from_config` in this build
    pub fn supported_backends() -> Vec<&'static str> {
        let mut backends = Vec::new();
        if cfg!(feature = "local-inference") {
            backends.push("local");
        }
        backends.push("gemini");
        backends.push("ollama");
        backends
    }

    fn create_local_backend(config: &PandoraConfig) -> Result<Arc<dyn ModelBackend>> {
        #[cfg(feature = "local-inference")]
        {
            Ok(Arc::new(LocalBackend::new(config.local.clone())))
        }

        #[cfg(not(feature = "local-inference"))]
        {
            let _ = config;
            Err(PandoraError::Config(
                "Local backend requires the 'local-inference' feature. \
                 Rebuild with --features local-inference or use 'gemini' or 'ollama'."
                    .to_string(),
            ))
        }
    }

    fn create_gemini_backend(config: &PandoraConfig) -> Result<Arc<dyn ModelBackend>> {
        let gemini_config =
            GeminiBackendConfig::from_config(&config.gemini, config.backend.timeout_secs)?;
        Ok(Arc::new(GeminiBackend::new(gemini_config)?))
    }

    fn create_ollama_backend(config: &PandoraConfig) -> Result<Arc<dyn ModelBackend>> {
        let ollama_config =
            OllamaBackendConfig::from_config(&config.ollama, config.backend.timeout_secs);
        Ok(Arc::new(OllamaBackend::new(ollama_config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_backend_is_rejected() {
        let mut config = PandoraConfig::default();
        config.backend.kind = "openai".to_string();

        match BackendFactory::create_from_config(&config) {
            Err(PandoraError::Config(msg)) => assert!(msg.contains("gemini, ollama")),
            other => panic!("unexpected result: {:?}", other.map(|b| b.backend_name().to_string())),
        }
    }

    #[test]
    fn test_gemini_without_key_is_rejected() {
        let mut config = PandoraConfig::default();
        config.backend.kind = "gemini".to_string();
        assert!(BackendFactory::create_from_config(&config).is_err());

        config.gemini.api_key = Some("test-key".to_string());
        let backend = BackendFactory::create_from_config(&config).unwrap();
        assert_eq!(backend.backend_name(), "gemini");
    }

    #[test]
    fn test_ollama_backend_kind_is_case_insensitive() {
        let mut config = PandoraConfig::default();
        config.backend.kind = "Ollama".to_string();
        let backend = BackendFactory::create_from_config(&config).unwrap();
        assert_eq!(backend.backend_name(), "ollama");
        assert!(backend.status().is_loaded);
    }

    #[cfg(feature = "local-inference")]
    #[test]
    fn test_local_backend_starts_unloaded() {
        let backend = BackendFactory::create_from_config(&PandoraConfig::default()).unwrap();
        assert_eq!(backend.backend_name(), "local");
        assert!(!backend.status().is_loaded);
    }
}
