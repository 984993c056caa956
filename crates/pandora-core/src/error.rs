use thiserror::Error;

#[derive(Error, Debug)]
pub enum PandoraError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model not loaded: {0}")]
    ModelNotLoaded(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PandoraError {
    /// Failures raised while talking to a model, as opposed to bad input or
    /// an unready service. These are the only kinds the pipeline may degrade
    /// into the default analysis.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            PandoraError::Inference(_) | PandoraError::Upstream(_) | PandoraError::Network(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PandoraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PandoraError::InvalidRequest("code must not be empty".to_string());
        assert_eq!(err.to_string(), "Invalid request: code must not be empty");

        let err = PandoraError::Upstream("status 500".to_string());
        assert_eq!(err.to_string(), "Upstream error: status 500");
    }

    #[test]
    fn test_backend_failure_classification() {
        assert!(PandoraError::Inference("oom".into()).is_backend_failure());
        assert!(PandoraError::Upstream("bad envelope".into()).is_backend_failure());
        assert!(PandoraError::Network("timeout".into()).is_backend_failure());
        assert!(!PandoraError::InvalidRequest("empty".into()).is_backend_failure());
        assert!(!PandoraError::ModelNotLoaded("loading".into()).is_backend_failure());
    }

    #[test]
    fn test_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: PandoraError = json_err.into();
        assert!(matches!(err, PandoraError::Serialization(_)));
    }
}
