use serde::{Deserialize, Serialize};
use std::fmt;

/// A snippet submitted for analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Source code to analyze. A missing field deserializes as empty and is
    /// rejected later as an invalid request.
    #[serde(default)]
    pub code: String,
    /// Optional language hint, used as the fenced-block tag in the prompt
    #[serde(default)]
    pub language: Option<String>,
    /// Optional free-form context placed ahead of the code
    #[serde(default)]
    pub context: Option<String>,
}

impl AnalysisRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: None,
            context: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Normalized outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub text: String,
    pub suggestions: Vec<String>,
    pub errors: Vec<String>,
    /// True when `text` is the canned default analysis rather than model output
    pub fallback: bool,
}

/// Which instructional frame a request runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    Analyze,
    Suggest,
    Explain,
    Security,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Analyze => write!(f, "analyze"),
            Task::Suggest => write!(f, "suggest"),
            Task::Explain => write!(f, "explain"),
            Task::Security => write!(f, "security"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Gpu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Gpu => write!(f, "gpu"),
        }
    }
}

/// Snapshot of the backend's readiness, as reported by `GET /status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub is_loaded: bool,
    pub device: Device,
    pub model_name: String,
    /// Resident memory of the server process in MiB
    pub memory_usage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ModelStatus {
    pub fn ready(model_name: impl Into<String>, device: Device) -> Self {
        Self {
            is_loaded: true,
            device,
            model_name: model_name.into(),
            memory_usage: 0.0,
            last_error: None,
        }
    }

    pub fn pending(model_name: impl Into<String>) -> Self {
        Self {
            is_loaded: false,
            device: Device::Cpu,
            model_name: model_name.into(),
            memory_usage: 0.0,
            last_error: None,
        }
    }

    pub fn with_memory_usage(mut self, memory_usage: f64) -> Self {
        self.memory_usage = memory_usage;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.last_error = Some(error.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_missing_code_defaults_to_empty() {
        let req: AnalysisRequest = serde_json::from_str(r#"{"language": "python"}"#).unwrap();
        assert!(req.code.is_empty());
        assert_eq!(req.language.as_deref(), Some("python"));
        assert!(req.context.is_none());
    }

    #[test]
    fn test_status_serialization() {
        let status = ModelStatus::ready("deepseek-coder", Device::Gpu).with_memory_usage(512.5);
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["is_loaded"], true);
        assert_eq!(value["device"], "gpu");
        assert_eq!(value["memory_usage"], 512.5);
        assert!(value.get("last_error").is_none());

        let failed = ModelStatus::pending("deepseek-coder").with_error("missing weights");
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["is_loaded"], false);
        assert_eq!(value["last_error"], "missing weights");
    }

    #[test]
    fn test_task_display() {
        assert_eq!(Task::Security.to_string(), "security");
        let task: Task = serde_json::from_str("\"explain\"").unwrap();
        assert_eq!(task, Task::Explain);
    }
}
