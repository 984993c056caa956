use crate::error::PandoraError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for PandoraError {
    fn from(err: ConfigError) -> Self {
        PandoraError::Config(err.to_string())
    }
}

/// Main configuration for the Pandora service
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PandoraConfig {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Which model backend serves requests
    #[serde(default)]
    pub backend: BackendConfig,

    /// Local inference model settings
    #[serde(default)]
    pub local: LocalModelConfig,

    /// Gemini API settings
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Ollama API settings
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Request pipeline behaviour
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// Get the bind address as host:port string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend: "local", "gemini" or "ollama"
    #[serde(default = "default_backend_kind")]
    pub kind: String,

    /// Timeout applied to every outbound call of a remote backend
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: default_backend_kind(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Local causal language model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalModelConfig {
    /// HuggingFace repository holding the GGUF weights. When empty, or when
    /// `model_file` is an existing path on disk, nothing is downloaded.
    #[serde(default = "default_model_repo")]
    pub model_repo: String,

    /// GGUF file name inside `model_repo`, or a path on disk
    #[serde(default = "default_model_file")]
    pub model_file: String,

    /// HuggingFace repository holding `tokenizer.json`, or a local path
    /// ending in `.json`
    #[serde(default = "default_tokenizer_repo")]
    pub tokenizer_repo: String,

    /// Prompt tokens beyond this are truncated
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,

    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: usize,

    #[serde(default = "default_local_temperature")]
    pub temperature: f64,

    #[serde(default = "default_top_p")]
    pub top_p: f64,

    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Token that ends generation early
    #[serde(default = "default_eos_token")]
    pub eos_token: String,
}

impl Default for LocalModelConfig {
    fn default() -> Self {
        Self {
            model_repo: default_model_repo(),
            model_file: default_model_file(),
            tokenizer_repo: default_tokenizer_repo(),
            max_input_tokens: default_max_input_tokens(),
            max_new_tokens: default_max_new_tokens(),
            temperature: default_local_temperature(),
            top_p: default_top_p(),
            seed: default_seed(),
            eos_token: default_eos_token(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_gemini_model")]
    pub model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            api_key: None,
            model: default_gemini_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    #[serde(default = "default_ollama_model")]
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            model: default_ollama_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    /// Degrade backend failures into the default analysis instead of
    /// returning an error response
    #[serde(default)]
    pub fallback_on_backend_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: "pretty", "compact", "full"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_backend_kind() -> String {
    "local".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_model_repo() -> String {
    "TheBloke/deepseek-coder-1.3b-instruct-GGUF".to_string()
}
fn default_model_file() -> String {
    "deepseek-coder-1.3b-instruct.Q4_K_M.gguf".to_string()
}
fn default_tokenizer_repo() -> String {
    "deepseek-ai/deepseek-coder-1.3b-instruct".to_string()
}
fn default_max_input_tokens() -> usize {
    512
}
fn default_max_new_tokens() -> usize {
    512
}
fn default_local_temperature() -> f64 {
    0.7
}
fn default_top_p() -> f64 {
    0.95
}
fn default_seed() -> u64 {
    299_792_458
}
fn default_eos_token() -> String {
    "<|EOT|>".to_string()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_ollama_model() -> String {
    "deepseek-coder:6.7b".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Shape of the JSON file pointed to by `CONFIG_PATH`:
/// `{"api": {"gemini": {"base_url": "...", "key": "..."}}}`
#[derive(Debug, Deserialize)]
struct LegacyConfigFile {
    api: LegacyApiSection,
}

#[derive(Debug, Deserialize)]
struct LegacyApiSection {
    #[serde(default)]
    gemini: Option<LegacyGeminiSection>,
}

#[derive(Debug, Deserialize)]
struct LegacyGeminiSection {
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

/// Configuration manager with layered sources
pub struct ConfigManager {
    config: PandoraConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration. Later layers override earlier ones:
    /// 1. Defaults
    /// 2. Config file (explicit path, PANDORA_CONFIG, .pandora.toml, ~/.pandora/config.toml)
    /// 3. Legacy JSON file named by CONFIG_PATH
    /// 4. Environment variables, including those loaded from a .env file
    ///
    /// `RUST_LOG` is not read here; the binary hands it to `EnvFilter` as is.
    pub fn load_from(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        info!("Loading Pandora configuration...");

        Self::load_dotenv();

        let (config, config_path) = Self::load_config_file(explicit_path)?;
        let config = Self::apply_legacy_json(config)?;
        let config = Self::apply_env_overrides(config);

        Self::validate_config(&config)?;

        info!("Configuration loaded successfully");
        match config_path {
            Some(ref path) => info!("   Config file: {}", path.display()),
            None => info!("   Config file: NONE (using defaults)"),
        }
        info!("   Backend: {}", config.backend.kind);
        info!("   Listen address: {}", config.server.bind_address());
        info!(
            "   Fallback on backend error: {}",
            config.pipeline.fallback_on_backend_error
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: PandoraConfig) -> Result<Self, ConfigError> {
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: None,
        })
    }

    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            } else {
                info!("Loaded .env file from current directory");
            }
            return;
        }

        if let Some(home) = dirs::home_dir() {
            let home_env = home.join(".pandora.env");
            if home_env.exists() {
                if let Err(e) = dotenv::from_path(&home_env) {
                    warn!("Failed to load .pandora.env: {}", e);
                } else {
                    info!("Loaded .pandora.env from home directory");
                }
            }
        }
    }

    fn load_config_file(
        explicit_path: Option<&Path>,
    ) -> Result<(PandoraConfig, Option<PathBuf>), ConfigError> {
        let requested = explicit_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("PANDORA_CONFIG").ok().map(PathBuf::from));

        // A path the caller asked for must exist
        if let Some(path) = requested {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            let config = Self::read_toml_file(&path)?;
            return Ok((config, Some(path)));
        }

        let local_config = Path::new(".pandora.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".pandora").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        info!("No config file found, using defaults");
        Ok((PandoraConfig::default(), None))
    }

    fn read_toml_file(path: &Path) -> Result<PandoraConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn apply_legacy_json(config: PandoraConfig) -> Result<PandoraConfig, ConfigError> {
        match std::env::var("CONFIG_PATH") {
            Ok(path) => Self::merge_legacy_json(config, Path::new(&path)),
            Err(_) => Ok(config),
        }
    }

    fn merge_legacy_json(
        mut config: PandoraConfig,
        path: &Path,
    ) -> Result<PandoraConfig, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        let legacy: LegacyConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(gemini) = legacy.api.gemini {
            if let Some(base_url) = gemini.base_url {
                config.gemini.base_url = base_url;
            }
            if let Some(key) = gemini.key {
                config.gemini.api_key = Some(key);
            }
            if let Some(model) = gemini.model {
                config.gemini.model = model;
            }
            info!("Applied Gemini settings from {}", path.display());
        }

        Ok(config)
    }

    fn apply_env_overrides(mut config: PandoraConfig) -> PandoraConfig {
        if let Ok(kind) = std::env::var("PANDORA_BACKEND") {
            config.backend.kind = kind.to_lowercase();
        }
        if let Ok(model) = std::env::var("PANDORA_MODEL") {
            match config.backend.kind.as_str() {
                "gemini" => config.gemini.model = model,
                "ollama" => config.ollama.model = model,
                _ => config.local.model_file = model,
            }
        }
        if let Ok(host) = std::env::var("PANDORA_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("PANDORA_PORT") {
            match port.parse() {
                Ok(p) => config.server.port = p,
                Err(_) => warn!("Ignoring invalid PANDORA_PORT: {}", port),
            }
        }
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            config.gemini.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("GEMINI_BASE_URL") {
            config.gemini.base_url = url;
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            config.ollama.base_url = url;
        }
        if let Ok(fallback) = std::env::var("PANDORA_FALLBACK_ON_ERROR") {
            config.pipeline.fallback_on_backend_error =
                fallback.to_lowercase() == "true" || fallback == "1";
        }

        config
    }

    fn validate_config(config: &PandoraConfig) -> Result<(), ConfigError> {
        match config.backend.kind.as_str() {
            "local" | "ollama" => {}
            "gemini" => {
                let has_key = config
                    .gemini
                    .api_key
                    .as_deref()
                    .map(|k| !k.trim().is_empty())
                    .unwrap_or(false);
                if !has_key {
                    return Err(ConfigError::ValidationError(
                        "Gemini backend requires an API key. Set 'gemini.api_key' in config \
                         or GEMINI_API_KEY environment variable"
                            .to_string(),
                    ));
                }
            }
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid backend: {}. Must be one of: local, gemini, ollama",
                    other
                )))
            }
        }

        if !(0.0..=2.0).contains(&config.local.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid temperature: {}. Must be between 0.0 and 2.0",
                config.local.temperature
            )));
        }

        if config.local.top_p <= 0.0 || config.local.top_p > 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "Invalid top_p: {}. Must be in (0.0, 1.0]",
                config.local.top_p
            )));
        }

        // Directive strings like "pandora_api=debug" are left to the filter parser
        let level = config.logging.level.to_ascii_lowercase();
        if !level.contains('=') && !level.contains(',') {
            match level.as_str() {
                "off" | "trace" | "debug" | "info" | "warn" | "error" => {}
                other => {
                    return Err(ConfigError::ValidationError(format!(
                        "Invalid log level: {}. Must be one of: off, trace, debug, info, warn, error",
                        other
                    )))
                }
            }
        }

        match config.logging.format.as_str() {
            "pretty" | "compact" | "full" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, compact, full",
                    other
                )))
            }
        }

        Ok(())
    }

    pub fn config(&self) -> &PandoraConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = PandoraConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}
