//! Configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Orchestrator behavior
    pub orchestrator: OrchestratorConfig,

    /// Plan refinement loop
    pub refine: RefineConfig,

    /// Code execution sandbox
    pub sandbox: SandboxConfig,

    /// Web search backend
    pub search: SearchConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// HTTP server configuration
    pub server: ServerConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that required environment variables are set.
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .studyd.yml
        let local_config = PathBuf::from(".studyd.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/studyd/studyd.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("studyd").join("studyd.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("anthropic" or "openai")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .map_err(|_| eyre::eyre!("Environment variable {} is not set", self.api_key_env))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 60_000,
        }
    }
}

/// Orchestrator behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// How many recent messages to pass to the model as context
    #[serde(rename = "context-window")]
    pub context_window: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { context_window: 10 }
    }
}

/// Plan refinement loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// Maximum refinement iterations before giving up
    #[serde(rename = "max-iterations")]
    pub max_iterations: u32,

    /// Quality score at which refinement converges (0-100)
    #[serde(rename = "quality-threshold")]
    pub quality_threshold: f64,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            quality_threshold: 80.0,
        }
    }
}

/// Code execution sandbox configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Interpreter invoked on the submitted code
    pub interpreter: String,

    /// Wall-clock timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// CPU time limit in seconds (ulimit -t)
    #[serde(rename = "cpu-seconds")]
    pub cpu_seconds: u32,

    /// Address space limit in megabytes (ulimit -v)
    #[serde(rename = "memory-limit-mb")]
    pub memory_limit_mb: u32,

    /// Captured output cap in bytes
    #[serde(rename = "max-output-bytes")]
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout_ms: 5_000,
            cpu_seconds: 5,
            memory_limit_mb: 256,
            max_output_bytes: 16_384,
        }
    }
}

/// Web search backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// How many related topics to keep from instant-answer results
    #[serde(rename = "max-related-topics")]
    pub max_related_topics: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_related_topics: 5,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for session data
    #[serde(rename = "sessions-dir")]
    pub sessions_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let sessions_dir = dirs::data_dir()
            .map(|d| d.join("studyd").join("sessions"))
            .unwrap_or_else(|| PathBuf::from(".sessions"));

        Self { sessions_dir }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}
