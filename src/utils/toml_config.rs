//! TOML-based configuration for deepdive
//!
//! This module provides declarative configuration for providers, the four
//! stage models (planner, decomposer, coordinator, subagent), search, the
//! tool-protocol server and run limits via a TOML file (`deepdive.toml`).
//!
//! Secrets never live in the file. Providers and the search backend name the
//! environment variable that holds their key (`api_key_env`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Model entries every configuration must define, one per pipeline stage
pub const STAGE_MODELS: [&str; 4] = ["planner", "decomposer", "coordinator", "subagent"];

/// Root configuration structure loaded from deepdive.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepdiveConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Named LLM provider configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Stage model configurations that reference providers
    #[serde(default)]
    pub models: HashMap<String, ModelConfig>,

    #[serde(default)]
    pub planner: PlannerConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub mcp: McpConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
    },
    OpenAI {
        /// Environment variable containing API key
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
    },
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

// ============= Model Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Name of the provider entry to use
    pub provider: String,
    /// Model identifier sent to the provider
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ModelConfig {
    fn local(model: &str, temperature: f32) -> Self {
        Self {
            provider: "local".to_string(),
            model: model.to_string(),
            temperature: Some(temperature),
            max_tokens: None,
        }
    }
}

// ============= Stage Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Stream plan fragments to the progress sink as they arrive
    #[serde(default = "default_true")]
    pub stream: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self { stream: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackendKind {
    SerpApi,
    DuckDuckGo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_backend")]
    pub backend: SearchBackendKind,

    /// Environment variable containing the SerpAPI key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default = "default_num_results")]
    pub num_results: usize,
}

fn default_search_backend() -> SearchBackendKind {
    SearchBackendKind::DuckDuckGo
}

fn default_num_results() -> usize {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: default_search_backend(),
            api_key_env: None,
            num_results: default_num_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_mcp_url")]
    pub url: String,
}

fn default_mcp_url() -> String {
    "http://localhost:8000/mcp/".to_string()
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_mcp_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Tool-calling turns for the dispatch agent
    #[serde(default = "default_dispatch_iterations")]
    pub dispatch_max_iterations: usize,

    /// Tool-calling turns for each worker
    #[serde(default = "default_worker_iterations")]
    pub worker_max_iterations: usize,

    /// Workers a single run may spawn
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// Run workers requested in the same dispatch turn concurrently
    #[serde(default = "default_true")]
    pub parallel_workers: bool,
}

fn default_dispatch_iterations() -> usize {
    24
}

fn default_worker_iterations() -> usize {
    12
}

fn default_max_workers() -> usize {
    16
}

fn default_tool_timeout() -> u64 {
    120
}

impl LimitsConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            dispatch_max_iterations: default_dispatch_iterations(),
            worker_max_iterations: default_worker_iterations(),
            max_workers: default_max_workers(),
            tool_timeout_secs: default_tool_timeout(),
            parallel_workers: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

fn default_output_path() -> PathBuf {
    PathBuf::from("research_result.md")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

// ============= Errors =============

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Provider '{0}' referenced by model '{1}' does not exist")]
    MissingProvider(String, String),

    #[error("Model '{0}' is required but not configured")]
    MissingModel(String),
}

impl From<ConfigError> for crate::types::AppError {
    fn from(err: ConfigError) -> Self {
        crate::types::AppError::Config(err.to_string())
    }
}

impl Default for DeepdiveConfig {
    /// A local setup: every stage on Ollama, DuckDuckGo search, no MCP server
    fn default() -> Self {
        let providers = HashMap::from([(
            "local".to_string(),
            ProviderConfig::Ollama {
                base_url: default_ollama_url(),
            },
        )]);
        let models = HashMap::from([
            ("planner".to_string(), ModelConfig::local("llama3.1:8b", 0.7)),
            ("decomposer".to_string(), ModelConfig::local("llama3.1:8b", 0.2)),
            ("coordinator".to_string(), ModelConfig::local("llama3.1:8b", 0.3)),
            ("subagent".to_string(), ModelConfig::local("llama3.1:8b", 0.3)),
        ]);

        Self {
            log_level: default_log_level(),
            providers,
            models,
            planner: PlannerConfig::default(),
            search: SearchConfig::default(),
            mcp: McpConfig::default(),
            limits: LimitsConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl DeepdiveConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parse without validating
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, provider) in &self.providers {
            match provider {
                ProviderConfig::OpenAI {
                    api_key_env,
                    api_base,
                } => {
                    self.validate_env_var(api_key_env)?;
                    validate_url(api_base, &format!("providers.{}.api_base", name))?;
                }
                ProviderConfig::Ollama { base_url } => {
                    validate_url(base_url, &format!("providers.{}.base_url", name))?;
                }
            }
        }

        for stage in STAGE_MODELS {
            if !self.models.contains_key(stage) {
                return Err(ConfigError::MissingModel(stage.to_string()));
            }
        }

        for (model_name, model) in &self.models {
            if !self.providers.contains_key(&model.provider) {
                return Err(ConfigError::MissingProvider(
                    model.provider.clone(),
                    model_name.clone(),
                ));
            }
            if model.model.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "models.{}.model must not be empty",
                    model_name
                )));
            }
            if let Some(t) = model.temperature {
                if !(0.0..=2.0).contains(&t) {
                    return Err(ConfigError::ValidationError(format!(
                        "models.{}.temperature must be between 0.0 and 2.0, got {}",
                        model_name, t
                    )));
                }
            }
        }

        if self.search.backend == SearchBackendKind::SerpApi {
            let env = self.search.api_key_env.as_deref().ok_or_else(|| {
                ConfigError::ValidationError(
                    "search.api_key_env is required for the serpapi backend".to_string(),
                )
            })?;
            self.validate_env_var(env)?;
        }
        if self.search.num_results == 0 {
            return Err(ConfigError::ValidationError(
                "search.num_results must be at least 1".to_string(),
            ));
        }

        if self.mcp.enabled {
            validate_url(&self.mcp.url, "mcp.url")?;
        }

        let limits = &self.limits;
        if limits.dispatch_max_iterations == 0
            || limits.worker_max_iterations == 0
            || limits.max_workers == 0
            || limits.tool_timeout_secs == 0
        {
            return Err(ConfigError::ValidationError(
                "limits must all be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        self.resolve_env(name)
            .map(|_| ())
            .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok().filter(|v| !v.is_empty())
    }

    /// The SerpAPI key, when the serpapi backend is selected
    pub fn search_api_key(&self) -> Result<Option<String>, ConfigError> {
        match (&self.search.backend, &self.search.api_key_env) {
            (SearchBackendKind::SerpApi, Some(env)) => self
                .resolve_env(env)
                .map(Some)
                .ok_or_else(|| ConfigError::MissingEnvVar(env.clone())),
            (SearchBackendKind::SerpApi, None) => Err(ConfigError::ValidationError(
                "search.api_key_env is required for the serpapi backend".to_string(),
            )),
            (SearchBackendKind::DuckDuckGo, _) => Ok(None),
        }
    }

    /// Get provider by name
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Get model by name
    pub fn get_model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.get(name)
    }
}

fn validate_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{} must be an http(s) URL, got '{}'",
            field, url
        )))
    }
}
