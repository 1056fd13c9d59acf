//! Configuration management for auditrag
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.auditrag/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{PipelineError, Result};
use crate::rag::pipeline::JUDGE_NAMES;
use crate::rag::retrieval::policy::POLICY_NAMES;
use crate::rag::{ContextConfig, PipelineSettings};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Complete configuration for auditrag
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub analyzer: AnalyzerConfig,
    pub validation: ValidationConfig,
    pub ollama: OllamaConfig,
    pub logging: LoggingConfig,
}

/// Retrieval loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub n_target: usize,
    pub max_retries: u32,
    pub top_k: usize,
    pub capability_timeout_ms: u64,
    /// keep | relax_date | rewrite
    pub retry_policy: String,
    pub max_context_tokens: usize,
}

/// Query analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub fuzzy_threshold: f64,
    pub min_confidence: f64,
}

/// Relevance judge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// heuristic | model
    pub judge: String,
    pub threshold: f64,
}

/// Ollama connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub model: String,
    /// Empty keeps the local hashing embedder
    pub embed_model: String,
}

/// Log output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let settings = PipelineSettings::default();
        Self {
            n_target: settings.n_target,
            max_retries: settings.max_retries,
            top_k: settings.top_k,
            capability_timeout_ms: settings.capability_timeout.as_millis() as u64,
            retry_policy: settings.retry_policy,
            max_context_tokens: settings.context.max_context_tokens,
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.8,
            min_confidence: 0.4,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            judge: "heuristic".to_string(),
            threshold: 0.6,
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 11434,
            model: crate::capabilities::ollama::DEFAULT_MODEL.to_string(),
            embed_model: String::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(config_path) => Self::load_from_file(config_path),
            None => Self::load_default(),
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::ConfigError(format!("Failed to read config {}: {}", path.display(), e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| PipelineError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from the standard location, falling back to built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".auditrag").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !POLICY_NAMES.contains(&self.pipeline.retry_policy.as_str()) {
            return Err(PipelineError::ConfigError(format!(
                "Invalid retry policy '{}' (expected one of {})",
                self.pipeline.retry_policy,
                POLICY_NAMES.join(", ")
            )));
        }

        if self.pipeline.retry_policy == "rewrite" && !self.ollama.enabled {
            return Err(PipelineError::ConfigError(
                "retry policy 'rewrite' requires [ollama] enabled = true".to_string(),
            ));
        }

        if self.validation.judge == "model" && !self.ollama.enabled {
            return Err(PipelineError::ConfigError(
                "judge 'model' requires [ollama] enabled = true".to_string(),
            ));
        }

        if self.pipeline.max_context_tokens == 0 {
            return Err(PipelineError::ConfigError(
                "max_context_tokens must be greater than 0".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(PipelineError::ConfigError(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        self.pipeline_settings().validate()
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| PipelineError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PipelineError::ConfigError(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path, contents)
            .map_err(|e| PipelineError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| PipelineError::ConfigError(format!("Failed to serialize config: {}", e)))
    }

    /// Get Ollama base URL
    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.ollama.host, self.ollama.port)
    }

    /// Flatten the sections into pipeline settings
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            n_target: self.pipeline.n_target,
            max_retries: self.pipeline.max_retries,
            top_k: self.pipeline.top_k,
            capability_timeout: Duration::from_millis(self.pipeline.capability_timeout_ms),
            retry_policy: self.pipeline.retry_policy.clone(),
            judge: self.validation.judge.clone(),
            judge_threshold: self.validation.threshold,
            fuzzy_threshold: self.analyzer.fuzzy_threshold,
            min_confidence: self.analyzer.min_confidence,
            context: ContextConfig {
                max_context_tokens: self.pipeline.max_context_tokens,
                ..ContextConfig::default()
            },
        }
    }
}
