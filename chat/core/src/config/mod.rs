//! TOML Configuration File Support
//!
//! Centralized configuration loading for streamchat, supporting a TOML
//! configuration file at `~/.config/streamchat/config.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (when applicable)
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! The configuration file follows XDG Base Directory specification:
//! - `$XDG_CONFIG_HOME/streamchat/config.toml` (typically `~/.config/streamchat/config.toml`)
//!
//! # Example Configuration
//!
//! ```toml
//! [backend]
//! kind = "ollama"
//! ollama_host = "http://localhost:11434"
//! openai_base_url = "https://api.openai.com"
//! request_timeout_secs = 120
//! connect_timeout_secs = 5
//!
//! [model]
//! default = "deepseek-r1:7b"
//!
//! [thinking]
//! start_replacement = "🤔 [Thinking...] "
//! end_replacement = " [...done thinking] 💡 "
//!
//! [thinking.models]
//! "magistral" = ["[THINK]", "[/THINK]"]
//!
//! [sessions]
//! dir = "sessions_history"
//! max_display = 10
//! ```
//!
//! # Environment Variables
//!
//! | Variable                 | Setting                          |
//! |--------------------------|----------------------------------|
//! | `LLM_BACKEND`            | `ollama` or `openai`             |
//! | `OLLAMA_HOST_URL`        | Ollama server URL                |
//! | `OLLAMA_MODEL`           | model used with Ollama           |
//! | `OPENAI_API_KEY`         | API key for the OpenAI backend   |
//! | `OPENAI_BASE_URL`        | OpenAI-compatible server URL     |
//! | `OPENAI_MODEL`           | model used with OpenAI           |
//! | `STREAMCHAT_SESSION_DIR` | session history directory        |

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{DEFAULT_OLLAMA_URL, DEFAULT_OPENAI_URL};
use crate::model::BackendKind;
use crate::session::{DEFAULT_LIST_LIMIT, DEFAULT_SESSION_DIR};
use crate::thinking::{
    ThinkingMarkerRegistry, ThinkingMarkerSpec, DEFAULT_END_REPLACEMENT,
    DEFAULT_START_REPLACEMENT,
};

/// Model used with Ollama when none is configured
pub const DEFAULT_OLLAMA_MODEL: &str = "gemma3:1b";

/// Model used with OpenAI when none is configured
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// `ollama` or `openai`
    pub kind: Option<String>,

    /// Ollama server URL
    pub ollama_host: Option<String>,

    /// OpenAI-compatible API base URL
    pub openai_base_url: Option<String>,

    /// API key for the OpenAI backend
    pub openai_api_key: Option<String>,

    /// Timeout for model listing and health checks, in seconds
    pub request_timeout_secs: Option<u64>,

    /// Connection timeout in seconds
    pub connect_timeout_secs: Option<u64>,
}

/// Model section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelToml {
    /// Model for whichever backend the file selects
    pub default: Option<String>,

    /// Model used with Ollama
    pub ollama: Option<String>,

    /// Model used with OpenAI
    pub openai: Option<String>,
}

/// Thinking section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThinkingToml {
    /// Text shown where a thinking region opens
    pub start_replacement: Option<String>,

    /// Text shown where a thinking region closes
    pub end_replacement: Option<String>,

    /// Extra models: base name to `[start, end]` delimiters
    pub models: BTreeMap<String, [String; 2]>,
}

/// Sessions section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsToml {
    /// Directory for session files
    pub dir: Option<PathBuf>,

    /// How many sessions to list
    pub max_display: Option<usize>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// Backend configuration section
    pub backend: BackendToml,

    /// Model configuration section
    pub model: ModelToml,

    /// Thinking marker configuration section
    pub thinking: ThinkingToml,

    /// Session history configuration section
    pub sessions: SessionsToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Centralized configuration for streamchat
///
/// This struct consolidates all configuration from multiple sources and tracks
/// where each value came from. Use [`load_config`] to load configuration with
/// proper priority handling.
#[derive(Clone)]
pub struct ChatConfig {
    /// Which backend turns are sent to
    pub backend: BackendKind,

    /// Ollama server URL
    pub ollama_host: String,

    /// OpenAI-compatible API base URL
    pub openai_base_url: String,

    /// API key for the OpenAI backend
    pub openai_api_key: Option<String>,

    /// Preferred model when using Ollama
    pub ollama_model: String,

    /// Preferred model when using OpenAI
    pub openai_model: String,

    /// Model chosen on the command line, for either backend
    pub model_override: Option<String>,

    /// Timeout for model listing and health checks
    pub request_timeout: Duration,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Text shown where a thinking region opens
    pub thinking_start_replacement: String,

    /// Text shown where a thinking region closes
    pub thinking_end_replacement: String,

    /// Extra thinking delimiters by model base name
    pub thinking_models: BTreeMap<String, (String, String)>,

    /// Directory for session files
    pub session_dir: PathBuf,

    /// How many sessions to list
    pub max_sessions_display: usize,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Ollama,
            ollama_host: DEFAULT_OLLAMA_URL.to_string(),
            openai_base_url: DEFAULT_OPENAI_URL.to_string(),
            openai_api_key: None,
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            model_override: None,
            request_timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(5),
            thinking_start_replacement: DEFAULT_START_REPLACEMENT.to_string(),
            thinking_end_replacement: DEFAULT_END_REPLACEMENT.to_string(),
            thinking_models: BTreeMap::new(),
            session_dir: PathBuf::from(DEFAULT_SESSION_DIR),
            max_sessions_display: DEFAULT_LIST_LIMIT,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("backend", &self.backend)
            .field("ollama_host", &self.ollama_host)
            .field("openai_base_url", &self.openai_base_url)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("preferred_model", &self.preferred_model())
            .field("session_dir", &self.session_dir)
            .field("config_file_path", &self.config_file_path)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl ChatConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Model to start with on the selected backend
    #[must_use]
    pub fn preferred_model(&self) -> &str {
        if let Some(ref model) = self.model_override {
            return model;
        }
        match self.backend {
            BackendKind::Ollama => &self.ollama_model,
            BackendKind::OpenAi => &self.openai_model,
        }
    }

    /// Built-in thinking delimiters with configured additions and replacements
    #[must_use]
    pub fn thinking_registry(&self) -> ThinkingMarkerRegistry {
        let start = &self.thinking_start_replacement;
        let end = &self.thinking_end_replacement;
        ThinkingMarkerRegistry::builtin_with_replacements(start, end).merged(
            self.thinking_models
                .iter()
                .map(|(name, (open, close))| {
                    (
                        name.clone(),
                        ThinkingMarkerSpec::new(open, close).with_replacements(start, end),
                    )
                }),
        )
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/streamchat/config.toml` or
/// `~/.config/streamchat/config.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("streamchat").join("config.toml"))
}

/// Load configuration from all sources with proper priority
///
/// Priority order (highest first):
/// 1. CLI arguments (not handled here - caller should apply after)
/// 2. Environment variables
/// 3. TOML configuration file
/// 4. Default values
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if a
/// value is invalid. A missing config file is not an error.
pub fn load_config() -> Result<ChatConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ChatConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration reading environment variables through `lookup`
///
/// # Errors
///
/// See [`load_config_from_path`].
pub fn load_config_with_env<F>(path: Option<PathBuf>, lookup: F) -> Result<ChatConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = ChatConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ChatToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config)?;
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, lookup)?;

    Ok(config)
}

fn parse_backend(value: &str) -> Result<BackendKind, ConfigError> {
    value.parse().map_err(ConfigError::ValidationError)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ChatConfig, toml: &ChatToml) -> Result<(), ConfigError> {
    // Backend settings
    if let Some(ref kind) = toml.backend.kind {
        config.backend = parse_backend(kind)?;
    }
    if let Some(ref host) = toml.backend.ollama_host {
        config.ollama_host.clone_from(host);
    }
    if let Some(ref url) = toml.backend.openai_base_url {
        config.openai_base_url.clone_from(url);
    }
    if toml.backend.openai_api_key.is_some() {
        config.openai_api_key.clone_from(&toml.backend.openai_api_key);
    }
    if let Some(secs) = toml.backend.request_timeout_secs {
        config.request_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = toml.backend.connect_timeout_secs {
        config.connect_timeout = Duration::from_secs(secs);
    }

    // Model settings
    if let Some(ref model) = toml.model.default {
        match config.backend {
            BackendKind::Ollama => config.ollama_model.clone_from(model),
            BackendKind::OpenAi => config.openai_model.clone_from(model),
        }
    }
    if let Some(ref model) = toml.model.ollama {
        config.ollama_model.clone_from(model);
    }
    if let Some(ref model) = toml.model.openai {
        config.openai_model.clone_from(model);
    }

    // Thinking settings
    if let Some(ref text) = toml.thinking.start_replacement {
        config.thinking_start_replacement.clone_from(text);
    }
    if let Some(ref text) = toml.thinking.end_replacement {
        config.thinking_end_replacement.clone_from(text);
    }
    for (name, [open, close]) in &toml.thinking.models {
        if open.is_empty() || close.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "thinking delimiters for `{name}` must not be empty"
            )));
        }
        config
            .thinking_models
            .insert(name.clone(), (open.clone(), close.clone()));
    }

    // Session settings
    if let Some(ref dir) = toml.sessions.dir {
        config.session_dir.clone_from(dir);
    }
    if let Some(limit) = toml.sessions.max_display {
        config.max_sessions_display = limit;
    }

    Ok(())
}

/// Apply environment variable overrides to the config
fn apply_env_config<F>(config: &mut ChatConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(kind) = var("LLM_BACKEND") {
        config.backend = parse_backend(&kind)?;
        config.source = ConfigSource::Env;
    }
    if let Some(host) = var("OLLAMA_HOST_URL") {
        config.ollama_host = host;
        config.source = ConfigSource::Env;
    }
    if let Some(model) = var("OLLAMA_MODEL") {
        config.ollama_model = model;
        config.source = ConfigSource::Env;
    }
    if let Some(key) = var("OPENAI_API_KEY") {
        config.openai_api_key = Some(key);
        config.source = ConfigSource::Env;
    }
    if let Some(url) = var("OPENAI_BASE_URL") {
        config.openai_base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(model) = var("OPENAI_MODEL") {
        config.openai_model = model;
        config.source = ConfigSource::Env;
    }
    if let Some(dir) = var("STREAMCHAT_SESSION_DIR") {
        config.session_dir = PathBuf::from(dir);
        config.source = ConfigSource::Env;
    }

    Ok(())
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Backend override
    pub backend: Option<BackendKind>,

    /// Model override
    pub model: Option<String>,

    /// Server URL override for the selected backend
    pub host: Option<String>,

    /// Session directory override
    pub session_dir: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set backend override
    #[must_use]
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set model override
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    /// Set server URL override
    #[must_use]
    pub fn with_host(mut self, host: String) -> Self {
        self.host = Some(host);
        self
    }

    /// Set session directory override
    #[must_use]
    pub fn with_session_dir(mut self, dir: PathBuf) -> Self {
        self.session_dir = Some(dir);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ChatConfig) {
        if self.backend.is_some()
            || self.model.is_some()
            || self.host.is_some()
            || self.session_dir.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(backend) = self.backend {
            config.backend = backend;
        }

        if let Some(ref model) = self.model {
            config.model_override = Some(model.clone());
        }

        // Applied after the backend so the URL lands on the one in use
        if let Some(ref host) = self.host {
            match config.backend {
                BackendKind::Ollama => config.ollama_host.clone_from(host),
                BackendKind::OpenAi => config.openai_base_url.clone_from(host),
            }
        }

        if let Some(ref dir) = self.session_dir {
            config.session_dir.clone_from(dir);
        }
    }
}
