//! Configuration management for edgellm.
//!
//! Configuration is layered from multiple sources:
//! 1. Default configuration (embedded in binary)
//! 2. System-wide configuration file (`/etc/edgellm/config.toml`)
//! 3. User-specified configuration file (`--config`)
//! 4. Environment variables (prefixed with `EDGELLM_`, sections split by `__`)
//! 5. Command-line arguments
//!
//! Later sources override earlier ones.
//!
//! # Environment Variables
//!
//! - `EDGELLM_RUNTIME__CONTEXT_LENGTH` - context window for new sessions
//! - `EDGELLM_RUNTIME__GPU_LAYERS` - layers offloaded to the GPU
//! - `EDGELLM_GENERATION__MAX_TOKENS` - default token budget
//! - `EDGELLM_DISCOVERY__MAX_SIZE_GIB` - largest blob considered by a scan

use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants;
use crate::conversation::ConversationManager;
use crate::discovery::{gib_to_bytes, DiscoveryOptions};
use crate::error::{Error, Result};
use crate::runtime::{GenerationRequest, OutputMode, SessionOptions};

const SYSTEM_CONFIG_PATH: &str = "/etc/edgellm/config.toml";
const ENV_PREFIX: &str = "EDGELLM";

/// Command-line overrides shared by every subcommand
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Context window in tokens
    #[arg(long, global = true)]
    pub context_length: Option<u32>,

    /// Layers offloaded to the GPU (0 = CPU only)
    #[arg(long, global = true)]
    pub gpu_layers: Option<u32>,

    /// Compute threads (default: half the available cores)
    #[arg(long, global = true)]
    pub threads: Option<u32>,
}

/// Full application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeConfig {
    #[serde(default)]
    pub runtime: RuntimeSettings,
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub conversation: ConversationSettings,
    #[serde(default)]
    pub discovery: DiscoverySettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Session loading settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    #[serde(default = "default_context_length")]
    pub context_length: u32,
    #[serde(default)]
    pub gpu_layers: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Compute threads; unset uses half the available cores
    #[serde(default)]
    pub threads: Option<u32>,
    /// Forward the native runtime's own log output into tracing
    #[serde(default)]
    pub native_logs: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            context_length: default_context_length(),
            gpu_layers: constants::DEFAULT_GPU_LAYERS,
            batch_size: default_batch_size(),
            threads: None,
            native_logs: false,
        }
    }
}

/// Default generation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Return the prompt in front of generated text
    #[serde(default)]
    pub include_prompt: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            include_prompt: false,
        }
    }
}

/// Conversation history settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSettings {
    /// Exchanges kept when the history is trimmed
    #[serde(default = "default_max_turns_kept")]
    pub max_turns_kept: usize,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            max_turns_kept: default_max_turns_kept(),
            system_prompt: None,
        }
    }
}

/// Model discovery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Blob directories; empty uses the platform defaults
    #[serde(default)]
    pub directories: Vec<PathBuf>,
    #[serde(default = "default_max_size_gib")]
    pub max_size_gib: f64,
    #[serde(default)]
    pub test_compatibility: bool,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            max_size_gib: default_max_size_gib(),
            test_compatibility: false,
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Full `EnvFilter` directive, overriding `level`
    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            filter: None,
        }
    }
}

impl EdgeConfig {
    /// Load configuration from all sources
    pub fn load(args: &ConfigArgs) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config::File::with_name(SYSTEM_CONFIG_PATH).required(false));

        if let Some(path) = &args.config {
            if !path.exists() {
                return Err(Error::config(format!(
                    "configuration file {} not found",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path.as_path()));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: EdgeConfig = builder.build()?.try_deserialize()?;
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    /// Command-line values win over every file and environment source
    pub fn apply_args(&mut self, args: &ConfigArgs) {
        if let Some(context_length) = args.context_length {
            self.runtime.context_length = context_length;
        }
        if let Some(gpu_layers) = args.gpu_layers {
            self.runtime.gpu_layers = gpu_layers;
        }
        if let Some(threads) = args.threads {
            self.runtime.threads = Some(threads);
        }
    }

    /// Reject values no session or request could use
    pub fn validate(&self) -> Result<()> {
        if self.runtime.context_length == 0 {
            return Err(Error::config("runtime.context_length must be positive"));
        }
        if self.runtime.batch_size == 0 {
            return Err(Error::config("runtime.batch_size must be positive"));
        }
        if self.runtime.threads == Some(0) {
            return Err(Error::config("runtime.threads must be positive when set"));
        }
        if self.conversation.max_turns_kept == 0 {
            return Err(Error::config("conversation.max_turns_kept must be positive"));
        }
        if !self.discovery.max_size_gib.is_finite() || self.discovery.max_size_gib <= 0.0 {
            return Err(Error::config("discovery.max_size_gib must be a positive number"));
        }
        self.generation_request("x")
            .validate()
            .map_err(|e| Error::config(format!("generation: {}", e)))
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            context_length: self.runtime.context_length,
            gpu_layers: self.runtime.gpu_layers,
            batch_size: self.runtime.batch_size,
            threads: self.runtime.threads,
        }
    }

    /// Request for `prompt` carrying the configured generation defaults
    pub fn generation_request<S: Into<String>>(&self, prompt: S) -> GenerationRequest {
        let output_mode = if self.generation.include_prompt {
            OutputMode::IncludePrompt
        } else {
            OutputMode::ResponseOnly
        };
        GenerationRequest::new(prompt)
            .with_max_tokens(self.generation.max_tokens)
            .with_temperature(self.generation.temperature)
            .with_top_p(self.generation.top_p)
            .with_output_mode(output_mode)
    }

    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            directories: self.discovery.directories.clone(),
            max_size_bytes: gib_to_bytes(self.discovery.max_size_gib),
            test_compatibility: self.discovery.test_compatibility,
        }
    }

    /// Empty conversation seeded with the configured system prompt
    pub fn conversation(&self) -> ConversationManager {
        let manager = ConversationManager::new(self.conversation.max_turns_kept);
        match &self.conversation.system_prompt {
            Some(prompt) if !prompt.trim().is_empty() => manager.with_system_prompt(prompt.clone()),
            _ => manager,
        }
    }
}

fn default_context_length() -> u32 {
    constants::DEFAULT_CONTEXT_LENGTH
}

fn default_batch_size() -> u32 {
    constants::DEFAULT_BATCH_SIZE
}

fn default_max_tokens() -> usize {
    constants::DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f32 {
    constants::DEFAULT_TEMPERATURE
}

fn default_top_p() -> f32 {
    constants::DEFAULT_TOP_P
}

fn default_max_turns_kept() -> usize {
    constants::DEFAULT_MAX_TURNS_KEPT
}

fn default_max_size_gib() -> f64 {
    constants::discovery::DEFAULT_MAX_SIZE_GIB
}

fn default_log_level() -> String {
    "info".to_string()
}
