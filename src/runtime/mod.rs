//! Runtime abstraction layer for on-device inference
//!
//! This module provides the session engine on top of a pluggable model runtime:
//! - `ModelRuntime`: adapter over the native library that owns weights and contexts
//! - `InferenceSession`: exclusive owner of one model/context pair
//! - `GenerationCore`: the token loop shared by blocking and streaming generation
//! - `LlamaCppRuntime`: llama.cpp adapter (feature `llamacpp`)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants;

pub mod backend; // Process-wide backend initialisation registry
pub mod generation_core; // Unified generation loop
#[cfg(feature = "llamacpp")]
pub mod llamacpp_engine; // llama.cpp adapter via llama-cpp-2
pub mod sampling; // Token selection policies
pub mod session; // Session lifecycle and generation entry points
pub mod streaming; // Per-token callbacks and cancellation
pub mod utf8_decoder; // Byte pieces to UTF-8 fragments

pub use generation_core::GenerationCore;
#[cfg(feature = "llamacpp")]
pub use llamacpp_engine::LlamaCppRuntime;
pub use sampling::{GreedySampler, SamplingParams, SamplingPolicy};
pub use session::{InferenceSession, SessionInfo, SessionOptions};
pub use streaming::{CollectingCallback, StreamControl, StreamingCallback, TokenEvent};

/// Vocabulary index as used by the native runtime
pub type Token = i32;

/// Adapter over a native inference library.
///
/// The adapter itself is a stateless function table; all native state lives in
/// the `Model` and `Context` handles it produces. Handles are owned by exactly
/// one `InferenceSession`, which releases the context before the model.
pub trait ModelRuntime {
    /// Native model weights
    type Model;
    /// Native execution context bound to a model
    type Context;

    /// Short identifier used for logging and the backend registry
    fn name(&self) -> &str;

    /// Initialise the process-wide native backend.
    ///
    /// Called through `backend::ensure_initialized`, which guarantees at most
    /// one successful call per runtime name per process.
    fn init_backend(&self) -> anyhow::Result<()>;

    /// Tear down the process-wide native backend. Rarely needed.
    fn shutdown_backend(&self) {}

    /// Load model weights, offloading `gpu_layers` layers to the GPU
    fn load_model(&self, path: &Path, gpu_layers: u32) -> anyhow::Result<Self::Model>;

    /// Create an execution context for `model`
    fn create_context(
        &self,
        model: &Self::Model,
        params: &ContextParams,
    ) -> anyhow::Result<Self::Context>;

    /// Number of entries in the model vocabulary
    fn vocab_size(&self, model: &Self::Model) -> usize;

    /// Tokenize text, adding the model's start-of-sequence token
    fn tokenize(&self, model: &Self::Model, text: &str) -> anyhow::Result<Vec<Token>>;

    /// Drop everything decoded so far so the next decode starts at position 0
    fn reset_context(&self, context: &mut Self::Context);

    /// Append `tokens` to the context and compute logits for the last one
    fn decode(&self, context: &mut Self::Context, tokens: &[Token]) -> anyhow::Result<()>;

    /// Logits for the most recently decoded position
    fn logits<'c>(&self, context: &'c Self::Context) -> anyhow::Result<&'c [f32]>;

    /// Raw bytes of a token's text piece (may be a partial UTF-8 sequence)
    fn token_to_piece(&self, model: &Self::Model, token: Token) -> anyhow::Result<Vec<u8>>;

    /// Whether `token` marks the natural end of generation
    fn is_end_of_generation(&self, model: &Self::Model, token: Token) -> bool;

    /// Release a context. Must be called before releasing its model.
    fn release_context(&self, context: Self::Context) {
        drop(context);
    }

    /// Release model weights
    fn release_model(&self, model: Self::Model) {
        drop(model);
    }
}

/// Parameters for context creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextParams {
    /// Context window in tokens
    pub context_length: u32,
    /// Maximum tokens submitted per native decode call
    pub batch_size: u32,
    /// Compute threads for the native runtime
    pub threads: u32,
}

/// Whether generated text carries the prompt in front of the continuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Only the generated continuation
    #[default]
    ResponseOnly,
    /// Prompt text followed by the continuation
    IncludePrompt,
}

/// Generation request parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    #[serde(default)]
    pub output_mode: OutputMode,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            max_tokens: constants::DEFAULT_MAX_TOKENS,
            temperature: constants::DEFAULT_TEMPERATURE,
            top_p: constants::DEFAULT_TOP_P,
            output_mode: OutputMode::default(),
        }
    }
}

impl GenerationRequest {
    /// Request with default parameters for `prompt`
    pub fn new<S: Into<String>>(prompt: S) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn with_output_mode(mut self, output_mode: OutputMode) -> Self {
        self.output_mode = output_mode;
        self
    }

    /// Reject empty prompts and out-of-range sampling parameters
    pub fn validate(&self) -> crate::Result<()> {
        if self.prompt.is_empty() {
            return Err(crate::Error::invalid_argument("prompt must not be empty"));
        }
        if self.max_tokens == 0 {
            return Err(crate::Error::invalid_argument("max_tokens must be positive"));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(crate::Error::invalid_argument(format!(
                "temperature must be a finite value >= 0, got {}",
                self.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(crate::Error::invalid_argument(format!(
                "top_p must be within [0, 1], got {}",
                self.top_p
            )));
        }
        Ok(())
    }
}

/// Reason why generation finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The token budget was exhausted
    MaxTokens,
    /// The runtime produced an end-of-generation token
    EndOfGeneration,
    /// A decode or logits call failed mid-generation; text is partial
    DecodeFailure,
    /// The streaming callback asked to stop
    Cancelled,
}

/// Generation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Generated text, prefixed by the prompt in `IncludePrompt` mode
    pub text: String,
    pub tokens_generated: usize,
    pub prompt_tokens: usize,
    pub stop_reason: StopReason,
    pub generation_time_ms: u64,
    pub tokens_per_second: f32,
    /// Byte length of the prompt prefix inside `text`
    #[serde(default)]
    pub prompt_prefix_len: usize,
}

impl GenerationResult {
    /// The generated continuation without any prompt prefix.
    ///
    /// Empty when `prompt_prefix_len` does not fall on a character boundary
    /// inside `text`.
    pub fn response(&self) -> &str {
        self.text.get(self.prompt_prefix_len..).unwrap_or_default()
    }
}
