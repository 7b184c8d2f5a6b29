//! On-device LLM inference sessions over a pluggable native runtime.
//!
//! - [`runtime`]: session lifecycle, the generation loop and streaming
//! - [`conversation`]: multi-turn prompt rendering and history trimming
//! - [`discovery`]: locating GGUF model blobs in local model stores
//! - [`config`]: layered configuration

pub mod cli;
pub mod config;
pub mod constants;
pub mod conversation;
pub mod discovery;
pub mod error;
pub mod runtime;
pub mod system_info;

// Re-export commonly used types
pub use config::EdgeConfig;
pub use conversation::{render_prompt, ConversationManager, ConversationTurn, Role};
pub use discovery::{
    discover, discover_with, probe_compatibility, scan, Compatibility, DiscoveryOptions,
    ModelBlobCandidate, ScanReport,
};
pub use error::{Error, Result};
pub use runtime::{
    GenerationRequest, GenerationResult, InferenceSession, ModelRuntime, OutputMode,
    SessionOptions, StopReason, StreamControl, TokenEvent,
};
