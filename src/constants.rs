//! Shared defaults and format constants.

/// Default context window for new sessions
pub const DEFAULT_CONTEXT_LENGTH: u32 = 2048;

/// Default number of layers offloaded to the GPU (CPU-only)
pub const DEFAULT_GPU_LAYERS: u32 = 0;

/// Tokens submitted per native decode call
pub const DEFAULT_BATCH_SIZE: u32 = 512;

pub const DEFAULT_MAX_TOKENS: usize = 128;
pub const DEFAULT_TEMPERATURE: f32 = 0.8;
pub const DEFAULT_TOP_P: f32 = 0.95;

/// Conversation exchanges kept when trimming (each exchange is two turns)
pub const DEFAULT_MAX_TURNS_KEPT: usize = 10;

/// Model discovery
pub mod discovery {
    /// GGUF file signature
    pub const GGUF_MAGIC: [u8; 4] = *b"GGUF";

    /// Bytes read from the start of a candidate file
    pub const HEADER_LEN: usize = 8;

    /// Oldest and newest GGUF versions accepted by the scan
    pub const MIN_GGUF_VERSION: u32 = 1;
    pub const MAX_GGUF_VERSION: u32 = 3;

    /// Files below this size cannot be a real model
    pub const MIN_BLOB_SIZE_BYTES: u64 = 1024 * 1024;

    pub const DEFAULT_MAX_SIZE_GIB: f64 = 10.0;

    pub const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

    /// Context window used by the compatibility probe
    pub const PROBE_CONTEXT_LENGTH: u32 = 512;

    /// Blob file name prefixes used by the Ollama model store
    pub const BLOB_PREFIXES: [&str; 2] = ["sha256-", "sha256:"];

    /// Hex characters in a SHA-256 digest
    pub const DIGEST_HEX_LEN: usize = 64;
}
