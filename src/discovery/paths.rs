//! Default model-store locations
//!
//! Ollama keeps model layers as content-addressed blobs under
//! `<models>/blobs`. The models directory can be moved with `OLLAMA_MODELS`;
//! Linux service installs keep it under the `ollama` system user's home.

use std::path::PathBuf;

/// Environment variable overriding Ollama's models directory
pub const OLLAMA_MODELS_ENV: &str = "OLLAMA_MODELS";

/// Candidate blob directories for this platform, most specific first,
/// without duplicates. Directories are not checked for existence.
pub fn default_blob_dirs() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(models) = std::env::var_os(OLLAMA_MODELS_ENV).filter(|v| !v.is_empty()) {
        candidates.push(PathBuf::from(models).join("blobs"));
    }

    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".ollama").join("models").join("blobs"));
    }

    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/usr/share/ollama/.ollama/models/blobs"));
        candidates.push(PathBuf::from("/var/lib/ollama/.ollama/models/blobs"));
    }

    let mut unique = Vec::with_capacity(candidates.len());
    for dir in candidates {
        if !unique.contains(&dir) {
            unique.push(dir);
        }
    }
    unique
}
