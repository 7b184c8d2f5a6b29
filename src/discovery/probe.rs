//! Active compatibility probe
//!
//! A candidate that passed the header sniff is loaded for real with a small
//! CPU-only context and asked for a single token. Any error or panic from the
//! native runtime marks the file incompatible; the session is released on
//! every path because it is dropped at the end of the probe.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::constants::discovery::PROBE_CONTEXT_LENGTH;
use crate::runtime::{InferenceSession, ModelRuntime, SessionOptions};

/// Coarse reason a probe failed, derived from the runtime's message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeFailureKind {
    ArchitectureUnsupported,
    InvalidFile,
    VersionUnsupported,
    Generic,
}

impl ProbeFailureKind {
    /// Classify a failure message
    pub fn from_message(message: &str) -> Self {
        let message = message.to_ascii_lowercase();
        if message.contains("architecture") {
            ProbeFailureKind::ArchitectureUnsupported
        } else if message.contains("version") {
            ProbeFailureKind::VersionUnsupported
        } else if ["invalid", "magic", "corrupt", "truncated", "not a regular file"]
            .iter()
            .any(|needle| message.contains(needle))
        {
            ProbeFailureKind::InvalidFile
        } else {
            ProbeFailureKind::Generic
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProbeFailureKind::ArchitectureUnsupported => "architecture_unsupported",
            ProbeFailureKind::InvalidFile => "invalid_file",
            ProbeFailureKind::VersionUnsupported => "version_unsupported",
            ProbeFailureKind::Generic => "generic",
        }
    }
}

impl fmt::Display for ProbeFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of probing one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeOutcome {
    Compatible,
    Incompatible {
        kind: ProbeFailureKind,
        message: String,
    },
}

impl ProbeOutcome {
    fn failed(message: String) -> Self {
        ProbeOutcome::Incompatible {
            kind: ProbeFailureKind::from_message(&message),
            message,
        }
    }

    pub fn is_compatible(&self) -> bool {
        matches!(self, ProbeOutcome::Compatible)
    }
}

/// Load `path` with a 512-token CPU-only context and generate one token
pub fn probe_compatibility<R: ModelRuntime>(runtime: &Arc<R>, path: &Path) -> ProbeOutcome {
    let attempt = panic::catch_unwind(AssertUnwindSafe(|| -> crate::Result<()> {
        let options = SessionOptions::new(PROBE_CONTEXT_LENGTH, 0);
        let mut session = InferenceSession::load(Arc::clone(runtime), path, options)?;
        if !session.is_valid() {
            return Err(crate::Error::InvalidSession);
        }
        session.generate("Hello", 1)?;
        Ok(())
    }));

    let outcome = match attempt {
        Ok(Ok(())) => ProbeOutcome::Compatible,
        Ok(Err(e)) => ProbeOutcome::failed(e.chain_message()),
        Err(payload) => ProbeOutcome::failed(panic_message(payload.as_ref())),
    };

    match &outcome {
        ProbeOutcome::Compatible => debug!("Probe succeeded for {}", path.display()),
        ProbeOutcome::Incompatible { kind, message } => {
            warn!("Probe failed for {} ({}): {}", path.display(), kind, message)
        }
    }
    outcome
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("runtime panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("runtime panicked: {}", message)
    } else {
        "runtime panicked".to_string()
    }
}
