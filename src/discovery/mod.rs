//! Discovery of model blobs in local model stores
//!
//! A scan walks blob directories (non-recursively), keeps files named like
//! content-addressed blobs, filters them by size and by the GGUF header, and
//! returns the survivors sorted by path. A scan never loads anything into the
//! runtime; `discover_with` can additionally probe each candidate with a real
//! load to upgrade its verdict.

pub mod gguf;
pub mod paths;
pub mod probe;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::constants::discovery::{
    BLOB_PREFIXES, BYTES_PER_GIB, DEFAULT_MAX_SIZE_GIB, DIGEST_HEX_LEN, MIN_BLOB_SIZE_BYTES,
};
use crate::runtime::ModelRuntime;

pub use gguf::{classify_header, read_header, HeaderCheck};
pub use paths::default_blob_dirs;
pub use probe::{probe_compatibility, ProbeFailureKind, ProbeOutcome};

/// Verdict on whether the runtime can actually use a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compatibility {
    #[default]
    Untested,
    Compatible,
    Incompatible,
}

/// A blob that passed the name, size and header checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBlobCandidate {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// GGUF version from the header; `None` when unknown
    pub format_version: Option<u32>,
    /// Lowercase SHA-256 hex digest taken from the blob name
    pub content_hash: String,
    pub compatibility: Compatibility,
    /// Failure label for incompatible candidates
    pub diagnostic: Option<ProbeFailureKind>,
    pub modified: Option<DateTime<Utc>>,
}

impl ModelBlobCandidate {
    pub fn size_gib(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_GIB
    }

    /// Candidate carrying the verdict of a probe
    pub fn with_probe_outcome(self, outcome: &ProbeOutcome) -> Self {
        let (compatibility, diagnostic) = match outcome {
            ProbeOutcome::Compatible => (Compatibility::Compatible, None),
            ProbeOutcome::Incompatible { kind, .. } => (Compatibility::Incompatible, Some(*kind)),
        };
        Self {
            compatibility,
            diagnostic,
            ..self
        }
    }
}

/// Discovery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryOptions {
    /// Directories to scan; empty means the platform defaults
    pub directories: Vec<PathBuf>,
    pub max_size_bytes: u64,
    /// Load every candidate to verify it
    pub test_compatibility: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            max_size_bytes: gib_to_bytes(DEFAULT_MAX_SIZE_GIB),
            test_compatibility: false,
        }
    }
}

impl DiscoveryOptions {
    /// Explicit directories, or the platform defaults when none are set
    pub fn resolved_directories(&self) -> Vec<PathBuf> {
        if self.directories.is_empty() {
            default_blob_dirs()
        } else {
            self.directories.clone()
        }
    }
}

/// Convert a size limit in GiB to bytes, clamping negatives to zero
pub fn gib_to_bytes(gib: f64) -> u64 {
    if gib.is_finite() && gib > 0.0 {
        (gib * BYTES_PER_GIB) as u64
    } else {
        0
    }
}

/// Counters describing one scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub directories_scanned: usize,
    pub files_examined: usize,
    pub rejected_name: usize,
    pub rejected_size: usize,
    pub rejected_signature: usize,
    pub rejected_version: usize,
    pub accepted: usize,
    pub compatible: usize,
    pub incompatible: usize,
}

/// Candidates plus scan statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub candidates: Vec<ModelBlobCandidate>,
    pub summary: ScanSummary,
    pub scanned_at: DateTime<Utc>,
}

/// Digest embedded in a blob file name, lowercased.
///
/// Accepts `sha256-<64 hex>` and the legacy `sha256:<64 hex>`.
pub fn blob_digest(file_name: &str) -> Option<String> {
    let digest = BLOB_PREFIXES
        .iter()
        .find_map(|prefix| file_name.strip_prefix(prefix))?;
    if digest.len() != DIGEST_HEX_LEN {
        return None;
    }
    hex::decode(digest).ok()?;
    Some(digest.to_ascii_lowercase())
}

/// Scan `directories` for GGUF blobs between 1 MiB and `max_size_bytes`
pub fn scan<P: AsRef<Path>>(directories: &[P], max_size_bytes: u64) -> Vec<ModelBlobCandidate> {
    scan_with_summary(directories, max_size_bytes).0
}

fn scan_with_summary<P: AsRef<Path>>(
    directories: &[P],
    max_size_bytes: u64,
) -> (Vec<ModelBlobCandidate>, ScanSummary) {
    let mut summary = ScanSummary::default();
    let mut candidates = Vec::new();

    for dir in directories {
        let dir = dir.as_ref();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Skipping {}: {}", dir.display(), e);
                continue;
            }
        };
        summary.directories_scanned += 1;

        for entry in entries.flatten() {
            let path = entry.path();
            let metadata = match fs::metadata(&path) {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };
            summary.files_examined += 1;

            let Some(content_hash) = entry.file_name().to_str().and_then(blob_digest) else {
                summary.rejected_name += 1;
                continue;
            };

            let size_bytes = metadata.len();
            if size_bytes < MIN_BLOB_SIZE_BYTES || size_bytes > max_size_bytes {
                debug!("Rejected {} by size ({} bytes)", path.display(), size_bytes);
                summary.rejected_size += 1;
                continue;
            }

            let version = match read_header(&path) {
                Ok(HeaderCheck::Supported { version }) => version,
                Ok(HeaderCheck::TooNew { version }) => {
                    warn!(
                        "Skipping {}: GGUF version {} is newer than supported",
                        path.display(),
                        version
                    );
                    summary.rejected_version += 1;
                    continue;
                }
                Ok(HeaderCheck::Unsupported { version }) => {
                    debug!("Rejected {}: GGUF version {}", path.display(), version);
                    summary.rejected_version += 1;
                    continue;
                }
                Ok(HeaderCheck::NotGguf) => {
                    debug!("Rejected {}: not a GGUF file", path.display());
                    summary.rejected_signature += 1;
                    continue;
                }
                Err(e) => {
                    debug!("Rejected {}: {}", path.display(), e);
                    summary.rejected_signature += 1;
                    continue;
                }
            };

            candidates.push(ModelBlobCandidate {
                path,
                size_bytes,
                format_version: Some(version),
                content_hash,
                compatibility: Compatibility::Untested,
                diagnostic: None,
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }
    }

    candidates.sort_by(|a, b| a.path.cmp(&b.path));
    summary.accepted = candidates.len();
    (candidates, summary)
}

/// Scan without probing
pub fn discover(options: &DiscoveryOptions) -> ScanReport {
    let scanned_at = Utc::now();
    let directories = options.resolved_directories();
    let (candidates, summary) = scan_with_summary(&directories, options.max_size_bytes);
    log_summary(&summary);
    ScanReport {
        candidates,
        summary,
        scanned_at,
    }
}

/// Scan, then probe every candidate with `runtime` when
/// `options.test_compatibility` is set
pub fn discover_with<R: ModelRuntime>(runtime: &Arc<R>, options: &DiscoveryOptions) -> ScanReport {
    let scanned_at = Utc::now();
    let directories = options.resolved_directories();
    let (mut candidates, mut summary) = scan_with_summary(&directories, options.max_size_bytes);

    if options.test_compatibility {
        candidates = candidates
            .into_iter()
            .map(|candidate| {
                let outcome = probe_compatibility(runtime, &candidate.path);
                candidate.with_probe_outcome(&outcome)
            })
            .collect();
        summary.compatible = candidates
            .iter()
            .filter(|c| c.compatibility == Compatibility::Compatible)
            .count();
        summary.incompatible = candidates
            .iter()
            .filter(|c| c.compatibility == Compatibility::Incompatible)
            .count();
    }

    log_summary(&summary);
    ScanReport {
        candidates,
        summary,
        scanned_at,
    }
}

fn log_summary(summary: &ScanSummary) {
    info!(
        "Scanned {} directories: {} files, {} candidates ({} compatible, {} incompatible)",
        summary.directories_scanned,
        summary.files_examined,
        summary.accepted,
        summary.compatible,
        summary.incompatible
    );
}
