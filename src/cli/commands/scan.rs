use clap::Args;
use std::path::PathBuf;

/// Blob discovery command
#[derive(Debug, Args)]
pub struct ScanCommand {
    /// Directories to scan (default: Ollama blob directories for this platform)
    pub dirs: Vec<PathBuf>,

    /// Largest blob considered, in GiB
    #[arg(long, value_name = "GIB")]
    pub max_size_gib: Option<f64>,

    /// Load every candidate to verify the runtime can use it
    #[arg(long)]
    pub test_compat: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}
