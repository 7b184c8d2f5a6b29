pub mod chat;
pub mod generate;
pub mod scan;

pub use chat::ChatCommand;
pub use generate::GenerateCommand;
pub use scan::ScanCommand;

use clap::{ArgAction, Args, Subcommand};

#[derive(Subcommand)]
pub enum Commands {
    /// Find GGUF model blobs in local model stores
    Scan(ScanCommand),
    /// Generate a completion for a single prompt
    Generate(GenerateCommand),
    /// Interactive multi-turn chat with a model
    Chat(ChatCommand),
    /// Show host hardware and build information
    Info(InfoCommand),
}

/// Host information command
#[derive(Debug, Args)]
pub struct InfoCommand {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output flags shared by every subcommand
#[derive(Debug, Clone, Default, Args)]
pub struct LoggingConfig {
    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "EDGELLM_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Full tracing filter directive, e.g. "edgellm_core=debug"
    #[arg(long, env = "EDGELLM_LOG_FILTER", global = true)]
    pub log_filter: Option<String>,
}

impl LoggingConfig {
    /// Explicit level, else one derived from `-v`, else `configured`
    pub fn get_effective_level(&self, configured: &str) -> String {
        if let Some(level) = &self.log_level {
            return level.clone();
        }
        match self.verbose {
            0 => configured.to_string(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }
}
