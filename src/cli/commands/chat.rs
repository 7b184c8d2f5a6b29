use clap::Args;
use std::path::PathBuf;

/// Interactive chat command
#[derive(Debug, Args)]
pub struct ChatCommand {
    /// Path to a GGUF model file
    pub model: PathBuf,

    /// System instruction for the conversation
    #[arg(short, long)]
    pub system: Option<String>,

    /// Maximum tokens per reply
    #[arg(short = 'n', long)]
    pub max_tokens: Option<usize>,

    /// Exchanges kept in the prompt history
    #[arg(long)]
    pub max_turns: Option<usize>,
}
