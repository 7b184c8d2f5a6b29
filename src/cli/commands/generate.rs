use clap::Args;
use std::path::PathBuf;

/// Single-prompt generation command
#[derive(Debug, Args)]
pub struct GenerateCommand {
    /// Path to a GGUF model file
    pub model: PathBuf,

    /// Prompt text
    pub prompt: String,

    /// Maximum tokens to generate
    #[arg(short = 'n', long)]
    pub max_tokens: Option<usize>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Nucleus sampling threshold
    #[arg(long)]
    pub top_p: Option<f32>,

    /// Print tokens as they are generated
    #[arg(long)]
    pub stream: bool,

    /// Echo the prompt in front of the generated text
    #[arg(long)]
    pub include_prompt: bool,
}
