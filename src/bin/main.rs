//! edgellm binary.
//!
//! Entry point for discovering local GGUF models and running on-device
//! generation and chat against them.

use anyhow::Result;
use clap::Parser;
use edgellm_core::{
    cli::commands::{Commands, LoggingConfig},
    cli::handlers,
    config::{ConfigArgs, EdgeConfig},
};
use std::io;
use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::{fmt::time::ChronoLocal, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub logging: LoggingConfig,

    #[command(subcommand)]
    pub command: Commands,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = EdgeConfig::load(&cli.config)?;

    init_logging(&cli.logging, &config);
    debug!("Effective configuration: {:?}", config);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Scan(cmd) => run_scan(&config, &cmd, &mut out),
        Commands::Generate(cmd) => run_generate(&config, &cmd, &mut out),
        Commands::Chat(cmd) => run_chat(&config, &cmd, &mut out),
        Commands::Info(cmd) => handlers::handle_info(cmd.json, &mut out),
    }
}

fn init_logging(logging: &LoggingConfig, config: &EdgeConfig) {
    let level = logging.get_effective_level(&config.logging.level);
    let filter = logging
        .log_filter
        .as_deref()
        .or(config.logging.filter.as_deref())
        .unwrap_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.parse().unwrap_or(LevelFilter::INFO).into())
                .parse_lossy(filter),
        )
        .with_timer(ChronoLocal::rfc_3339())
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

#[cfg(feature = "llamacpp")]
mod with_runtime {
    use super::*;
    use edgellm_core::{
        cli::commands::{ChatCommand, GenerateCommand, ScanCommand},
        runtime::LlamaCppRuntime,
    };
    use std::sync::Arc;

    fn runtime(config: &EdgeConfig) -> Arc<LlamaCppRuntime> {
        Arc::new(LlamaCppRuntime::new().with_native_logs(config.runtime.native_logs))
    }

    pub fn run_scan<W: io::Write>(config: &EdgeConfig, cmd: &ScanCommand, out: &mut W) -> Result<()> {
        handlers::handle_scan_with(&runtime(config), config, cmd, out)
    }

    pub fn run_generate<W: io::Write>(
        config: &EdgeConfig,
        cmd: &GenerateCommand,
        out: &mut W,
    ) -> Result<()> {
        handlers::handle_generate(runtime(config), config, cmd, out)
    }

    pub fn run_chat<W: io::Write>(config: &EdgeConfig, cmd: &ChatCommand, out: &mut W) -> Result<()> {
        let stdin = io::stdin();
        handlers::handle_chat(runtime(config), config, cmd, stdin.lock(), out)
    }
}

#[cfg(not(feature = "llamacpp"))]
mod with_runtime {
    use super::*;
    use anyhow::bail;
    use edgellm_core::cli::commands::{ChatCommand, GenerateCommand, ScanCommand};

    const NO_RUNTIME: &str = "this build has no inference runtime; rebuild with --features llamacpp";

    pub fn run_scan<W: io::Write>(config: &EdgeConfig, cmd: &ScanCommand, out: &mut W) -> Result<()> {
        handlers::handle_scan(config, cmd, out)
    }

    pub fn run_generate<W: io::Write>(_: &EdgeConfig, _: &GenerateCommand, _: &mut W) -> Result<()> {
        bail!(NO_RUNTIME)
    }

    pub fn run_chat<W: io::Write>(_: &EdgeConfig, _: &ChatCommand, _: &mut W) -> Result<()> {
        bail!(NO_RUNTIME)
    }
}

use with_runtime::{run_chat, run_generate, run_scan};
