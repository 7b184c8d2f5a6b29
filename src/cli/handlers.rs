use anyhow::{bail, Context, Result};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    cli::commands::{ChatCommand, GenerateCommand, ScanCommand},
    config::EdgeConfig,
    discovery::{self, gib_to_bytes, Compatibility, DiscoveryOptions, ScanReport},
    runtime::{
        GenerationRequest, InferenceSession, ModelRuntime, OutputMode, StreamControl, TokenEvent,
    },
    system_info,
};

/// Discovery options from configuration with command-line overrides applied
pub fn scan_options(config: &EdgeConfig, cmd: &ScanCommand) -> DiscoveryOptions {
    let mut options = config.discovery_options();
    if !cmd.dirs.is_empty() {
        options.directories = cmd.dirs.clone();
    }
    if let Some(gib) = cmd.max_size_gib {
        options.max_size_bytes = gib_to_bytes(gib);
    }
    options.test_compatibility |= cmd.test_compat;
    options
}

/// Scan without a runtime; compatibility testing is refused
pub fn handle_scan<W: Write>(config: &EdgeConfig, cmd: &ScanCommand, out: &mut W) -> Result<()> {
    let options = scan_options(config, cmd);
    if options.test_compatibility {
        bail!("compatibility testing needs an inference runtime; rebuild with --features llamacpp");
    }
    let report = discovery::discover(&options);
    write_report(&report, cmd.json, out)
}

/// Scan and optionally probe every candidate with `runtime`
pub fn handle_scan_with<R: ModelRuntime, W: Write>(
    runtime: &Arc<R>,
    config: &EdgeConfig,
    cmd: &ScanCommand,
    out: &mut W,
) -> Result<()> {
    let options = scan_options(config, cmd);
    let report = discovery::discover_with(runtime, &options);
    write_report(&report, cmd.json, out)
}

pub fn write_report<W: Write>(report: &ScanReport, json: bool, out: &mut W) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, report).context("Failed to serialize report")?;
        writeln!(out)?;
        return Ok(());
    }

    if report.candidates.is_empty() {
        writeln!(out, "No GGUF model blobs found")?;
    }
    for candidate in &report.candidates {
        let version = candidate
            .format_version
            .map(|v| format!("v{}", v))
            .unwrap_or_else(|| "v?".to_string());
        let verdict = match (candidate.compatibility, candidate.diagnostic) {
            (Compatibility::Untested, _) => "untested".to_string(),
            (Compatibility::Compatible, _) => "compatible".to_string(),
            (Compatibility::Incompatible, Some(kind)) => format!("incompatible ({})", kind),
            (Compatibility::Incompatible, None) => "incompatible".to_string(),
        };
        writeln!(
            out,
            "{}  {:>7.2} GiB  {:<3}  {:<12}  {}",
            &candidate.content_hash[..12.min(candidate.content_hash.len())],
            candidate.size_gib(),
            version,
            verdict,
            candidate.path.display()
        )?;
    }

    let summary = &report.summary;
    writeln!(
        out,
        "{} candidate(s) from {} file(s) in {} director(ies)",
        summary.accepted, summary.files_examined, summary.directories_scanned
    )?;
    Ok(())
}

/// Request from configuration defaults with command-line overrides applied
pub fn generation_request(config: &EdgeConfig, cmd: &GenerateCommand) -> GenerationRequest {
    let mut request = config.generation_request(cmd.prompt.clone());
    if let Some(max_tokens) = cmd.max_tokens {
        request.max_tokens = max_tokens;
    }
    if let Some(temperature) = cmd.temperature {
        request.temperature = temperature;
    }
    if let Some(top_p) = cmd.top_p {
        request.top_p = top_p;
    }
    if cmd.include_prompt {
        request.output_mode = OutputMode::IncludePrompt;
    }
    request
}

pub fn handle_generate<R: ModelRuntime, W: Write>(
    runtime: Arc<R>,
    config: &EdgeConfig,
    cmd: &GenerateCommand,
    out: &mut W,
) -> Result<()> {
    let mut session = InferenceSession::load(runtime, &cmd.model, config.session_options())?;
    let request = generation_request(config, cmd);

    let result = if cmd.stream {
        let written = match request.output_mode {
            OutputMode::IncludePrompt => {
                write!(out, "{}", request.prompt)?;
                request.prompt.len()
            }
            OutputMode::ResponseOnly => 0,
        };
        let mut stream = ConsoleStream::new(&mut *out, written);
        let result = session.generate_streaming(&request, &mut |event: &TokenEvent<'_>| {
            stream.write_pending(event)
        });
        stream.finish()?;
        let result = result?;
        writeln!(out)?;
        result
    } else {
        let result = session.generate_with_params(&request)?;
        writeln!(out, "{}", result.text)?;
        result
    };

    info!(
        "Generated {} tokens in {} ms ({:.1} tok/s), stop reason {:?}",
        result.tokens_generated,
        result.generation_time_ms,
        result.tokens_per_second,
        result.stop_reason
    );
    Ok(())
}

/// Read user lines from `input` until EOF or `/exit`, answering each one.
///
/// `/reset` clears the history except the system prompt.
pub fn handle_chat<R: ModelRuntime, I: BufRead, W: Write>(
    runtime: Arc<R>,
    config: &EdgeConfig,
    cmd: &ChatCommand,
    input: I,
    out: &mut W,
) -> Result<()> {
    let mut settings = config.clone();
    if let Some(max_turns) = cmd.max_turns {
        settings.conversation.max_turns_kept = max_turns;
    }
    if let Some(system) = &cmd.system {
        settings.conversation.system_prompt = Some(system.clone());
    }
    settings.validate()?;

    let mut session = InferenceSession::load(runtime, &cmd.model, config.session_options())?;
    let mut conversation = settings.conversation();

    let mut request = config.generation_request(String::new());
    if let Some(max_tokens) = cmd.max_tokens {
        request.max_tokens = max_tokens;
    }

    writeln!(out, "Chatting with {} (/reset clears history, /exit quits)", cmd.model.display())?;
    write!(out, "> ")?;
    out.flush()?;

    for line in input.lines() {
        let line = line.context("Failed to read input")?;
        let message = line.trim();

        match message {
            "" => {}
            "/exit" | "/quit" => break,
            "/reset" => {
                conversation.reset();
                writeln!(out, "History cleared")?;
            }
            _ => {
                let mut stream = ConsoleStream::new(&mut *out, 0);
                let outcome = conversation.chat_streaming(
                    &mut session,
                    message,
                    &request,
                    &mut |event: &TokenEvent<'_>| stream.write_pending(event),
                );
                stream.finish()?;
                match outcome {
                    Ok(_) => writeln!(out)?,
                    Err(e) => {
                        warn!("Chat turn failed: {}", e.chain_message());
                        writeln!(out, "error: {}", e)?;
                    }
                }
            }
        }

        write!(out, "> ")?;
        out.flush()?;
    }

    writeln!(out)?;
    Ok(())
}

pub fn handle_info<W: Write>(json: bool, out: &mut W) -> Result<()> {
    let info = system_info::detect();
    let runtimes: &[&str] = if cfg!(feature = "llamacpp") {
        &["llama.cpp"]
    } else {
        &[]
    };

    if json {
        let value = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "system": info,
            "runtimes": runtimes,
        });
        serde_json::to_writer_pretty(&mut *out, &value)?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(out, "edgellm {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(out, "Architecture:    {}", info.architecture)?;
    writeln!(out, "CPU features:    {}", info.cpu_features.join(" "))?;
    writeln!(
        out,
        "Cores:           {} logical, {} physical",
        info.logical_cores, info.physical_cores
    )?;
    writeln!(out, "Default threads: {}", info.default_threads)?;
    if runtimes.is_empty() {
        writeln!(out, "Runtimes:        none (build with --features llamacpp)")?;
    } else {
        writeln!(out, "Runtimes:        {}", runtimes.join(", "))?;
    }
    Ok(())
}

/// Writes streamed text to a terminal, including characters the UTF-8
/// decoder only completes when generation ends
struct ConsoleStream<'w, W: Write> {
    out: &'w mut W,
    written: usize,
    error: Option<std::io::Error>,
}

impl<'w, W: Write> ConsoleStream<'w, W> {
    /// `written` is the byte length of output already on screen
    fn new(out: &'w mut W, written: usize) -> Self {
        Self {
            out,
            written,
            error: None,
        }
    }

    fn finish(self) -> std::io::Result<()> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn write_pending(&mut self, event: &TokenEvent<'_>) -> StreamControl {
        let pending = event.full_response_so_far.get(self.written..).unwrap_or_default();
        if pending.is_empty() {
            return StreamControl::Continue;
        }
        match write!(self.out, "{}", pending).and_then(|_| self.out.flush()) {
            Ok(()) => {
                self.written = event.full_response_so_far.len();
                StreamControl::Continue
            }
            Err(e) => {
                self.error = Some(e);
                StreamControl::Stop
            }
        }
    }
}
