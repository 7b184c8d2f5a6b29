//! Inference session lifecycle
//!
//! An `InferenceSession` exclusively owns one model handle and one context
//! handle produced by a `ModelRuntime`. Both live in a single `Option`, so a
//! session is either fully loaded or fully released; there is no observable
//! half-initialised state. Dropping a session releases it.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    backend,
    generation_core::GenerationCore,
    sampling::{GreedySampler, SamplingPolicy},
    streaming::StreamingCallback,
    ContextParams, GenerationRequest, GenerationResult, ModelRuntime,
};
use crate::constants;
use crate::error::{Error, Result};
use crate::system_info;

/// Options for loading a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    pub context_length: u32,
    pub gpu_layers: u32,
    pub batch_size: u32,
    /// Compute threads; `None` uses half the available cores (at least one)
    pub threads: Option<u32>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            context_length: constants::DEFAULT_CONTEXT_LENGTH,
            gpu_layers: constants::DEFAULT_GPU_LAYERS,
            batch_size: constants::DEFAULT_BATCH_SIZE,
            threads: None,
        }
    }
}

impl SessionOptions {
    pub fn new(context_length: u32, gpu_layers: u32) -> Self {
        Self {
            context_length,
            gpu_layers,
            ..Default::default()
        }
    }

    fn context_params(&self) -> ContextParams {
        ContextParams {
            context_length: self.context_length,
            batch_size: self.batch_size,
            threads: self
                .threads
                .filter(|&threads| threads > 0)
                .unwrap_or_else(system_info::default_thread_count),
        }
    }
}

/// Descriptive information about a loaded session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub model_path: PathBuf,
    pub runtime: String,
    pub context_length: u32,
    pub gpu_layers: u32,
    pub batch_size: u32,
    pub threads: u32,
    pub vocab_size: usize,
}

/// The model/context pair. Field order drops the context first.
struct SessionHandles<R: ModelRuntime> {
    context: R::Context,
    model: R::Model,
}

/// A loaded model with its execution context
pub struct InferenceSession<R: ModelRuntime> {
    runtime: Arc<R>,
    handles: Option<SessionHandles<R>>,
    info: SessionInfo,
    sampler: Box<dyn SamplingPolicy>,
}

impl<R: ModelRuntime> InferenceSession<R> {
    /// Load a model file and create its execution context.
    ///
    /// Either returns a fully valid session or fails without leaking: if
    /// context creation fails, the already loaded model is released before
    /// the error is returned.
    pub fn load<P: AsRef<Path>>(runtime: Arc<R>, path: P, options: SessionOptions) -> Result<Self> {
        let path = path.as_ref();

        if options.context_length == 0 {
            return Err(Error::invalid_argument("context_length must be positive"));
        }
        if options.batch_size == 0 {
            return Err(Error::invalid_argument("batch_size must be positive"));
        }
        check_model_file(path)?;

        backend::ensure_initialized(runtime.as_ref()).map_err(|e| {
            Error::model_load_with(path, "failed to initialize inference backend", e)
        })?;

        let model = runtime
            .load_model(path, options.gpu_layers)
            .map_err(|e| Error::model_load_with(path, "runtime could not load model", e))?;

        let params = options.context_params();
        let context = match runtime.create_context(&model, &params) {
            Ok(context) => context,
            Err(e) => {
                runtime.release_model(model);
                return Err(Error::model_load_with(
                    path,
                    "failed to create context for model",
                    e,
                ));
            }
        };

        let info = SessionInfo {
            model_path: path.to_path_buf(),
            runtime: runtime.name().to_string(),
            context_length: params.context_length,
            gpu_layers: options.gpu_layers,
            batch_size: params.batch_size,
            threads: params.threads,
            vocab_size: runtime.vocab_size(&model),
        };

        info!(
            "Loaded model {} (ctx {}, gpu layers {}, threads {})",
            path.display(),
            info.context_length,
            info.gpu_layers,
            info.threads
        );

        Ok(Self {
            runtime,
            handles: Some(SessionHandles { context, model }),
            info,
            sampler: Box::new(GreedySampler),
        })
    }

    /// Load with default options (context 2048, CPU only)
    pub fn load_default<P: AsRef<Path>>(runtime: Arc<R>, path: P) -> Result<Self> {
        Self::load(runtime, path, SessionOptions::default())
    }

    /// Whether both handles are live. Never fails.
    pub fn is_valid(&self) -> bool {
        self.handles.is_some()
    }

    /// Release the context, then the model. Idempotent.
    pub fn release(&mut self) {
        if let Some(SessionHandles { context, model }) = self.handles.take() {
            self.runtime.release_context(context);
            self.runtime.release_model(model);
            info!("Released model {}", self.info.model_path.display());
        }
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn runtime(&self) -> &Arc<R> {
        &self.runtime
    }

    /// Replace the token selection policy used by later generations
    pub fn set_sampler(&mut self, sampler: Box<dyn SamplingPolicy>) {
        debug!("Switching sampling policy to {}", sampler.name());
        self.sampler = sampler;
    }

    /// Generate text from a prompt (convenience method)
    pub fn generate(&mut self, prompt: &str, max_tokens: usize) -> Result<String> {
        let request = GenerationRequest::new(prompt).with_max_tokens(max_tokens);
        Ok(self.generate_with_params(&request)?.text)
    }

    /// Generate text with full parameters, blocking until generation stops
    pub fn generate_with_params(&mut self, request: &GenerationRequest) -> Result<GenerationResult> {
        self.run(request, |_| super::StreamControl::Continue)
    }

    /// Generate text, invoking `callback` after every token.
    ///
    /// The callback can stop generation after any token; the session stays
    /// valid and reusable afterwards.
    pub fn generate_streaming<C: StreamingCallback + ?Sized>(
        &mut self,
        request: &GenerationRequest,
        callback: &mut C,
    ) -> Result<GenerationResult> {
        let result = self.run(request, |event| callback.on_token(event))?;
        callback.on_complete(&result);
        Ok(result)
    }

    fn run<C>(&mut self, request: &GenerationRequest, callback: C) -> Result<GenerationResult>
    where
        C: FnMut(&super::TokenEvent<'_>) -> super::StreamControl,
    {
        request.validate()?;
        let handles = self.handles.as_mut().ok_or(Error::InvalidSession)?;

        let core = GenerationCore::new(
            self.runtime.as_ref(),
            &handles.model,
            &mut handles.context,
            self.sampler.as_mut(),
        );
        core.generate_tokens(request, callback)
    }
}

impl<R: ModelRuntime> Drop for InferenceSession<R> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<R: ModelRuntime> std::fmt::Debug for InferenceSession<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceSession")
            .field("info", &self.info)
            .field("valid", &self.is_valid())
            .field("sampler", &self.sampler.name())
            .finish()
    }
}

/// The path must name an existing, readable regular file
fn check_model_file(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| Error::model_load(path, format!("file not accessible: {}", e)))?;
    if !metadata.is_file() {
        return Err(Error::model_load(path, "not a regular file"));
    }
    File::open(path).map_err(|e| Error::model_load(path, format!("file not readable: {}", e)))?;
    Ok(())
}
