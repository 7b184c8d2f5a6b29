//! llama.cpp runtime adapter using llama-cpp-2
//!
//! The native backend is process-global and kept in a static slot. Models are
//! shared through `Arc` so a context can keep its model alive; the context
//! borrows the model for `'static` and is always dropped before that `Arc`.

use anyhow::{anyhow, bail, Context as _, Result};
use llama_cpp_2::{
    context::{params::LlamaContextParams, LlamaContext},
    llama_backend::LlamaBackend,
    llama_batch::LlamaBatch,
    model::{params::LlamaModelParams, AddBos, LlamaModel, Special},
    send_logs_to_tracing,
    token::LlamaToken,
    LogOptions,
};
use parking_lot::Mutex;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::{ContextParams, ModelRuntime, Token};

static BACKEND: Mutex<Option<LlamaBackend>> = Mutex::new(None);

/// Execution context plus the decode position bookkeeping llama.cpp needs
pub struct LlamaSessionContext {
    // Declared before `_model` so the context is dropped first.
    inner: LlamaContext<'static>,
    _model: Arc<LlamaModel>,
    n_past: i32,
    batch_size: usize,
    /// Batch index whose logits are valid, if any decode succeeded
    logits_index: Option<i32>,
}

/// `ModelRuntime` backed by llama.cpp
#[derive(Debug, Clone, Default)]
pub struct LlamaCppRuntime {
    native_logs: bool,
}

impl LlamaCppRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward llama.cpp's own log output into tracing. Takes effect when
    /// the backend is initialised.
    pub fn with_native_logs(mut self, enabled: bool) -> Self {
        self.native_logs = enabled;
        self
    }
}

impl ModelRuntime for LlamaCppRuntime {
    type Model = Arc<LlamaModel>;
    type Context = LlamaSessionContext;

    fn name(&self) -> &str {
        "llama.cpp"
    }

    fn init_backend(&self) -> Result<()> {
        let mut slot = BACKEND.lock();
        if slot.is_some() {
            return Ok(());
        }
        send_logs_to_tracing(LogOptions::default().with_logs_enabled(self.native_logs));
        let backend = LlamaBackend::init().context("Failed to initialize llama.cpp backend")?;
        *slot = Some(backend);
        Ok(())
    }

    fn shutdown_backend(&self) {
        if BACKEND.lock().take().is_some() {
            info!("llama.cpp backend freed");
        }
    }

    fn load_model(&self, path: &Path, gpu_layers: u32) -> Result<Self::Model> {
        let slot = BACKEND.lock();
        let backend = slot
            .as_ref()
            .ok_or_else(|| anyhow!("llama.cpp backend is not initialized"))?;

        let params = LlamaModelParams::default().with_n_gpu_layers(gpu_layers);
        let model = LlamaModel::load_from_file(backend, path, &params)
            .map_err(|e| anyhow!("Failed to load model: {}", e))?;
        debug!("Loaded {} with vocab size {}", path.display(), model.n_vocab());
        Ok(Arc::new(model))
    }

    fn create_context(&self, model: &Self::Model, params: &ContextParams) -> Result<Self::Context> {
        let slot = BACKEND.lock();
        let backend = slot
            .as_ref()
            .ok_or_else(|| anyhow!("llama.cpp backend is not initialized"))?;

        let threads = i32::try_from(params.threads).context("thread count out of range")?;
        let context_params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(params.context_length))
            .with_n_batch(params.batch_size)
            .with_n_threads(threads)
            .with_n_threads_batch(threads);

        // SAFETY: the returned context stores a clone of `model` and its
        // `inner` field is dropped before that clone, so the model outlives
        // every use of this reference.
        let model_ref: &'static LlamaModel = unsafe { &*Arc::as_ptr(model) };
        let inner = model_ref
            .new_context(backend, context_params)
            .map_err(|e| anyhow!("Failed to create context: {}", e))?;

        Ok(LlamaSessionContext {
            inner,
            _model: Arc::clone(model),
            n_past: 0,
            batch_size: params.batch_size.max(1) as usize,
            logits_index: None,
        })
    }

    fn vocab_size(&self, model: &Self::Model) -> usize {
        model.n_vocab().max(0) as usize
    }

    fn tokenize(&self, model: &Self::Model, text: &str) -> Result<Vec<Token>> {
        let tokens = model
            .str_to_token(text, AddBos::Always)
            .map_err(|e| anyhow!("Failed to tokenize: {}", e))?;
        Ok(tokens.into_iter().map(|token| token.0).collect())
    }

    fn reset_context(&self, context: &mut Self::Context) {
        context.inner.clear_kv_cache();
        context.n_past = 0;
        context.logits_index = None;
    }

    fn decode(&self, context: &mut Self::Context, tokens: &[Token]) -> Result<()> {
        if tokens.is_empty() {
            bail!("nothing to decode");
        }

        context.logits_index = None;
        for chunk in tokens.chunks(context.batch_size) {
            let mut batch = LlamaBatch::new(chunk.len(), 1);
            let last = chunk.len() - 1;
            for (i, &token) in chunk.iter().enumerate() {
                batch
                    .add(LlamaToken(token), context.n_past + i as i32, &[0], i == last)
                    .map_err(|e| anyhow!("Failed to add token to batch: {}", e))?;
            }
            context
                .inner
                .decode(&mut batch)
                .map_err(|e| anyhow!("llama_decode failed: {}", e))?;
            context.n_past += chunk.len() as i32;
            context.logits_index = Some(batch.n_tokens() - 1);
        }
        Ok(())
    }

    fn logits<'c>(&self, context: &'c Self::Context) -> Result<&'c [f32]> {
        let index = context
            .logits_index
            .ok_or_else(|| anyhow!("no logits available before a successful decode"))?;
        Ok(context.inner.get_logits_ith(index))
    }

    fn token_to_piece(&self, model: &Self::Model, token: Token) -> Result<Vec<u8>> {
        model
            .token_to_bytes(LlamaToken(token), Special::Tokenize)
            .map_err(|e| anyhow!("Failed to convert token {} to text: {}", token, e))
    }

    fn is_end_of_generation(&self, model: &Self::Model, token: Token) -> bool {
        model.is_eog_token(LlamaToken(token))
    }
}
