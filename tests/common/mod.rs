//! Common test utilities: a scripted in-process model runtime

#![allow(dead_code)]

use anyhow::{anyhow, bail};
use edgellm_core::runtime::{ContextParams, ModelRuntime, Token};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static NEXT_RUNTIME_ID: AtomicUsize = AtomicUsize::new(0);

/// End-of-generation token of every scripted runtime
pub const EOG: Token = 2;
const FIRST_PIECE_TOKEN: Token = 10;
const VOCAB_SIZE: usize = 64;

#[derive(Debug)]
pub struct MockModel {
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct MockContext {
    /// Decode calls since the last reset; the prompt decode is call 0
    decodes: usize,
    logits: Option<Vec<f32>>,
}

/// Runtime that replays a fixed token script.
///
/// After the prompt decode the logits favour the first scripted token, after
/// each further decode the next one, and once the script is exhausted the
/// end-of-generation token.
#[derive(Debug)]
pub struct ScriptedRuntime {
    name: String,
    script: Vec<Token>,
    pieces: HashMap<Token, Vec<u8>>,
    pub fail_init: bool,
    pub fail_load: bool,
    pub fail_context: bool,
    pub panic_on_load: bool,
    pub empty_tokenize: bool,
    /// Index of the decode call that fails (0 = prompt decode)
    pub fail_decode_at: Option<usize>,
    events: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
    init_calls: AtomicUsize,
}

impl ScriptedRuntime {
    /// Runtime with a unique backend name whose script emits `pieces` in
    /// order and then ends generation
    pub fn new(pieces: &[&str]) -> Self {
        Self::with_raw_pieces(pieces.iter().map(|p| p.as_bytes().to_vec()).collect())
    }

    pub fn with_raw_pieces(pieces: Vec<Vec<u8>>) -> Self {
        let id = NEXT_RUNTIME_ID.fetch_add(1, Ordering::SeqCst);
        let mut map = HashMap::new();
        let mut script = Vec::new();
        for (i, piece) in pieces.into_iter().enumerate() {
            let token = FIRST_PIECE_TOKEN + i as Token;
            map.insert(token, piece);
            script.push(token);
        }
        Self {
            name: format!("scripted-{}", id),
            script,
            pieces: map,
            fail_init: false,
            fail_load: false,
            fail_context: false,
            panic_on_load: false,
            empty_tokenize: false,
            fail_decode_at: None,
            events: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            init_calls: AtomicUsize::new(0),
        }
    }

    /// Script that never reaches end of generation within `len` tokens
    pub fn endless(len: usize) -> Self {
        let pieces: Vec<String> = (0..len).map(|i| format!("t{} ", i)).collect();
        let refs: Vec<&str> = pieces.iter().map(String::as_str).collect();
        Self::new(&refs)
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    /// Every text passed to `tokenize`, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    fn record(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    fn one_hot(token: Token) -> Vec<f32> {
        let mut logits = vec![0.0; VOCAB_SIZE];
        logits[token as usize] = 1.0;
        logits
    }
}

impl ModelRuntime for ScriptedRuntime {
    type Model = MockModel;
    type Context = MockContext;

    fn name(&self) -> &str {
        &self.name
    }

    fn init_backend(&self) -> anyhow::Result<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            bail!("backend unavailable");
        }
        self.record("init");
        Ok(())
    }

    fn shutdown_backend(&self) {
        self.record("shutdown");
    }

    fn load_model(&self, path: &Path, _gpu_layers: u32) -> anyhow::Result<MockModel> {
        if self.panic_on_load {
            panic!("native abort while loading");
        }
        if self.fail_load {
            bail!("unknown model architecture: 'mystery'");
        }
        self.record("load_model");
        Ok(MockModel {
            path: path.to_path_buf(),
        })
    }

    fn create_context(&self, _model: &MockModel, params: &ContextParams) -> anyhow::Result<MockContext> {
        if self.fail_context {
            bail!("failed to allocate {} token context", params.context_length);
        }
        self.record("create_context");
        Ok(MockContext {
            decodes: 0,
            logits: None,
        })
    }

    fn vocab_size(&self, _model: &MockModel) -> usize {
        VOCAB_SIZE
    }

    fn tokenize(&self, _model: &MockModel, text: &str) -> anyhow::Result<Vec<Token>> {
        self.prompts.lock().push(text.to_string());
        if self.empty_tokenize {
            return Ok(Vec::new());
        }
        Ok(text.split_whitespace().map(|_| 1).collect())
    }

    fn reset_context(&self, context: &mut MockContext) {
        context.decodes = 0;
        context.logits = None;
    }

    fn decode(&self, context: &mut MockContext, tokens: &[Token]) -> anyhow::Result<()> {
        if tokens.is_empty() {
            bail!("nothing to decode");
        }
        if self.fail_decode_at == Some(context.decodes) {
            context.logits = None;
            bail!("decode call {} failed", context.decodes);
        }
        let next = self.script.get(context.decodes).copied().unwrap_or(EOG);
        context.logits = Some(Self::one_hot(next));
        context.decodes += 1;
        Ok(())
    }

    fn logits<'c>(&self, context: &'c MockContext) -> anyhow::Result<&'c [f32]> {
        context
            .logits
            .as_deref()
            .ok_or_else(|| anyhow!("no logits"))
    }

    fn token_to_piece(&self, _model: &MockModel, token: Token) -> anyhow::Result<Vec<u8>> {
        self.pieces
            .get(&token)
            .cloned()
            .ok_or_else(|| anyhow!("unknown token {}", token))
    }

    fn is_end_of_generation(&self, _model: &MockModel, token: Token) -> bool {
        token == EOG
    }

    fn release_context(&self, _context: MockContext) {
        self.record("release_context");
    }

    fn release_model(&self, _model: MockModel) {
        self.record("release_model");
    }
}

/// A file the session's existence check accepts
pub fn model_file(dir: &Path) -> PathBuf {
    let path = dir.join("model.gguf");
    std::fs::write(&path, b"GGUF\x03\x00\x00\x00").expect("write model file");
    path
}
