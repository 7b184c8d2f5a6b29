//! Streaming support for token-by-token generation
//!
//! Streaming is a plain synchronous callback: the generation loop invokes the
//! callback after every produced token and consults its return value before
//! submitting the next decode. There is no background task; a stream is not
//! resumable once stopped.

use super::{GenerationResult, StopReason};

/// Control flow for generation continuation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamControl {
    /// Continue generating tokens
    Continue,
    /// Stop before the next decode; the session stays usable
    Stop,
}

impl From<bool> for StreamControl {
    fn from(keep_going: bool) -> Self {
        if keep_going {
            StreamControl::Continue
        } else {
            StreamControl::Stop
        }
    }
}

/// One streamed generation step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenEvent<'a> {
    /// Text completed by this token (empty while a character is still partial,
    /// and on the closing event)
    pub fragment: &'a str,
    /// Set only on the closing event delivered after the loop ends
    pub is_final: bool,
    /// Accumulated output, prompt-prefixed in `IncludePrompt` mode
    pub full_response_so_far: &'a str,
    /// Tokens appended so far
    pub total_tokens: usize,
    /// Present on the closing event
    pub stop_reason: Option<StopReason>,
}

/// Callback trait for streaming token generation
pub trait StreamingCallback {
    /// Called for each generated token and once more with `is_final` set.
    /// The return value of the closing call is ignored.
    fn on_token(&mut self, event: &TokenEvent<'_>) -> StreamControl;

    /// Called when generation completes successfully
    fn on_complete(&mut self, _result: &GenerationResult) {}
}

impl<F> StreamingCallback for F
where
    F: FnMut(&TokenEvent<'_>) -> StreamControl,
{
    fn on_token(&mut self, event: &TokenEvent<'_>) -> StreamControl {
        self(event)
    }
}

/// Simple callback for collecting generated text
#[derive(Debug, Default)]
pub struct CollectingCallback {
    pub text: String,
    pub fragments: Vec<String>,
    pub final_seen: bool,
}

impl CollectingCallback {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamingCallback for CollectingCallback {
    fn on_token(&mut self, event: &TokenEvent<'_>) -> StreamControl {
        if event.is_final {
            self.final_seen = true;
        } else {
            self.text.push_str(event.fragment);
            self.fragments.push(event.fragment.to_string());
        }
        StreamControl::Continue
    }
}
