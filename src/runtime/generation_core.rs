//! Unified generation core
//!
//! A single implementation of the token loop serves both blocking and
//! streaming generation: blocking generation is streaming with a callback
//! that always continues.

use std::time::Instant;

use tracing::{debug, warn};

use super::{
    sampling::{SamplingParams, SamplingPolicy},
    streaming::{StreamControl, TokenEvent},
    utf8_decoder::IncrementalUtf8Decoder,
    GenerationRequest, GenerationResult, ModelRuntime, OutputMode, StopReason,
};
use crate::error::{Error, Result};

/// Generation loop over one model/context pair borrowed from a session
pub struct GenerationCore<'a, R: ModelRuntime> {
    runtime: &'a R,
    model: &'a R::Model,
    context: &'a mut R::Context,
    sampler: &'a mut dyn SamplingPolicy,
}

impl<'a, R: ModelRuntime> GenerationCore<'a, R> {
    pub fn new(
        runtime: &'a R,
        model: &'a R::Model,
        context: &'a mut R::Context,
        sampler: &'a mut dyn SamplingPolicy,
    ) -> Self {
        Self {
            runtime,
            model,
            context,
            sampler,
        }
    }

    /// Run the loop, invoking `callback` after every appended token and once
    /// more with `is_final` set when generation ends.
    ///
    /// Fails only before the first token: on tokenization failure or when the
    /// prompt cannot be decoded. Later runtime failures end the loop with
    /// `StopReason::DecodeFailure` and keep the partial text.
    pub fn generate_tokens<C>(
        self,
        request: &GenerationRequest,
        mut callback: C,
    ) -> Result<GenerationResult>
    where
        C: FnMut(&TokenEvent<'_>) -> StreamControl,
    {
        let Self {
            runtime,
            model,
            context,
            sampler,
        } = self;

        let start_time = Instant::now();
        let params = SamplingParams::from_request(request);

        // Step 1: Start from an empty sequence so identical requests repeat
        runtime.reset_context(context);

        // Step 2: Tokenize the prompt
        let prompt_tokens = runtime
            .tokenize(model, &request.prompt)
            .map_err(|e| Error::tokenization(format!("{:#}", e)))?;
        if prompt_tokens.is_empty() {
            return Err(Error::tokenization("prompt produced no tokens"));
        }
        debug!("Tokenized prompt into {} tokens", prompt_tokens.len());

        // Step 3: Prime the context with the whole prompt
        runtime
            .decode(context, &prompt_tokens)
            .map_err(|e| Error::runtime_decode("failed to process prompt", e))?;

        let mut output = match request.output_mode {
            OutputMode::ResponseOnly => String::new(),
            OutputMode::IncludePrompt => request.prompt.clone(),
        };
        let prompt_prefix_len = output.len();
        output.reserve(request.max_tokens * 4);

        let mut decoder = IncrementalUtf8Decoder::new();
        let mut tokens_generated = 0;
        let mut stop_reason = StopReason::MaxTokens;

        // Step 4: Generate tokens one by one
        for step in 0..request.max_tokens {
            let next_token = match runtime.logits(context) {
                Ok(logits) => sampler.sample(logits, &params),
                Err(e) => {
                    warn!("Failed to read logits at step {}: {:#}", step, e);
                    stop_reason = StopReason::DecodeFailure;
                    break;
                }
            };
            let Some(next_token) = next_token else {
                warn!("Runtime returned empty logits at step {}", step);
                stop_reason = StopReason::DecodeFailure;
                break;
            };

            if runtime.is_end_of_generation(model, next_token) {
                debug!("End-of-generation token {} at step {}", next_token, step);
                stop_reason = StopReason::EndOfGeneration;
                break;
            }

            let fragment = match runtime.token_to_piece(model, next_token) {
                Ok(bytes) => decoder.push_bytes(&bytes),
                Err(e) => {
                    warn!("Failed to convert token {} to text: {:#}", next_token, e);
                    String::new()
                }
            };
            output.push_str(&fragment);
            tokens_generated += 1;
            debug!("Generated token {}: {:?}", step, fragment);

            let control = callback(&TokenEvent {
                fragment: &fragment,
                is_final: false,
                full_response_so_far: &output,
                total_tokens: tokens_generated,
                stop_reason: None,
            });
            if control == StreamControl::Stop {
                debug!("Generation cancelled by caller after {} tokens", tokens_generated);
                stop_reason = StopReason::Cancelled;
                break;
            }

            // The last token's logits are never read
            if step + 1 == request.max_tokens {
                break;
            }

            if let Err(e) = runtime.decode(context, &[next_token]) {
                warn!(
                    "Decode failed after {} tokens, returning partial output: {:#}",
                    tokens_generated, e
                );
                stop_reason = StopReason::DecodeFailure;
                break;
            }
        }

        // Step 5: Release any partial character held by the decoder
        output.push_str(&decoder.flush());

        callback(&TokenEvent {
            fragment: "",
            is_final: true,
            full_response_so_far: &output,
            total_tokens: tokens_generated,
            stop_reason: Some(stop_reason),
        });

        let generation_time = start_time.elapsed();
        debug!(
            "Generation finished: {} tokens, {:?}, {} ms using {} sampling",
            tokens_generated,
            stop_reason,
            generation_time.as_millis(),
            sampler.name()
        );

        Ok(GenerationResult {
            text: output,
            tokens_generated,
            prompt_tokens: prompt_tokens.len(),
            stop_reason,
            generation_time_ms: generation_time.as_millis() as u64,
            tokens_per_second: if generation_time.as_secs_f32() > 0.0 {
                tokens_generated as f32 / generation_time.as_secs_f32()
            } else {
                0.0
            },
            prompt_prefix_len,
        })
    }
}
