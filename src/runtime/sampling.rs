//! Token sampling strategies for language model generation
//!
//! Only deterministic arg-max selection ships today. Temperature and top-p are
//! validated and carried to every policy so that probabilistic policies can be
//! added behind the same trait without touching the generation loop.

use serde::{Deserialize, Serialize};

use super::{GenerationRequest, Token};

/// Sampling parameters threaded from the request to the policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
}

impl SamplingParams {
    pub fn from_request(req: &GenerationRequest) -> Self {
        Self {
            temperature: req.temperature,
            top_p: req.top_p,
        }
    }
}

/// Pluggable token selection strategy
pub trait SamplingPolicy {
    /// Pick one index in `[0, logits.len())`, or `None` for an empty vector
    fn sample(&mut self, logits: &[f32], params: &SamplingParams) -> Option<Token>;

    /// Policy name for logging
    fn name(&self) -> &'static str;
}

/// Deterministic arg-max selection.
///
/// Ties resolve to the lowest index. NaN logits never win. Temperature and
/// top-p are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedySampler;

impl SamplingPolicy for GreedySampler {
    fn sample(&mut self, logits: &[f32], _params: &SamplingParams) -> Option<Token> {
        argmax(logits).map(|index| index as Token)
    }

    fn name(&self) -> &'static str {
        "greedy"
    }
}

/// Index of the first maximum element
pub fn argmax(logits: &[f32]) -> Option<usize> {
    let (first, rest) = logits.split_first()?;
    let mut best_index = 0;
    let mut best_logit = *first;

    for (offset, &logit) in rest.iter().enumerate() {
        // Strict comparison keeps the first occurrence on ties
        if logit > best_logit || (best_logit.is_nan() && !logit.is_nan()) {
            best_logit = logit;
            best_index = offset + 1;
        }
    }

    Some(best_index)
}
