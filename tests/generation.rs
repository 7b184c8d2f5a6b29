mod common;

use common::{model_file, ScriptedRuntime};
use edgellm_core::runtime::{
    GenerationRequest, InferenceSession, OutputMode, SamplingParams, SamplingPolicy, StopReason,
};
use edgellm_core::Error;
use std::sync::Arc;

fn session_for(runtime: ScriptedRuntime) -> (tempfile::TempDir, InferenceSession<ScriptedRuntime>) {
    let dir = tempfile::tempdir().unwrap();
    let path = model_file(dir.path());
    let session = InferenceSession::load_default(Arc::new(runtime), &path).unwrap();
    (dir, session)
}

#[test]
fn test_generate_until_end_of_generation() {
    let (_dir, mut session) = session_for(ScriptedRuntime::new(&["Hello", ",", " world"]));

    let result = session
        .generate_with_params(&GenerationRequest::new("Say hi"))
        .unwrap();
    assert_eq!(result.text, "Hello, world");
    assert_eq!(result.tokens_generated, 3);
    assert_eq!(result.prompt_tokens, 2);
    assert_eq!(result.stop_reason, StopReason::EndOfGeneration);
}

#[test]
fn test_generate_stops_at_max_tokens() {
    let (_dir, mut session) = session_for(ScriptedRuntime::endless(20));

    let result = session
        .generate_with_params(&GenerationRequest::new("count").with_max_tokens(4))
        .unwrap();
    assert_eq!(result.tokens_generated, 4);
    assert_eq!(result.text, "t0 t1 t2 t3 ");
    assert_eq!(result.stop_reason, StopReason::MaxTokens);
}

#[test]
fn test_convenience_generate_returns_text() {
    let (_dir, mut session) = session_for(ScriptedRuntime::new(&["4"]));
    assert_eq!(session.generate("2+2=", 8).unwrap(), "4");
}

#[test]
fn test_repeated_generation_is_deterministic() {
    let (_dir, mut session) = session_for(ScriptedRuntime::new(&["same", " answer"]));
    let request = GenerationRequest::new("question");

    let first = session.generate_with_params(&request).unwrap();
    let second = session.generate_with_params(&request).unwrap();
    assert_eq!(first.text, second.text);
    assert_eq!(first.tokens_generated, second.tokens_generated);
}

#[test]
fn test_include_prompt_mode() {
    let (_dir, mut session) = session_for(ScriptedRuntime::new(&[" there"]));

    let request = GenerationRequest::new("Hi").with_output_mode(OutputMode::IncludePrompt);
    let result = session.generate_with_params(&request).unwrap();
    assert_eq!(result.text, "Hi there");
    assert_eq!(result.response(), " there");

    let result = session
        .generate_with_params(&GenerationRequest::new("Hi"))
        .unwrap();
    assert_eq!(result.text, " there");
    assert_eq!(result.response(), " there");
}

#[test]
fn test_split_utf8_pieces_are_joined() {
    let euro = "€".as_bytes().to_vec();
    let runtime = ScriptedRuntime::with_raw_pieces(vec![
        b"cost: ".to_vec(),
        euro[..1].to_vec(),
        euro[1..].to_vec(),
        b"5".to_vec(),
    ]);
    let (_dir, mut session) = session_for(runtime);

    let result = session
        .generate_with_params(&GenerationRequest::new("price"))
        .unwrap();
    assert_eq!(result.text, "cost: €5");
    assert_eq!(result.tokens_generated, 4);
}

#[test]
fn test_empty_tokenization_is_an_error() {
    let mut runtime = ScriptedRuntime::new(&["x"]);
    runtime.empty_tokenize = true;
    let (_dir, mut session) = session_for(runtime);

    let err = session
        .generate_with_params(&GenerationRequest::new("anything"))
        .unwrap_err();
    assert!(matches!(err, Error::Tokenization(_)));
    assert!(session.is_valid());
}

#[test]
fn test_prompt_decode_failure_is_an_error() {
    let mut runtime = ScriptedRuntime::new(&["x"]);
    runtime.fail_decode_at = Some(0);
    let (_dir, mut session) = session_for(runtime);

    let err = session
        .generate_with_params(&GenerationRequest::new("prompt"))
        .unwrap_err();
    assert!(matches!(err, Error::RuntimeDecode { .. }));
}

#[test]
fn test_mid_generation_decode_failure_keeps_partial_text() {
    let mut runtime = ScriptedRuntime::endless(10);
    runtime.fail_decode_at = Some(3);
    let (_dir, mut session) = session_for(runtime);

    let result = session
        .generate_with_params(&GenerationRequest::new("go"))
        .unwrap();
    assert_eq!(result.stop_reason, StopReason::DecodeFailure);
    assert_eq!(result.tokens_generated, 3);
    assert_eq!(result.text, "t0 t1 t2 ");
    assert!(session.is_valid());
}

#[test]
fn test_budget_exhaustion_skips_final_decode() {
    // Decode call 3 would follow the third token, which is the last one allowed
    let mut runtime = ScriptedRuntime::endless(10);
    runtime.fail_decode_at = Some(3);
    let (_dir, mut session) = session_for(runtime);

    let result = session
        .generate_with_params(&GenerationRequest::new("go").with_max_tokens(3))
        .unwrap();
    assert_eq!(result.stop_reason, StopReason::MaxTokens);
    assert_eq!(result.tokens_generated, 3);
    assert_eq!(result.text, "t0 t1 t2 ");
}

#[test]
fn test_invalid_request_rejected_before_runtime() {
    let (_dir, mut session) = session_for(ScriptedRuntime::new(&["x"]));

    assert!(matches!(session.generate("", 4), Err(Error::InvalidArgument(_))));
    assert!(matches!(session.generate("hi", 0), Err(Error::InvalidArgument(_))));
    let request = GenerationRequest::new("hi").with_top_p(1.5);
    assert!(matches!(
        session.generate_with_params(&request),
        Err(Error::InvalidArgument(_))
    ));
}

/// Always picks the lowest-scoring entry, to show the policy is pluggable
struct LowestSampler;

impl SamplingPolicy for LowestSampler {
    fn sample(&mut self, logits: &[f32], _params: &SamplingParams) -> Option<i32> {
        logits
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nan())
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i as i32)
    }

    fn name(&self) -> &'static str {
        "lowest"
    }
}

#[test]
fn test_custom_sampling_policy() {
    let (_dir, mut session) = session_for(ScriptedRuntime::new(&["never"]));
    session.set_sampler(Box::new(LowestSampler));

    // Token 0 has no piece; conversion failures contribute no text.
    let result = session
        .generate_with_params(&GenerationRequest::new("x").with_max_tokens(2))
        .unwrap();
    assert_eq!(result.tokens_generated, 2);
    assert_eq!(result.text, "");
}
