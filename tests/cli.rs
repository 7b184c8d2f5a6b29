mod common;

use common::{model_file, ScriptedRuntime};
use edgellm_core::cli::commands::ChatCommand;
use edgellm_core::cli::handle_chat;
use edgellm_core::EdgeConfig;

fn chat_command(model: std::path::PathBuf, max_turns: Option<usize>) -> ChatCommand {
    ChatCommand {
        model,
        system: Some("Be brief".to_string()),
        max_tokens: Some(8),
        max_turns,
    }
}

#[test]
fn test_chat_session_answers_and_exits() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = ScriptedRuntime::new(&["Sure", "."]).into_arc();
    let cmd = chat_command(model_file(dir.path()), None);

    let mut out = Vec::new();
    handle_chat(
        runtime.clone(),
        &EdgeConfig::default(),
        &cmd,
        "hello\n/exit\nignored\n".as_bytes(),
        &mut out,
    )
    .unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Sure."));
    assert_eq!(runtime.prompts(), vec!["System: Be brief\nHuman: hello\nAssistant:"]);
}

#[test]
fn test_chat_rejects_zero_history_bound() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = ScriptedRuntime::new(&["x"]).into_arc();
    let cmd = chat_command(model_file(dir.path()), Some(0));

    let mut out = Vec::new();
    let err = handle_chat(
        runtime.clone(),
        &EdgeConfig::default(),
        &cmd,
        "hello\n".as_bytes(),
        &mut out,
    )
    .unwrap_err();

    assert!(err.to_string().contains("max_turns_kept"));
    // Rejected before any model was loaded
    assert!(runtime.events().is_empty());
}
