mod common;

use common::{model_file, ScriptedRuntime};
use edgellm_core::conversation::{ConversationManager, Role};
use edgellm_core::runtime::{GenerationRequest, InferenceSession, OutputMode, StreamControl, TokenEvent};
use edgellm_core::Error;
use std::sync::Arc;

fn session_for(
    runtime: &Arc<ScriptedRuntime>,
) -> (tempfile::TempDir, InferenceSession<ScriptedRuntime>) {
    let dir = tempfile::tempdir().unwrap();
    let path = model_file(dir.path());
    let session = InferenceSession::load_default(Arc::clone(runtime), &path).unwrap();
    (dir, session)
}

#[test]
fn test_chat_appends_exchange_and_renders_history() {
    let runtime = ScriptedRuntime::new(&[" Hello", "!"]).into_arc();
    let (_dir, mut session) = session_for(&runtime);
    let mut conversation = ConversationManager::default().with_system_prompt("Be terse");

    let result = conversation
        .chat(&mut session, "Hi", &GenerationRequest::default())
        .unwrap();
    assert_eq!(result.response(), " Hello!");

    let turns = conversation.turns();
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[1].role, Role::User);
    assert_eq!(turns[1].content, "Hi");
    assert_eq!(turns[2].role, Role::Assistant);
    assert_eq!(turns[2].content, "Hello!");
    assert_eq!(runtime.prompts()[0], "System: Be terse\nHuman: Hi\nAssistant:");

    conversation
        .chat(&mut session, "Again", &GenerationRequest::default())
        .unwrap();
    assert_eq!(
        runtime.prompts()[1],
        "System: Be terse\nHuman: Hi\nAssistant: Hello!\nHuman: Again\nAssistant:"
    );
}

#[test]
fn test_chat_ignores_prompt_inclusion_request() {
    let runtime = ScriptedRuntime::new(&["ok"]).into_arc();
    let (_dir, mut session) = session_for(&runtime);
    let mut conversation = ConversationManager::default();

    let request = GenerationRequest::default().with_output_mode(OutputMode::IncludePrompt);
    conversation.chat(&mut session, "ping", &request).unwrap();
    assert_eq!(conversation.turns()[1].content, "ok");
}

#[test]
fn test_failed_chat_rolls_back_user_turn() {
    let mut runtime = ScriptedRuntime::new(&["x"]);
    runtime.empty_tokenize = true;
    let runtime = runtime.into_arc();
    let (_dir, mut session) = session_for(&runtime);
    let mut conversation = ConversationManager::default().with_system_prompt("rules");

    let err = conversation
        .chat(&mut session, "hello", &GenerationRequest::default())
        .unwrap_err();
    assert!(matches!(err, Error::Tokenization(_)));
    assert_eq!(conversation.len(), 1);
    assert_eq!(conversation.system_prompt(), Some("rules"));
}

#[test]
fn test_empty_message_rejected() {
    let runtime = ScriptedRuntime::new(&["x"]).into_arc();
    let (_dir, mut session) = session_for(&runtime);
    let mut conversation = ConversationManager::default();

    assert!(matches!(
        conversation.chat(&mut session, "   ", &GenerationRequest::default()),
        Err(Error::InvalidArgument(_))
    ));
    assert!(conversation.is_empty());
    assert!(runtime.prompts().is_empty());
}

#[test]
fn test_history_is_trimmed_during_chat() {
    let runtime = ScriptedRuntime::new(&["reply"]).into_arc();
    let (_dir, mut session) = session_for(&runtime);
    let mut conversation = ConversationManager::new(1).with_system_prompt("sys");

    for message in ["first", "second", "third"] {
        conversation
            .chat(&mut session, message, &GenerationRequest::default())
            .unwrap();
    }

    let turns = conversation.turns();
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[0].role, Role::System);
    assert_eq!(turns[1].content, "third");
    assert_eq!(turns[2].role, Role::Assistant);
    assert_eq!(
        runtime.prompts().last().unwrap(),
        "System: sys\nHuman: third\nAssistant:"
    );
}

#[test]
fn test_chat_streaming_and_reset() {
    let runtime = ScriptedRuntime::new(&["a", "b"]).into_arc();
    let (_dir, mut session) = session_for(&runtime);
    let mut conversation = ConversationManager::default().with_system_prompt("sys");

    let mut streamed = String::new();
    let result = conversation
        .chat_streaming(
            &mut session,
            "hi",
            &GenerationRequest::default(),
            &mut |event: &TokenEvent<'_>| {
                streamed.push_str(event.fragment);
                StreamControl::Continue
            },
        )
        .unwrap();
    assert_eq!(streamed, result.text);
    assert_eq!(conversation.turns()[2].content, "ab");

    conversation.reset();
    assert_eq!(conversation.len(), 1);
    assert_eq!(conversation.render_prompt(), "System: sys\nAssistant:");
}

#[test]
fn test_user_turn_survives_system_heavy_history() {
    let runtime = ScriptedRuntime::new(&["4"]).into_arc();
    let (_dir, mut session) = session_for(&runtime);
    let mut conversation = ConversationManager::new(1).with_system_prompt("rules");
    conversation.add_turn(Role::System, "more rules");

    conversation
        .chat(&mut session, "What is 2+2?", &GenerationRequest::default())
        .unwrap();

    assert_eq!(
        runtime.prompts()[0],
        "System: rules\nSystem: more rules\nHuman: What is 2+2?\nAssistant:"
    );
    let roles: Vec<Role> = conversation.turns().iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![Role::System, Role::System, Role::User, Role::Assistant]);
    assert_eq!(conversation.turns()[3].content, "4");
}

#[test]
fn test_zero_history_bound_still_sends_message() {
    let runtime = ScriptedRuntime::new(&["hey"]).into_arc();
    let (_dir, mut session) = session_for(&runtime);
    let mut conversation = ConversationManager::new(0);

    for message in ["hello", "again"] {
        conversation
            .chat(&mut session, message, &GenerationRequest::default())
            .unwrap();
    }
    assert_eq!(runtime.prompts()[1], "Human: again\nAssistant:");
}

#[test]
fn test_failed_chat_restores_trimmed_history() {
    let mut runtime = ScriptedRuntime::new(&["x"]);
    runtime.fail_decode_at = Some(0);
    let runtime = runtime.into_arc();
    let (_dir, mut session) = session_for(&runtime);
    let mut conversation = ConversationManager::new(1);
    conversation.add_turn(Role::User, "a");
    conversation.add_turn(Role::Assistant, "b");
    let before = conversation.clone();

    let err = conversation
        .chat(&mut session, "c", &GenerationRequest::default())
        .unwrap_err();
    assert!(matches!(err, Error::RuntimeDecode { .. }));
    // The failed attempt rendered only the new message
    assert_eq!(runtime.prompts()[0], "Human: c\nAssistant:");
    assert_eq!(conversation, before);
}

#[test]
fn test_trim_during_chat_drops_half_exchange() {
    let runtime = ScriptedRuntime::new(&["d"]).into_arc();
    let (_dir, mut session) = session_for(&runtime);
    let mut conversation = ConversationManager::new(1);
    conversation.add_turn(Role::User, "a");
    conversation.add_turn(Role::Assistant, "b");

    conversation
        .chat(&mut session, "c", &GenerationRequest::default())
        .unwrap();

    let contents: Vec<&str> = conversation.turns().iter().map(|t| t.content.as_str()).collect();
    assert_eq!(contents, vec!["c", "d"]);
    assert_eq!(conversation.turns()[0].role, Role::User);
}
