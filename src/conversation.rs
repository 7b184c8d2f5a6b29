//! Multi-turn conversation state
//!
//! Turns are accumulated in order, rendered into a single plain-text prompt
//! with `System:`/`Human:`/`Assistant:` labels, and trimmed to a bounded
//! length without ever dropping a system instruction while older exchanges
//! remain.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::constants;
use crate::error::{Error, Result};
use crate::runtime::{
    GenerationRequest, GenerationResult, InferenceSession, ModelRuntime, OutputMode,
    StreamingCallback,
};

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Label used in rendered prompts
    pub fn label(self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "Human",
            Role::Assistant => "Assistant",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(Error::InvalidRole(s.to_string())),
        }
    }
}

/// One message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn new<S: Into<String>>(role: Role, content: S) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Render turns as `"<Label>: <content>"` lines followed by an `Assistant:`
/// cue. An empty history renders to an empty string.
pub fn render_prompt(turns: &[ConversationTurn]) -> String {
    if turns.is_empty() {
        return String::new();
    }

    let mut prompt = String::new();
    for turn in turns {
        prompt.push_str(turn.role.label());
        prompt.push_str(": ");
        prompt.push_str(&turn.content);
        prompt.push('\n');
    }
    prompt.push_str(Role::Assistant.label());
    prompt.push(':');
    prompt
}

/// Ordered conversation history with bounded trimming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationManager {
    turns: Vec<ConversationTurn>,
    max_turns_kept: usize,
}

impl Default for ConversationManager {
    fn default() -> Self {
        Self::new(constants::DEFAULT_MAX_TURNS_KEPT)
    }
}

impl ConversationManager {
    /// Empty history that keeps at most `2 × max_turns_kept` turns when
    /// trimmed during `chat`
    pub fn new(max_turns_kept: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns_kept,
        }
    }

    /// Seed the history with a system instruction
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.add_turn(Role::System, prompt);
        self
    }

    pub fn add_turn<S: Into<String>>(&mut self, role: Role, content: S) {
        self.turns.push(ConversationTurn::new(role, content));
    }

    /// Append a turn whose role is given by name
    pub fn add_turn_str<S: Into<String>>(&mut self, role: &str, content: S) -> Result<()> {
        let role = role.parse::<Role>()?;
        self.add_turn(role, content);
        Ok(())
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns_kept(&self) -> usize {
        self.max_turns_kept
    }

    /// The first system turn, which is "the" system prompt
    pub fn system_prompt(&self) -> Option<&str> {
        self.turns
            .iter()
            .find(|turn| turn.role == Role::System)
            .map(|turn| turn.content.as_str())
    }

    pub fn render_prompt(&self) -> String {
        render_prompt(&self.turns)
    }

    /// Keep every system turn plus the most recent non-system turns once the
    /// history exceeds `2 × max_turns_kept` turns.
    pub fn trim(&mut self, max_turns_kept: usize) {
        self.trim_to(max_turns_kept.saturating_mul(2));
    }

    /// Keep every system turn plus as many recent non-system turns as fit in
    /// `limit` turns overall
    fn trim_to(&mut self, limit: usize) {
        if self.turns.len() <= limit {
            return;
        }

        let system_count = self
            .turns
            .iter()
            .filter(|turn| turn.role == Role::System)
            .count();
        let keep_others = limit.saturating_sub(system_count);
        let mut skip_others =
            (self.turns.len() - system_count).saturating_sub(keep_others);

        let before = self.turns.len();
        self.turns.retain(|turn| {
            if turn.role == Role::System {
                return true;
            }
            if skip_others > 0 {
                skip_others -= 1;
                return false;
            }
            true
        });
        debug!("Trimmed conversation from {} to {} turns", before, self.turns.len());
    }

    /// Drop every non-system turn
    pub fn reset(&mut self) {
        self.turns.retain(|turn| turn.role == Role::System);
    }

    /// Run one exchange: trim to leave room for `user_message`, append it,
    /// render, generate, and store the response as an assistant turn.
    ///
    /// `request` supplies sampling parameters; its prompt is replaced by the
    /// rendered history. The new user turn is always part of the prompt. If
    /// generation fails the history is restored exactly as it was.
    pub fn chat<R: ModelRuntime>(
        &mut self,
        session: &mut InferenceSession<R>,
        user_message: &str,
        request: &GenerationRequest,
    ) -> Result<GenerationResult> {
        self.exchange(user_message, request, |request| session.generate_with_params(request))
    }

    /// `chat` with per-token streaming
    pub fn chat_streaming<R: ModelRuntime, C: StreamingCallback + ?Sized>(
        &mut self,
        session: &mut InferenceSession<R>,
        user_message: &str,
        request: &GenerationRequest,
        callback: &mut C,
    ) -> Result<GenerationResult> {
        self.exchange(user_message, request, |request| {
            session.generate_streaming(request, callback)
        })
    }

    fn exchange<F>(
        &mut self,
        user_message: &str,
        request: &GenerationRequest,
        generate: F,
    ) -> Result<GenerationResult>
    where
        F: FnOnce(&GenerationRequest) -> Result<GenerationResult>,
    {
        if user_message.trim().is_empty() {
            return Err(Error::invalid_argument("message must not be empty"));
        }

        let snapshot = self.turns.clone();
        let before = self.turns.len();
        self.trim_to(self.max_turns_kept.saturating_mul(2).saturating_sub(1));
        if self.turns.len() < before {
            // Trimming can cut an exchange in half; drop the orphaned reply
            if let Some(pos) = self.turns.iter().position(|turn| turn.role != Role::System) {
                if self.turns[pos].role == Role::Assistant {
                    self.turns.remove(pos);
                }
            }
        }
        self.add_turn(Role::User, user_message);

        let mut request = request.clone();
        request.prompt = self.render_prompt();
        request.output_mode = OutputMode::ResponseOnly;

        match generate(&request) {
            Ok(result) => {
                self.add_turn(Role::Assistant, result.response().trim());
                Ok(result)
            }
            Err(e) => {
                self.turns = snapshot;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(system: bool, others: usize) -> ConversationManager {
        let mut manager = ConversationManager::new(10);
        if system {
            manager.add_turn(Role::System, "rules");
        }
        for i in 0..others {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            manager.add_turn(role, format!("msg{}", i));
        }
        manager
    }

    #[test]
    fn test_render_prompt_exact() {
        let turns = vec![
            ConversationTurn::new(Role::System, "Be terse"),
            ConversationTurn::new(Role::User, "Hi"),
        ];
        assert_eq!(render_prompt(&turns), "System: Be terse\nHuman: Hi\nAssistant:");
    }

    #[test]
    fn test_render_empty_history() {
        assert_eq!(render_prompt(&[]), "");
        assert_eq!(ConversationManager::default().render_prompt(), "");
    }

    #[test]
    fn test_render_includes_assistant_turns() {
        let mut manager = ConversationManager::default();
        manager.add_turn(Role::User, "2+2?");
        manager.add_turn(Role::Assistant, "4");
        manager.add_turn(Role::User, "and 3+3?");
        assert_eq!(
            manager.render_prompt(),
            "Human: 2+2?\nAssistant: 4\nHuman: and 3+3?\nAssistant:"
        );
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("system".parse::<Role>().unwrap(), Role::System);
        assert_eq!("User".parse::<Role>().unwrap(), Role::User);
        assert_eq!(" assistant ".parse::<Role>().unwrap(), Role::Assistant);
        assert!(matches!("narrator".parse::<Role>(), Err(Error::InvalidRole(_))));
    }

    #[test]
    fn test_add_turn_str_rejects_unknown_role() {
        let mut manager = ConversationManager::default();
        assert!(manager.add_turn_str("tool", "x").is_err());
        assert!(manager.is_empty());
        manager.add_turn_str("user", "x").unwrap();
        assert_eq!(manager.turns()[0].role, Role::User);
    }

    #[test]
    fn test_trim_keeps_system_and_recent_turns() {
        let mut manager = history(true, 14);
        manager.trim(5);

        assert_eq!(manager.len(), 10);
        assert_eq!(manager.turns()[0].role, Role::System);
        let kept: Vec<&str> = manager.turns()[1..].iter().map(|t| t.content.as_str()).collect();
        let expected: Vec<String> = (5..14).map(|i| format!("msg{}", i)).collect();
        assert_eq!(kept, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn test_trim_small_bound() {
        let mut manager = history(true, 10);
        manager.trim(2);

        assert_eq!(manager.len(), 4);
        assert_eq!(manager.system_prompt(), Some("rules"));
        assert_eq!(manager.turns()[1].content, "msg7");
        assert_eq!(manager.turns()[3].content, "msg9");
    }

    #[test]
    fn test_trim_noop_within_bound() {
        let mut manager = history(true, 9);
        let before = manager.clone();
        manager.trim(5);
        assert_eq!(manager, before);
    }

    #[test]
    fn test_trim_preserves_all_system_turns() {
        let mut manager = ConversationManager::new(1);
        manager.add_turn(Role::System, "first");
        manager.add_turn(Role::User, "a");
        manager.add_turn(Role::System, "second");
        manager.add_turn(Role::System, "third");
        manager.add_turn(Role::Assistant, "b");
        manager.trim(1);

        let roles: Vec<Role> = manager.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::System, Role::System, Role::System]);
        assert_eq!(manager.system_prompt(), Some("first"));
    }

    #[test]
    fn test_reset_keeps_system_prompt() {
        let mut manager = history(true, 4);
        manager.reset();
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.system_prompt(), Some("rules"));
    }

    #[test]
    fn test_turns_serialize_with_lowercase_roles() {
        let turn = ConversationTurn::new(Role::Assistant, "ok");
        let json = serde_json::to_string(&turn).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"ok"}"#);
    }
}
