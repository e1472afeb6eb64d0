//! Utterance and conversation-state value objects.
//!
//! An [`Utterance`] is one inbound user message. It flows through the entire
//! pipeline: fast-path classifier → router → context assembly / orchestrator
//! → synthesizer. Immutable once created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies the user scope an utterance (and its facts) belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeId(pub String);

impl ScopeId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One inbound user message. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    /// Unique utterance ID
    pub id: String,

    /// The raw text as received
    pub text: String,

    /// Which user scope this belongs to
    pub scope: ScopeId,

    /// Which conversation this belongs to
    pub conversation: ConversationId,

    /// When it was received
    pub received_at: DateTime<Utc>,
}

impl Utterance {
    pub fn new(text: impl Into<String>, scope: ScopeId, conversation: ConversationId) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            scope,
            conversation,
            received_at: Utc::now(),
        }
    }
}

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One past exchange half in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            text: text.into(),
        }
    }
}

/// Bounded window of recent turns, read by the router for signals.
/// The router never writes it; the engine appends after each reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    turns: Vec<Turn>,
    capacity: usize,
}

impl ConversationState {
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a turn, evicting the oldest when at capacity.
    pub fn push(&mut self, turn: Turn) {
        if self.turns.len() == self.capacity {
            self.turns.remove(0);
        }
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utterance_carries_scope_and_conversation() {
        let utt = Utterance::new("hello", ScopeId::new("alex"), ConversationId::from("c1"));
        assert_eq!(utt.text, "hello");
        assert_eq!(utt.scope.as_str(), "alex");
        assert_eq!(utt.conversation.to_string(), "c1");
        assert!(!utt.id.is_empty());
    }

    #[test]
    fn conversation_state_evicts_oldest() {
        let mut state = ConversationState::new(2);
        state.push(Turn::user("one"));
        state.push(Turn::assistant("two"));
        state.push(Turn::user("three"));

        assert_eq!(state.turns().len(), 2);
        assert_eq!(state.turns()[0].text, "two");
        assert_eq!(state.turns()[1].text, "three");
    }

    #[test]
    fn utterance_serialization_roundtrip() {
        let utt = Utterance::new("remind me", ScopeId::new("s1"), ConversationId::new());
        let json = serde_json::to_string(&utt).unwrap();
        let back: Utterance = serde_json::from_str(&json).unwrap();
        assert_eq!(back.text, "remind me");
        assert_eq!(back.scope, utt.scope);
    }
}
