//! Per-conversation chat history.
//!
//! Sessions are keyed by conversation id (the sender's phone number) and hold the most
//! recent turns, newest last. Appends evict the oldest turns once the history would
//! exceed [`MAX_HISTORY_TURNS`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Turns kept per conversation (five inbound/outbound exchanges).
pub const MAX_HISTORY_TURNS: usize = 10;

/// Which side of the conversation produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// Sent by the user to the relay.
    Inbound,
    /// Sent by the relay to the user.
    Outbound,
}

impl TurnRole {
    /// Chat role the model expects for this turn.
    pub fn chat_role(self) -> &'static str {
        match self {
            TurnRole::Inbound => "user",
            TurnRole::Outbound => "assistant",
        }
    }
}

/// One recorded message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn inbound(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Inbound,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn outbound(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Outbound,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// In-memory session store (get, append, list).
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, Vec<Turn>>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_to_cap(turns: &mut Vec<Turn>) {
    if turns.len() > MAX_HISTORY_TURNS {
        let excess = turns.len() - MAX_HISTORY_TURNS;
        turns.drain(..excess);
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// History for a conversation, oldest first. Empty when unknown.
    pub async fn get(&self, conversation_id: &str) -> Vec<Turn> {
        self.inner
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    /// True if a session exists for the conversation (even with no turns yet).
    pub async fn contains(&self, conversation_id: &str) -> bool {
        self.inner.read().await.contains_key(conversation_id)
    }

    /// Create an empty session if none exists.
    pub async fn touch(&self, conversation_id: &str) {
        let mut g = self.inner.write().await;
        if !g.contains_key(conversation_id) {
            g.insert(conversation_id.to_string(), Vec::new());
        }
    }

    /// Append one turn, then keep only the most recent [`MAX_HISTORY_TURNS`].
    pub async fn append(&self, conversation_id: &str, turn: Turn) {
        let mut g = self.inner.write().await;
        let turns = g.entry(conversation_id.to_string()).or_default();
        turns.push(turn);
        truncate_to_cap(turns);
    }

    /// Append an inbound/outbound pair under one lock so no other writer lands between them.
    pub async fn record_exchange(&self, conversation_id: &str, inbound: Turn, outbound: Turn) {
        let mut g = self.inner.write().await;
        let turns = g.entry(conversation_id.to_string()).or_default();
        turns.push(inbound);
        turns.push(outbound);
        truncate_to_cap(turns);
    }

    /// Known conversation ids, sorted.
    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_conversation_is_empty() {
        let store = SessionStore::new();
        assert!(store.get("nobody").await.is_empty());
        assert!(!store.contains("nobody").await);
    }

    #[tokio::test]
    async fn history_never_exceeds_cap_and_keeps_newest_in_order() {
        let store = SessionStore::new();
        for i in 0..25 {
            store.append("123", Turn::inbound(format!("m{}", i))).await;
            let len = store.get("123").await.len();
            assert!(len <= MAX_HISTORY_TURNS);
        }
        let contents: Vec<String> = store
            .get("123")
            .await
            .into_iter()
            .map(|t| t.content)
            .collect();
        let expected: Vec<String> = (15..25).map(|i| format!("m{}", i)).collect();
        assert_eq!(contents, expected);
    }

    #[tokio::test]
    async fn exchange_at_cap_evicts_oldest_pair() {
        let store = SessionStore::new();
        for i in 0..5 {
            store
                .record_exchange(
                    "123",
                    Turn::inbound(format!("q{}", i)),
                    Turn::outbound(format!("a{}", i)),
                )
                .await;
        }
        assert_eq!(store.get("123").await.len(), MAX_HISTORY_TURNS);

        store
            .record_exchange("123", Turn::inbound("q5"), Turn::outbound("a5"))
            .await;
        let turns = store.get("123").await;
        assert_eq!(turns.len(), MAX_HISTORY_TURNS);
        assert_eq!(turns[0].content, "q1");
        assert_eq!(turns[0].role, TurnRole::Inbound);
        assert_eq!(turns[8].content, "q5");
        assert_eq!(turns[9].content, "a5");
        assert_eq!(turns[9].role, TurnRole::Outbound);
    }

    #[tokio::test]
    async fn sessions_are_isolated_per_conversation() {
        let store = SessionStore::new();
        store.append("a", Turn::inbound("hello")).await;
        store.touch("b").await;
        assert_eq!(store.get("a").await.len(), 1);
        assert!(store.get("b").await.is_empty());
        assert!(store.contains("b").await);
        assert_eq!(store.ids().await, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn turn_roles_map_to_chat_roles() {
        assert_eq!(TurnRole::Inbound.chat_role(), "user");
        assert_eq!(TurnRole::Outbound.chat_role(), "assistant");
    }

    #[test]
    fn turn_serializes_with_lowercase_role() {
        let turn = Turn::outbound("hi");
        let v = serde_json::to_value(&turn).unwrap();
        assert_eq!(v["role"], "outbound");
        assert_eq!(v["content"], "hi");
        assert!(v["timestamp"].is_string());
    }
}
