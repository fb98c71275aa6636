//! Per-conversation auto-respond override.
//!
//! When the flag is on for a sender, inbound messages skip the model and get the
//! configured promotional reply. Absent entries read as off.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory store: conversation id -> auto-respond enabled.
pub struct AutoRespondStore {
    inner: Arc<RwLock<HashMap<String, bool>>>,
}

impl Default for AutoRespondStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoRespondStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Whether auto-respond is on for the conversation (false when never set).
    pub async fn get(&self, conversation_id: &str) -> bool {
        self.inner
            .read()
            .await
            .get(conversation_id)
            .copied()
            .unwrap_or(false)
    }

    /// Overwrite the flag for the conversation.
    pub async fn set(&self, conversation_id: impl Into<String>, enabled: bool) {
        self.inner.write().await.insert(conversation_id.into(), enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn defaults_to_off() {
        let store = AutoRespondStore::new();
        assert!(!store.get("123").await);
    }

    #[tokio::test]
    async fn last_write_wins() {
        let store = AutoRespondStore::new();
        store.set("123", true).await;
        assert!(store.get("123").await);
        store.set("123", false).await;
        assert!(!store.get("123").await);
        store.set("123", true).await;
        store.set("123", true).await;
        assert!(store.get("123").await);
        assert!(!store.get("456").await);
    }
}
