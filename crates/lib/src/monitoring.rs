//! Execution log of model invocations for the monitoring endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One successful pipeline run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub conversation_id: String,
    pub input: String,
    pub output: String,
    /// Reasoning-stage text when the two-stage pipeline ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub latency_ms: u64,
}

impl ExecutionEntry {
    pub fn new(
        conversation_id: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
        reasoning: Option<String>,
        latency_ms: u64,
    ) -> Self {
        Self {
            id: format!("exec-{}", uuid::Uuid::new_v4()),
            timestamp: Utc::now(),
            conversation_id: conversation_id.into(),
            input: input.into(),
            output: output.into(),
            reasoning,
            latency_ms,
        }
    }
}

/// Bounded, oldest-first log. Keeps at most `capacity` entries.
pub struct ExecutionLog {
    capacity: usize,
    inner: Arc<RwLock<VecDeque<ExecutionEntry>>>,
}

impl ExecutionLog {
    /// `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Arc::new(RwLock::new(VecDeque::new())),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn record(&self, entry: ExecutionEntry) {
        let mut g = self.inner.write().await;
        g.push_back(entry);
        while g.len() > self.capacity {
            g.pop_front();
        }
    }

    /// Snapshot of all retained entries, oldest first.
    pub async fn entries(&self) -> Vec<ExecutionEntry> {
        self.inner.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
