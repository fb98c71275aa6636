//! Response generation: session lookup, pipeline call, action extraction, history and
//! execution-log updates.
//!
//! [`Responder::respond`] never fails. Pipeline errors are logged and replaced by the
//! configured apology text so the webhook always has something to send.

use crate::actions::extract_actions;
use crate::monitoring::{ExecutionEntry, ExecutionLog};
use crate::pipeline::{ReplyPipeline, ReplyRequest};
use crate::session::{SessionStore, Turn};
use std::sync::Arc;
use std::time::Instant;

/// Reply produced for one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    /// Follow-up action labels extracted from `text` (empty on fallback).
    pub actions: Vec<String>,
    /// Reasoning-stage text when the two-stage pipeline ran.
    pub reasoning: Option<String>,
    /// True when `text` is the apology fallback.
    pub fallback: bool,
}

pub struct Responder {
    sessions: Arc<SessionStore>,
    executions: Arc<ExecutionLog>,
    pipeline: Arc<dyn ReplyPipeline>,
    error_message: String,
}

impl Responder {
    pub fn new(
        sessions: Arc<SessionStore>,
        executions: Arc<ExecutionLog>,
        pipeline: Arc<dyn ReplyPipeline>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            sessions,
            executions,
            pipeline,
            error_message: error_message.into(),
        }
    }

    pub async fn respond(&self, conversation_id: &str, input: &str) -> Reply {
        self.sessions.touch(conversation_id).await;
        let history = self.sessions.get(conversation_id).await;
        log::info!(
            "responder: processing input from {} ({} turns of history)",
            conversation_id,
            history.len()
        );

        let started = Instant::now();
        let output = match self
            .pipeline
            .generate(ReplyRequest {
                history: &history,
                input,
            })
            .await
        {
            Ok(o) => o,
            Err(e) => {
                log::error!(
                    "responder: {} pipeline failed for {}: {}",
                    self.pipeline.name(),
                    conversation_id,
                    e
                );
                return Reply {
                    text: self.error_message.clone(),
                    actions: Vec::new(),
                    reasoning: None,
                    fallback: true,
                };
            }
        };
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let actions = extract_actions(&output.text);
        log::info!(
            "responder: reply for {} in {} ms with {} action(s)",
            conversation_id,
            latency_ms,
            actions.len()
        );
        log::debug!("responder: extracted actions {:?}", actions);

        self.sessions
            .record_exchange(
                conversation_id,
                Turn::inbound(input),
                Turn::outbound(output.text.clone()),
            )
            .await;
        self.executions
            .record(ExecutionEntry::new(
                conversation_id,
                input,
                output.text.clone(),
                output.reasoning.clone(),
                latency_ms,
            ))
            .await;

        Reply {
            text: output.text,
            actions,
            reasoning: output.reasoning,
            fallback: false,
        }
    }
}
