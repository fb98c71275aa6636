//! Reply pipelines: turn (history, input) into reply text through one or two model calls.
//!
//! The dispatcher never sees the staging; it calls [`ReplyPipeline::generate`] and gets text
//! back. Which pipeline runs is configuration ([`crate::config::PipelineMode`]).

use crate::config::{AgentsConfig, PipelineMode};
use crate::llm::{ChatMessage, LlmBackend, LlmError};
use crate::session::Turn;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Placeholder replaced by the stage input in prompt templates.
pub const TEMPLATE_INPUT_PLACEHOLDER: &str = "{input}";

/// Input for one pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct ReplyRequest<'a> {
    pub history: &'a [Turn],
    pub input: &'a str,
}

/// Output of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub text: String,
    /// Intermediate reasoning text (two-stage only).
    pub reasoning: Option<String>,
}

/// Node in the static pipeline graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub id: &'static str,
    pub label: &'static str,
}

/// Edge in the static pipeline graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphEdge {
    pub from: &'static str,
    pub to: &'static str,
}

/// Static description of a pipeline for the visualization endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

fn chain_graph(nodes: &[(&'static str, &'static str)]) -> PipelineGraph {
    PipelineGraph {
        nodes: nodes
            .iter()
            .map(|&(id, label)| GraphNode { id, label })
            .collect(),
        edges: nodes
            .windows(2)
            .map(|w| GraphEdge {
                from: w[0].0,
                to: w[1].0,
            })
            .collect(),
    }
}

/// Text-in, text-out reply generation.
#[async_trait]
pub trait ReplyPipeline: Send + Sync {
    /// Short name ("singleStage" / "twoStage").
    fn name(&self) -> &'static str;

    fn graph(&self) -> PipelineGraph;

    async fn generate(&self, request: ReplyRequest<'_>) -> Result<PipelineOutput, LlmError>;
}

/// Replace every `{input}` in the template. A template without the placeholder gets the
/// input appended on a new line so it is never silently dropped.
pub fn render_template(template: &str, input: &str) -> String {
    if template.contains(TEMPLATE_INPUT_PLACEHOLDER) {
        template.replace(TEMPLATE_INPUT_PLACEHOLDER, input)
    } else {
        format!("{}\n{}", template, input)
    }
}

/// System message, then history mapped to chat roles, then the new user message.
fn build_messages(system_prompt: &str, history: &[Turn], user_content: String) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    if !system_prompt.trim().is_empty() {
        messages.push(ChatMessage::system(system_prompt));
    }
    messages.extend(
        history
            .iter()
            .map(|t| ChatMessage::new(t.role.chat_role(), t.content.clone())),
    );
    messages.push(ChatMessage::user(user_content));
    messages
}

/// One chat call with system prompt, history, and input.
pub struct SingleStagePipeline {
    backend: Arc<dyn LlmBackend>,
    model: String,
    system_prompt: String,
}

impl SingleStagePipeline {
    pub fn new(backend: Arc<dyn LlmBackend>, model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            system_prompt: system_prompt.into(),
        }
    }
}

#[async_trait]
impl ReplyPipeline for SingleStagePipeline {
    fn name(&self) -> &'static str {
        "singleStage"
    }

    fn graph(&self) -> PipelineGraph {
        chain_graph(&[
            ("promptTemplate", "Prompt Template"),
            ("llm", "LLM"),
            ("outputParser", "Output Parser"),
        ])
    }

    async fn generate(&self, request: ReplyRequest<'_>) -> Result<PipelineOutput, LlmError> {
        let messages = build_messages(&self.system_prompt, request.history, request.input.to_string());
        log::debug!(
            "pipeline: single-stage call via {} ({} messages)",
            self.backend.name(),
            messages.len()
        );
        let text = self.backend.chat(&self.model, messages).await?.into_text()?;
        Ok(PipelineOutput {
            text,
            reasoning: None,
        })
    }
}

/// Reasoning call followed by a formatting call over the reasoning text.
pub struct TwoStagePipeline {
    backend: Arc<dyn LlmBackend>,
    model: String,
    system_prompt: String,
    reasoning_template: String,
    formatting_template: String,
}

impl TwoStagePipeline {
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        reasoning_template: impl Into<String>,
        formatting_template: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            system_prompt: system_prompt.into(),
            reasoning_template: reasoning_template.into(),
            formatting_template: formatting_template.into(),
        }
    }
}

#[async_trait]
impl ReplyPipeline for TwoStagePipeline {
    fn name(&self) -> &'static str {
        "twoStage"
    }

    fn graph(&self) -> PipelineGraph {
        chain_graph(&[
            ("reasoningPrompt", "Reasoning Prompt"),
            ("reasoningLlm", "Reasoning LLM"),
            ("formattingPrompt", "Formatting Prompt"),
            ("formattingLlm", "Formatting LLM"),
            ("outputParser", "Output Parser"),
        ])
    }

    async fn generate(&self, request: ReplyRequest<'_>) -> Result<PipelineOutput, LlmError> {
        let reasoning_messages = build_messages(
            &self.system_prompt,
            request.history,
            render_template(&self.reasoning_template, request.input),
        );
        let reasoning = self
            .backend
            .chat(&self.model, reasoning_messages)
            .await?
            .into_text()?;
        log::debug!("pipeline: reasoning stage produced {} chars", reasoning.len());

        let formatting_messages = vec![ChatMessage::user(render_template(
            &self.formatting_template,
            &reasoning,
        ))];
        let text = self
            .backend
            .chat(&self.model, formatting_messages)
            .await?
            .into_text()?;
        Ok(PipelineOutput {
            text,
            reasoning: Some(reasoning),
        })
    }
}

/// Build the configured pipeline over the given backend.
pub fn build_pipeline(agents: &AgentsConfig, backend: Arc<dyn LlmBackend>) -> Arc<dyn ReplyPipeline> {
    match agents.pipeline {
        PipelineMode::SingleStage => Arc::new(SingleStagePipeline::new(
            backend,
            agents.model.clone(),
            agents.system_prompt.clone(),
        )),
        PipelineMode::TwoStage => Arc::new(TwoStagePipeline::new(
            backend,
            agents.model.clone(),
            agents.system_prompt.clone(),
            agents.reasoning_template.clone(),
            agents.formatting_template.clone(),
        )),
    }
}
