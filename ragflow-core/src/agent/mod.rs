//! Agent Loop (C7): a ReAct controller driving a [`ChatModel`] with tool-call
//! ability.
//!
//! State machine per invocation: `plan -> think -> tool_call? -> tool_result
//! -> reflect -> (loop) -> final_answer -> done`. Grounded on the teacher's
//! think/act/observe node split, collapsed here into one loop since the
//! event bus (not a state graph) now carries step transitions.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::bus::{BusEvent, EventBus, EventType};
use crate::error::CoreError;
use crate::llm::{ChatModel, ChatOptions, ToolChoiceMode, ToolDeclaration};
use crate::message::ChatMessage;
use crate::model::{AgentStep, AgentStepKind, SearchResult};
use crate::tool_source::{ToolCallContext, ToolSource};

/// Per-agent config, resolved by the Tenant Config Resolver (C10) before the
/// loop starts.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub allowed_tools: Vec<String>,
    pub max_iterations: u32,
    pub temperature: f32,
    pub reflection_enabled: bool,
    pub system_prompt: String,
}

impl AgentConfig {
    /// Validates the bounds from SPEC_FULL §7: `max_iterations` in `[1,
    /// 30]`, `temperature` in `[0, 2]`.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(1..=30).contains(&self.max_iterations) {
            return Err(CoreError::Validation(format!(
                "max_iterations must be in [1, 30], got {}",
                self.max_iterations
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(CoreError::Validation(format!(
                "temperature must be in [0, 2], got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

/// Drives one agent invocation end to end.
pub struct AgentLoop {
    chat_model: Arc<dyn ChatModel>,
    tool_source: Arc<dyn ToolSource>,
    bus: EventBus,
    config: AgentConfig,
}

/// Outcome of a finished agent run.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub final_answer: String,
    pub steps: Vec<AgentStep>,
    pub references: Vec<SearchResult>,
    pub iterations_used: u32,
    pub stopped: bool,
}

fn tool_declarations(specs: &[crate::tool_source::ToolSpec], allowed: &[String]) -> Vec<ToolDeclaration> {
    let allowed: HashSet<&str> = allowed.iter().map(String::as_str).collect();
    specs
        .iter()
        .filter(|s| allowed.is_empty() || allowed.contains(s.name.as_str()))
        .map(|s| ToolDeclaration {
            name: s.name.clone(),
            description: s.description.clone().unwrap_or_default(),
            input_schema: s.input_schema.clone(),
        })
        .collect()
}

/// Heuristic used by `reflection_enabled`: the answer looks incomplete if it
/// is empty or references were produced but never mentioned.
fn looks_incomplete(answer: &str, references: &[SearchResult]) -> bool {
    if answer.trim().is_empty() {
        return true;
    }
    !references.is_empty() && references.iter().all(|r| !answer.contains(&r.chunk_id))
}

impl AgentLoop {
    pub fn new(
        chat_model: Arc<dyn ChatModel>,
        tool_source: Arc<dyn ToolSource>,
        bus: EventBus,
        config: AgentConfig,
    ) -> Self {
        Self { chat_model, tool_source, bus, config }
    }

    /// Runs the ReAct loop for one request. `cancellation` is expected to be
    /// wired to the bus's `stop` event by the caller (C8 facade).
    pub async fn run(
        &self,
        request_id: &str,
        user_query: &str,
        cancellation: CancellationToken,
    ) -> Result<AgentOutcome, CoreError> {
        self.config.validate()?;

        let tool_specs = self
            .tool_source
            .list_tools()
            .await
            .map_err(|e| CoreError::Upstream(e.to_string()))?;
        let declarations = tool_declarations(&tool_specs, &self.config.allowed_tools);

        let mut history = vec![ChatMessage::system(&self.config.system_prompt), ChatMessage::user(user_query)];
        let mut steps: Vec<AgentStep> = Vec::new();
        let mut references: Vec<SearchResult> = Vec::new();
        let mut seen_call_ids: HashSet<String> = HashSet::new();
        let mut final_answer = String::new();
        let mut stopped = false;
        let mut iterations_used = 0;

        for iteration in 0..self.config.max_iterations {
            iterations_used = iteration + 1;
            if cancellation.is_cancelled() {
                stopped = true;
                break;
            }

            let options = ChatOptions {
                tools: declarations.clone(),
                tool_choice: ToolChoiceMode::Auto,
                temperature: self.config.temperature,
            };
            let response = self.chat_model.chat(&history, &options).await?;

            if !response.content.is_empty() {
                let index = steps.len() as u32;
                self.bus
                    .emit(
                        BusEvent::new(EventType::AgentThought, request_id)
                            .with_content(response.content.clone()),
                    )
                    .await;
                steps.push(AgentStep {
                    index,
                    kind: AgentStepKind::Thought,
                    content: response.content.clone(),
                    tool_name: None,
                    tool_args: None,
                    tool_output: None,
                    duration_ms: None,
                    success: None,
                });
            }

            if response.tool_calls.is_empty() {
                final_answer = response.content;
                history.push(ChatMessage::assistant(&final_answer));

                if self.config.reflection_enabled && looks_incomplete(&final_answer, &references) {
                    let index = steps.len() as u32;
                    self.bus.emit(BusEvent::new(EventType::AgentReflection, request_id)).await;
                    steps.push(AgentStep {
                        index,
                        kind: AgentStepKind::Reflection,
                        content: "answer looks incomplete, retrying".to_string(),
                        tool_name: None,
                        tool_args: None,
                        tool_output: None,
                        duration_ms: None,
                        success: None,
                    });
                    history.push(ChatMessage::user(
                        "Your previous answer looked incomplete. Use the available tools and try again.",
                    ));
                    continue;
                }
                break;
            }

            for tool_call in &response.tool_calls {
                if cancellation.is_cancelled() {
                    stopped = true;
                    break;
                }
                if !seen_call_ids.insert(tool_call.call_id.clone()) {
                    return Err(CoreError::Internal(format!(
                        "duplicate tool_call id within request: {}",
                        tool_call.call_id
                    )));
                }

                let call_index = steps.len() as u32;
                self.bus
                    .emit(
                        BusEvent::new(EventType::AgentToolCall, request_id)
                            .with_content(tool_call.name.clone()),
                    )
                    .await;
                steps.push(AgentStep {
                    index: call_index,
                    kind: AgentStepKind::ToolCall,
                    content: tool_call.name.clone(),
                    tool_name: Some(tool_call.name.clone()),
                    tool_args: Some(tool_call.arguments.clone()),
                    tool_output: None,
                    duration_ms: None,
                    success: None,
                });

                let ctx = ToolCallContext::new(history.clone());
                let started = std::time::Instant::now();
                let result = self
                    .tool_source
                    .call_tool_with_context(&tool_call.name, tool_call.arguments.clone(), Some(&ctx))
                    .await;
                let duration_ms = started.elapsed().as_millis() as u64;

                let (success, output_text) = match &result {
                    Ok(content) => (true, content.text.clone()),
                    Err(err) => (false, err.to_string()),
                };

                let result_index = steps.len() as u32;
                self.bus
                    .emit(
                        BusEvent::new(EventType::AgentToolResult, request_id)
                            .with_content(output_text.clone())
                            .with_done(success),
                    )
                    .await;
                steps.push(AgentStep {
                    index: result_index,
                    kind: AgentStepKind::ToolResult,
                    content: output_text.clone(),
                    tool_name: Some(tool_call.name.clone()),
                    tool_args: None,
                    tool_output: Some(output_text.clone()),
                    duration_ms: Some(duration_ms),
                    success: Some(success),
                });

                history.push(ChatMessage::tool(tool_call.call_id.clone(), output_text));
            }

            if stopped {
                break;
            }

            self.bus
                .emit(BusEvent {
                    references: Some(references.clone()),
                    ..BusEvent::new(EventType::AgentReferences, request_id)
                })
                .await;
        }

        if stopped {
            final_answer = "stopped by user".to_string();
        }

        self.bus
            .emit(
                BusEvent::new(EventType::AgentFinalAnswer, request_id)
                    .with_content(final_answer.clone())
                    .with_done(true),
            )
            .await;

        self.bus
            .emit(
                BusEvent::new(EventType::AgentComplete, request_id)
                    .with_content(final_answer.clone())
                    .with_done(true),
            )
            .await;

        Ok(AgentOutcome { final_answer, steps, references, iterations_used, stopped })
    }
}
