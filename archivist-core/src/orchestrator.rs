//! Reasoning orchestrator.
//!
//! Drives the tool-use loop: each step is one completion call that either
//! asks for tool calls, which are executed and fed back, or answers.

use crate::config::ArchivistConfig;
use crate::engine::CompletionEngine;
use crate::store::{RecordStore, StoreError};
use crate::tools::{CampaignTools, ToolCall};
use crate::transcript::{ToolCallRequest, Transcript, TranscriptEntry};
use claude::{Request, StopReason};
use std::sync::Arc;
use thiserror::Error;

const ARCHIVIST_PROMPT: &str = include_str!("prompts/archivist.txt");

/// Errors that end a run without an answer.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Completion engine error: {0}")]
    Engine(#[from] claude::Error),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("No answer after {max_steps} steps")]
    StepLimitExceeded { max_steps: usize },
}

/// A finished run.
#[derive(Debug, Clone)]
pub struct Run {
    pub transcript: Transcript,
    /// Completion calls made.
    pub steps: usize,
}

/// Runs questions through the completion engine and the retrieval tools.
pub struct Orchestrator {
    engine: Arc<dyn CompletionEngine>,
    store: Arc<dyn RecordStore>,
    system_prompt: String,
    model: Option<String>,
    max_tokens: usize,
    max_steps: usize,
}

impl Orchestrator {
    pub fn new(
        engine: Arc<dyn CompletionEngine>,
        store: Arc<dyn RecordStore>,
        config: &ArchivistConfig,
    ) -> Self {
        Self {
            engine,
            store,
            system_prompt: system_prompt(&config.language),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_steps: config.max_steps,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Answer `question`, returning the full transcript of the run.
    pub async fn run(&self, question: &str) -> Result<Run, OrchestratorError> {
        let mut transcript = Transcript::new(question);

        for step in 1..=self.max_steps {
            let mut request = Request::new(transcript.to_messages())
                .with_system(&self.system_prompt)
                .with_max_tokens(self.max_tokens)
                .with_tools(CampaignTools::all());
            if let Some(ref model) = self.model {
                request = request.with_model(model);
            }

            let response = self.engine.complete(request).await?;
            let tool_uses = response.tool_uses();

            // If no tool calls or stop reason isn't ToolUse, we're done
            if response.stop_reason != StopReason::ToolUse || tool_uses.is_empty() {
                transcript.push(TranscriptEntry::FinalAnswer {
                    content: response.text().into(),
                });
                tracing::debug!(steps = step, "Run finished");
                return Ok(Run {
                    transcript,
                    steps: step,
                });
            }

            transcript.push(TranscriptEntry::ToolCallDirective {
                preamble: response.text(),
                calls: tool_uses
                    .iter()
                    .map(|tool_use| ToolCallRequest {
                        id: tool_use.id.clone(),
                        name: tool_use.name.clone(),
                        arguments: tool_use.input.clone(),
                    })
                    .collect(),
            });

            for tool_use in tool_uses {
                tracing::info!(tool = %tool_use.name, step, "Dispatching tool call");
                let (content, is_error) = match ToolCall::parse(&tool_use.name, &tool_use.input) {
                    Ok(call) => (call.execute(self.store.as_ref()).await?, false),
                    Err(e) => {
                        tracing::warn!(error = %e, "Rejected tool call");
                        (e.to_string(), true)
                    }
                };
                transcript.push(TranscriptEntry::ToolResult {
                    call_id: tool_use.id,
                    content: content.into(),
                    is_error,
                });
            }
        }

        tracing::warn!(max_steps = self.max_steps, "Step limit reached without an answer");
        Err(OrchestratorError::StepLimitExceeded {
            max_steps: self.max_steps,
        })
    }
}

/// The narrator instructions for a given answer language.
pub fn system_prompt(language: &str) -> String {
    ARCHIVIST_PROMPT.replace("{language}", language)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_carries_language_and_constraints() {
        let prompt = system_prompt("French");
        assert!(prompt.contains("Always answer in French."));
        assert!(!prompt.contains("{language}"));
        assert!(prompt.contains("Fabricate NOTHING"));
        assert!(prompt.contains("get_session_timeline"));
    }
}
