//! Tool invocation trace.
//!
//! Walks a finished transcript and pairs every tool result with the call
//! that requested it, producing the ordered trace shown next to an answer.

use crate::transcript::{plain_text, TranscriptEntry};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Result previews keep at most this many characters before the ellipsis.
pub const PREVIEW_LIMIT: usize = 300;

/// One resolved tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInvocationRecord {
    pub tool_name: String,
    pub arguments: Value,
    pub result_preview: String,
}

/// Trace of a run plus its final answer text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trace {
    /// Records in the order their results arrived.
    pub records: Vec<ToolInvocationRecord>,
    pub final_answer: String,
}

/// Truncate to [`PREVIEW_LIMIT`] characters, appending `...` when cut.
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_LIMIT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Rebuild the invocation trace of a transcript.
///
/// Results are recorded in resolution order, not declaration order. A result
/// whose call was never declared (or was already resolved) is skipped. The
/// final answer is the text of the last entry, whatever its kind.
pub fn extract_trace(entries: &[TranscriptEntry]) -> Trace {
    let mut pending: HashMap<&str, (&str, &Value)> = HashMap::new();
    let mut records = Vec::new();

    for entry in entries {
        match entry {
            TranscriptEntry::ToolCallDirective { calls, .. } => {
                for call in calls {
                    pending.insert(call.id.as_str(), (call.name.as_str(), &call.arguments));
                }
            }
            TranscriptEntry::ToolResult {
                call_id, content, ..
            } => match pending.remove(call_id.as_str()) {
                Some((name, arguments)) => records.push(ToolInvocationRecord {
                    tool_name: name.to_string(),
                    arguments: arguments.clone(),
                    result_preview: preview(&plain_text(content)),
                }),
                None => {
                    tracing::warn!(
                        call_id = %call_id,
                        "Tool result without a pending call, skipping"
                    );
                }
            },
            TranscriptEntry::User { .. } | TranscriptEntry::FinalAnswer { .. } => {}
        }
    }

    let final_answer = entries
        .last()
        .map(TranscriptEntry::text)
        .unwrap_or_default();

    Trace {
        records,
        final_answer,
    }
}
