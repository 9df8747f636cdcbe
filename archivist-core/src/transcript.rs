//! The orchestrator's run transcript.
//!
//! Every message of a run is one of four closed variants, so consumers match
//! exhaustively instead of probing for optional fields.

use claude::{ContentBlock, Message, Role, ToolContent};
use serde_json::Value;

/// A tool call declared by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    /// Call identifier, echoed back by the matching tool result.
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One entry of a run transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEntry {
    /// The (corrected) question.
    User { text: String },
    /// An assistant turn asking for one or more tool calls.
    ToolCallDirective {
        /// Any text the model wrote before its calls.
        preamble: String,
        calls: Vec<ToolCallRequest>,
    },
    /// Output of one tool call.
    ToolResult {
        call_id: String,
        content: ToolContent,
        is_error: bool,
    },
    /// The assistant's closing answer.
    FinalAnswer { content: ToolContent },
}

impl TranscriptEntry {
    /// Plain text carried by the entry, whatever its variant.
    pub fn text(&self) -> String {
        match self {
            TranscriptEntry::User { text } => text.clone(),
            TranscriptEntry::ToolCallDirective { preamble, .. } => preamble.clone(),
            TranscriptEntry::ToolResult { content, .. }
            | TranscriptEntry::FinalAnswer { content } => plain_text(content),
        }
    }
}

/// Concatenate the text of a payload, in order. Non-text blocks are skipped.
pub fn plain_text(content: &ToolContent) -> String {
    match content {
        ToolContent::Text(text) => text.clone(),
        ToolContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join(""),
    }
}

/// Ordered record of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    /// Start a transcript with the user's question.
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            entries: vec![TranscriptEntry::User {
                text: question.into(),
            }],
        }
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<TranscriptEntry> {
        self.entries
    }

    /// Render as Messages API conversation.
    ///
    /// Consecutive tool results are merged into a single user message, as the
    /// API expects every result of a turn in the next user message.
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages: Vec<Message> = Vec::new();

        for entry in &self.entries {
            match entry {
                TranscriptEntry::User { text } => messages.push(Message::user(text.clone())),
                TranscriptEntry::ToolCallDirective { preamble, calls } => {
                    let mut content = Vec::with_capacity(calls.len() + 1);
                    if !preamble.is_empty() {
                        content.push(ContentBlock::Text {
                            text: preamble.clone(),
                        });
                    }
                    content.extend(calls.iter().map(|call| ContentBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input: call.arguments.clone(),
                    }));
                    messages.push(Message {
                        role: Role::Assistant,
                        content,
                    });
                }
                TranscriptEntry::ToolResult {
                    call_id,
                    content,
                    is_error,
                } => {
                    let block = ContentBlock::ToolResult {
                        tool_use_id: call_id.clone(),
                        content: content.clone(),
                        is_error: *is_error,
                    };
                    match messages.last_mut() {
                        Some(last)
                            if last.role == Role::User
                                && matches!(
                                    last.content.last(),
                                    Some(ContentBlock::ToolResult { .. })
                                ) =>
                        {
                            last.content.push(block);
                        }
                        _ => messages.push(Message {
                            role: Role::User,
                            content: vec![block],
                        }),
                    }
                }
                TranscriptEntry::FinalAnswer { content } => {
                    messages.push(Message::assistant(plain_text(content)));
                }
            }
        }

        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str, name: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            name: name.to_string(),
            arguments: json!({}),
        }
    }

    fn result(id: &str, text: &str) -> TranscriptEntry {
        TranscriptEntry::ToolResult {
            call_id: id.to_string(),
            content: text.into(),
            is_error: false,
        }
    }

    #[test]
    fn test_plain_text_joins_text_blocks() {
        let content = ToolContent::Blocks(vec![
            ContentBlock::Text {
                text: "first ".to_string(),
            },
            ContentBlock::Thinking {
                thinking: "hidden".to_string(),
            },
            ContentBlock::Text {
                text: "second".to_string(),
            },
        ]);
        assert_eq!(plain_text(&content), "first second");
        assert_eq!(plain_text(&ToolContent::Text("plain".into())), "plain");
    }

    #[test]
    fn test_results_of_one_turn_share_a_message() {
        let mut transcript = Transcript::new("Who is Imoen?");
        transcript.push(TranscriptEntry::ToolCallDirective {
            preamble: "Let me look.".to_string(),
            calls: vec![call("a", "get_entity_card"), call("b", "get_entity_events")],
        });
        transcript.push(result("a", "card"));
        transcript.push(result("b", "events"));

        let messages = transcript.to_messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content.len(), 3);
        assert_eq!(messages[2].role, Role::User);
        assert_eq!(messages[2].content.len(), 2);
    }

    #[test]
    fn test_question_is_not_merged_with_results() {
        let mut transcript = Transcript::new("q");
        transcript.push(TranscriptEntry::ToolCallDirective {
            preamble: String::new(),
            calls: vec![call("a", "search_events")],
        });
        transcript.push(result("a", "hits"));
        transcript.push(TranscriptEntry::FinalAnswer {
            content: "done".into(),
        });

        let messages = transcript.to_messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], Message::user("q"));
        assert_eq!(messages[1].content.len(), 1);
        assert_eq!(messages[3], Message::assistant("done"));
    }
}
