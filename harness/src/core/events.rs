//! Closed event taxonomy for the engine's streamed output.
//!
//! The engine emits one JSON document per line. Each line maps to zero or
//! more [`AgentEvent`]s; unknown message or block types are skipped so newer
//! engines remain consumable. Consumers match exhaustively over the enum.

use serde_json::Value;

/// Truncate tool-invocation argument previews beyond this many characters.
const INPUT_PREVIEW_LIMIT: usize = 200;
/// Truncate tool-result error payloads beyond this many characters.
const ERROR_PREVIEW_LIMIT: usize = 500;

/// How a single tool invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolDisposition {
    Ok,
    /// The tool reported an error. Surfaced for visibility, never terminal.
    Error(String),
    /// The command-validation hook vetoed the action.
    Blocked(String),
}

/// One typed event from the engine stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// Free assistant text, appended to the accumulated response.
    AssistantText(String),
    /// A tool call started. Informational only.
    ToolInvocation { name: String, input_preview: String },
    /// A tool call finished.
    ToolResult(ToolDisposition),
}

impl AgentEvent {
    /// Parse one JSONL line from the engine into events.
    pub fn parse_line(line: &str) -> Vec<AgentEvent> {
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            return Vec::new();
        };
        let Some(blocks) = value.pointer("/message/content").and_then(Value::as_array) else {
            return Vec::new();
        };

        let mut events = Vec::new();
        match value.get("type").and_then(Value::as_str) {
            Some("assistant") => {
                for block in blocks {
                    match block.get("type").and_then(Value::as_str) {
                        Some("text") => {
                            if let Some(text) = block.get("text").and_then(Value::as_str) {
                                events.push(AgentEvent::AssistantText(text.to_string()));
                            }
                        }
                        Some("tool_use") => {
                            let name = block
                                .get("name")
                                .and_then(Value::as_str)
                                .unwrap_or("unknown")
                                .to_string();
                            let input = block.get("input").map(Value::to_string).unwrap_or_default();
                            events.push(AgentEvent::ToolInvocation {
                                name,
                                input_preview: truncate(&input, INPUT_PREVIEW_LIMIT),
                            });
                        }
                        _ => {}
                    }
                }
            }
            Some("user") => {
                for block in blocks {
                    if block.get("type").and_then(Value::as_str) == Some("tool_result") {
                        events.push(AgentEvent::ToolResult(classify_result(block)));
                    }
                }
            }
            _ => {}
        }
        events
    }
}

fn classify_result(block: &Value) -> ToolDisposition {
    let content = block.get("content").map(render_content).unwrap_or_default();
    // The validation hook reports vetoed commands through the result payload.
    if content.to_lowercase().contains("blocked") {
        return ToolDisposition::Blocked(truncate(&content, ERROR_PREVIEW_LIMIT));
    }
    if block
        .get("is_error")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        return ToolDisposition::Error(truncate(&content, ERROR_PREVIEW_LIMIT));
    }
    ToolDisposition::Ok
}

fn render_content(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Truncate on a char boundary, appending an ellipsis marker when cut.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{cut}...")
}
