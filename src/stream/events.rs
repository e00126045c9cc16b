use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Event model
// ---------------------------------------------------------------------------

/// Coarse classification of agent tools, used for phase display and grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolCategory {
    Read,
    Write,
    Command,
    Meta,
}

impl ToolCategory {
    /// Fixed lookup from tool name; unknown tools are `Meta`.
    pub fn from_tool_name(name: &str) -> Self {
        match name {
            "Read" | "Glob" | "Grep" | "LS" | "NotebookRead" | "WebFetch" | "WebSearch" => {
                Self::Read
            }
            "Write" | "Edit" | "MultiEdit" | "NotebookEdit" => Self::Write,
            "Bash" | "BashOutput" | "KillShell" => Self::Command,
            _ => Self::Meta,
        }
    }
}

/// One unit of information decoded from the agent's output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Thought {
        text: String,
        /// Set for extended-thinking blocks, which are not addressed to the user.
        reasoning: bool,
        timestamp: DateTime<Utc>,
    },
    ToolStart {
        tool_use_id: String,
        name: String,
        category: ToolCategory,
        input: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
    ToolComplete {
        tool_use_id: String,
        duration_ms: u64,
        is_error: bool,
        timestamp: DateTime<Utc>,
    },
    Result {
        text: Option<String>,
        timestamp: DateTime<Utc>,
    },
    Fatal {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

// ---------------------------------------------------------------------------
// stdout wire records (stream-json)
// ---------------------------------------------------------------------------

/// Top-level records from Claude CLI `--output-format stream-json`
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WireRecord {
    #[serde(rename = "assistant")]
    Assistant { message: WireMessage },

    #[serde(rename = "user")]
    User { message: WireMessage },

    #[serde(rename = "result")]
    Result {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        is_error: bool,
    },

    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: Option<serde_json::Value>,
        #[serde(default)]
        message: Option<String>,
    },

    // system, keep_alive, stream_event, control_response...
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: WireContent,
}

/// User echoes carry a plain string, tool traffic carries blocks.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireContent {
    Blocks(Vec<ContentBlock>),
    Text(String),
}

impl Default for WireContent {
    fn default() -> Self {
        Self::Blocks(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "thinking")]
    Thinking {
        #[serde(default)]
        thinking: String,
    },

    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        #[serde(default)]
        tool_use_id: Option<String>,
        #[serde(default)]
        is_error: Option<bool>,
    },

    #[serde(other)]
    Other,
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Turns stream-json lines into [`StreamEvent`]s.
///
/// Keeps the start timestamp of every tool it has seen so completions can
/// report a duration. A completion without a known start reports 0 ms.
#[derive(Debug, Default)]
pub struct EventDecoder {
    started: HashMap<String, DateTime<Utc>>,
    anonymous_tools: u64,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one output line observed at `at`.
    ///
    /// Returns `None` when the line is not a valid record. Blank lines and
    /// records that carry nothing of interest yield an empty vector.
    pub fn decode_line(&mut self, line: &str, at: DateTime<Utc>) -> Option<Vec<StreamEvent>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Some(Vec::new());
        }
        let record: WireRecord = serde_json::from_str(trimmed).ok()?;
        Some(self.decode(record, at))
    }

    fn decode(&mut self, record: WireRecord, at: DateTime<Utc>) -> Vec<StreamEvent> {
        match record {
            WireRecord::Assistant { message } => self.decode_assistant(message, at),
            WireRecord::User { message } => self.decode_user(message, at),
            WireRecord::Result {
                subtype,
                result,
                is_error,
            } => {
                let mut events = vec![StreamEvent::Result {
                    text: result.clone(),
                    timestamp: at,
                }];
                if is_error {
                    let message = result
                        .filter(|r| !r.trim().is_empty())
                        .or(subtype)
                        .unwrap_or_else(|| "agent reported an error".to_string());
                    events.push(StreamEvent::Fatal {
                        message,
                        timestamp: at,
                    });
                }
                events
            }
            WireRecord::Error { error, message } => {
                let message = message
                    .or_else(|| error.as_ref().and_then(error_message))
                    .unwrap_or_else(|| "unknown agent error".to_string());
                vec![StreamEvent::Fatal {
                    message,
                    timestamp: at,
                }]
            }
            WireRecord::Other => Vec::new(),
        }
    }

    fn decode_assistant(&mut self, message: WireMessage, at: DateTime<Utc>) -> Vec<StreamEvent> {
        let blocks = match message.content {
            WireContent::Blocks(blocks) => blocks,
            WireContent::Text(text) => vec![ContentBlock::Text { text }],
        };

        let mut events = Vec::new();
        for block in blocks {
            match block {
                ContentBlock::Text { text } => {
                    if !text.trim().is_empty() {
                        events.push(StreamEvent::Thought {
                            text,
                            reasoning: false,
                            timestamp: at,
                        });
                    }
                }
                ContentBlock::Thinking { thinking } => {
                    if !thinking.trim().is_empty() {
                        events.push(StreamEvent::Thought {
                            text: thinking,
                            reasoning: true,
                            timestamp: at,
                        });
                    }
                }
                ContentBlock::ToolUse { id, name, input } => {
                    let tool_use_id = id.unwrap_or_else(|| {
                        self.anonymous_tools += 1;
                        format!("anonymous-{}", self.anonymous_tools)
                    });
                    self.started.insert(tool_use_id.clone(), at);
                    events.push(StreamEvent::ToolStart {
                        tool_use_id,
                        category: ToolCategory::from_tool_name(&name),
                        name,
                        input,
                        timestamp: at,
                    });
                }
                ContentBlock::ToolResult { .. } | ContentBlock::Other => {}
            }
        }
        events
    }

    fn decode_user(&mut self, message: WireMessage, at: DateTime<Utc>) -> Vec<StreamEvent> {
        let WireContent::Blocks(blocks) = message.content else {
            return Vec::new();
        };

        blocks
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::ToolResult {
                    tool_use_id: Some(tool_use_id),
                    is_error,
                } => {
                    let duration_ms = self
                        .started
                        .remove(&tool_use_id)
                        .map(|start| (at - start).num_milliseconds().max(0) as u64)
                        .unwrap_or(0);
                    Some(StreamEvent::ToolComplete {
                        tool_use_id,
                        duration_ms,
                        is_error: is_error.unwrap_or(false),
                        timestamp: at,
                    })
                }
                _ => None,
            })
            .collect()
    }
}

fn error_message(value: &serde_json::Value) -> Option<String> {
    value
        .as_str()
        .map(str::to_string)
        .or_else(|| {
            value
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
    }

    #[test]
    fn test_category_lookup() {
        assert_eq!(ToolCategory::from_tool_name("Read"), ToolCategory::Read);
        assert_eq!(ToolCategory::from_tool_name("Grep"), ToolCategory::Read);
        assert_eq!(ToolCategory::from_tool_name("Edit"), ToolCategory::Write);
        assert_eq!(ToolCategory::from_tool_name("Bash"), ToolCategory::Command);
        assert_eq!(ToolCategory::from_tool_name("Task"), ToolCategory::Meta);
        assert_eq!(ToolCategory::from_tool_name("mcp__x__y"), ToolCategory::Meta);
    }

    #[test]
    fn test_assistant_text_and_tool_use() {
        let mut decoder = EventDecoder::new();
        let line = r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"text","text":"Looking at auth"},{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"/src/auth.ts"}}]}}"#;
        let events = decoder.decode_line(line, at(0)).unwrap();

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], StreamEvent::Thought { text, reasoning: false, .. } if text == "Looking at auth"));
        match &events[1] {
            StreamEvent::ToolStart {
                tool_use_id,
                name,
                category,
                input,
                ..
            } => {
                assert_eq!(tool_use_id, "t1");
                assert_eq!(name, "Read");
                assert_eq!(*category, ToolCategory::Read);
                assert_eq!(input["file_path"], "/src/auth.ts");
            }
            other => panic!("expected ToolStart, got {other:?}"),
        }
    }

    #[test]
    fn test_tool_result_reports_duration_from_start() {
        let mut decoder = EventDecoder::new();
        decoder.decode_line(
            r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"Bash","input":{}}]}}"#,
            at(0),
        );
        let events = decoder
            .decode_line(
                r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"t1","is_error":true,"content":"boom"}]}}"#,
                at(1500),
            )
            .unwrap();

        assert_eq!(
            events,
            vec![StreamEvent::ToolComplete {
                tool_use_id: "t1".into(),
                duration_ms: 1500,
                is_error: true,
                timestamp: at(1500),
            }]
        );
    }

    #[test]
    fn test_orphan_tool_result_has_zero_duration() {
        let mut decoder = EventDecoder::new();
        let events = decoder
            .decode_line(
                r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"ghost"}]}}"#,
                at(900),
            )
            .unwrap();
        assert!(matches!(
            &events[0],
            StreamEvent::ToolComplete { duration_ms: 0, is_error: false, .. }
        ));
    }

    #[test]
    fn test_user_plain_text_is_ignored() {
        let mut decoder = EventDecoder::new();
        let events = decoder
            .decode_line(r#"{"type":"user","message":{"role":"user","content":"hi"}}"#, at(0))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_result_and_error_result() {
        let mut decoder = EventDecoder::new();
        let ok = decoder
            .decode_line(
                r#"{"type":"result","subtype":"success","result":"All done","is_error":false}"#,
                at(0),
            )
            .unwrap();
        assert_eq!(ok.len(), 1);
        assert!(matches!(&ok[0], StreamEvent::Result { text: Some(t), .. } if t == "All done"));

        let failed = decoder
            .decode_line(
                r#"{"type":"result","subtype":"error_max_turns","is_error":true}"#,
                at(0),
            )
            .unwrap();
        assert_eq!(failed.len(), 2);
        assert!(
            matches!(&failed[1], StreamEvent::Fatal { message, .. } if message == "error_max_turns")
        );
    }

    #[test]
    fn test_error_record_is_fatal() {
        let mut decoder = EventDecoder::new();
        let events = decoder
            .decode_line(
                r#"{"type":"error","error":{"message":"Connection timed out"}}"#,
                at(0),
            )
            .unwrap();
        assert!(
            matches!(&events[0], StreamEvent::Fatal { message, .. } if message == "Connection timed out")
        );
    }

    #[test]
    fn test_unknown_and_blank_lines_yield_nothing() {
        let mut decoder = EventDecoder::new();
        assert_eq!(decoder.decode_line(r#"{"type":"keep_alive"}"#, at(0)), Some(vec![]));
        assert_eq!(
            decoder.decode_line(r#"{"type":"system","subtype":"init"}"#, at(0)),
            Some(vec![])
        );
        assert_eq!(decoder.decode_line("   ", at(0)), Some(vec![]));
    }

    #[test]
    fn test_malformed_line_is_rejected() {
        let mut decoder = EventDecoder::new();
        assert_eq!(decoder.decode_line(r#"{"type":"assistant","mess"#, at(0)), None);
        assert_eq!(decoder.decode_line("plain text output", at(0)), None);
    }

    #[test]
    fn test_empty_thought_is_skipped() {
        let mut decoder = EventDecoder::new();
        let events = decoder
            .decode_line(
                r#"{"type":"assistant","message":{"content":[{"type":"text","text":"  "},{"type":"thinking","thinking":"hmm"}]}}"#,
                at(0),
            )
            .unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            StreamEvent::Thought { text, reasoning: true, .. } if text == "hmm"
        ));
    }
}
