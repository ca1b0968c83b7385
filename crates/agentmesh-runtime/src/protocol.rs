//! Protocol Adapter (§4.8): bidirectional conversion between the internal
//! conversation representation the Event Pipeline works with and the
//! external wire `Part`/`Event` shapes (§6).

use base64::Engine;
use serde_json::{json, Value};

use crate::wire::{
    self, FilePayload, Metadata, Part, DATA_PART_TYPE_KEY, DATA_TYPE_CODE_EXECUTION_RESULT,
    DATA_TYPE_EXECUTABLE_CODE, DATA_TYPE_FUNCTION_CALL, DATA_TYPE_FUNCTION_RESPONSE,
    LONG_RUNNING_KEY, THOUGHT_KEY,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
    Tool,
}

impl Role {
    pub fn as_wire_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
            Role::Tool => "tool",
        }
    }
}

/// The internal, model-agnostic representation of one piece of
/// conversational content. The Event Pipeline only ever deals in these;
/// wire `Part`s are an I/O detail owned by this module.
#[derive(Debug, Clone)]
pub enum ContentPart {
    Text { text: String, thought: bool },
    File { uri: Option<String>, bytes: Option<Vec<u8>>, mime_type: Option<String> },
    FunctionCall { id: String, name: String, args: Value },
    FunctionResponse { id: String, name: String, response: Value },
    CodeExecutionResult { id: String, result: Value },
    ExecutableCode { id: String, code: Value },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into(), thought: false }
    }
}

#[derive(Debug, Clone)]
pub struct ConversationMessage {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl ConversationMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, parts: vec![ContentPart::text(text)] }
    }
}

/// Inbound: wire request parts → internal parts (§4.8 "Inbound").
pub fn inbound_parts(parts: Vec<Part>) -> Vec<ContentPart> {
    parts.into_iter().map(inbound_part).collect()
}

fn inbound_part(part: Part) -> ContentPart {
    match part {
        Part::Text { text, .. } => ContentPart::Text { text, thought: false },
        Part::File { file, .. } => match file {
            FilePayload::Uri { uri } => ContentPart::File { uri: Some(uri), bytes: None, mime_type: None },
            FilePayload::Inline { bytes, mime_type } => {
                let decoded = base64::engine::general_purpose::STANDARD.decode(bytes.as_bytes()).ok();
                ContentPart::File { uri: None, bytes: decoded, mime_type }
            }
        },
        Part::Data { data, metadata } => inbound_data_part(data, &metadata),
    }
}

fn inbound_data_part(data: Value, metadata: &Metadata) -> ContentPart {
    let tag = metadata.get(DATA_PART_TYPE_KEY).and_then(Value::as_str);
    match tag {
        Some(DATA_TYPE_FUNCTION_CALL) => ContentPart::FunctionCall {
            id: data.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
            name: data.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
            args: data.get("args").cloned().unwrap_or(json!({})),
        },
        Some(DATA_TYPE_FUNCTION_RESPONSE) => ContentPart::FunctionResponse {
            id: data.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
            name: data.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
            response: data.get("response").cloned().unwrap_or(json!({})),
        },
        Some(DATA_TYPE_CODE_EXECUTION_RESULT) => ContentPart::CodeExecutionResult {
            id: data.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
            result: data.clone(),
        },
        Some(DATA_TYPE_EXECUTABLE_CODE) => ContentPart::ExecutableCode {
            id: data.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
            code: data.clone(),
        },
        _ => ContentPart::Text { text: data.to_string(), thought: false },
    }
}

/// Outbound: internal parts → wire parts (§4.8 "Outbound"). `long_running`
/// carries the ids of tool-calls that must be tagged `is_long_running`.
pub fn outbound_parts(parts: &[ContentPart], long_running: &[String]) -> Vec<Part> {
    parts.iter().map(|p| outbound_part(p, long_running)).collect()
}

fn outbound_part(part: &ContentPart, long_running: &[String]) -> Part {
    match part {
        ContentPart::Text { text, thought } => {
            let mut metadata = Metadata::new();
            if *thought {
                metadata.insert(THOUGHT_KEY.to_string(), json!(true));
            }
            Part::Text { text: text.clone(), metadata }
        }
        ContentPart::File { uri, bytes, mime_type } => {
            let mut metadata = Metadata::new();
            if let Some(mime) = mime_type {
                metadata.insert("mimeType".to_string(), json!(mime));
            }
            let file = if let Some(bytes) = bytes {
                FilePayload::Inline {
                    bytes: base64::engine::general_purpose::STANDARD.encode(bytes),
                    mime_type: mime_type.clone(),
                }
            } else {
                FilePayload::Uri { uri: uri.clone().unwrap_or_default() }
            };
            Part::File { file, metadata }
        }
        ContentPart::FunctionCall { id, name, args } => {
            let mut metadata = Metadata::new();
            metadata.insert(DATA_PART_TYPE_KEY.to_string(), json!(DATA_TYPE_FUNCTION_CALL));
            if long_running.iter().any(|lr| lr == id) {
                metadata.insert(LONG_RUNNING_KEY.to_string(), json!(true));
            }
            Part::Data {
                data: json!({"id": id, "name": name, "args": args}),
                metadata,
            }
        }
        ContentPart::FunctionResponse { id, name, response } => {
            let mut metadata = Metadata::new();
            metadata.insert(DATA_PART_TYPE_KEY.to_string(), json!(DATA_TYPE_FUNCTION_RESPONSE));
            Part::Data {
                data: json!({"id": id, "name": name, "response": normalize_function_response(response.clone())}),
                metadata,
            }
        }
        ContentPart::CodeExecutionResult { result, .. } => {
            let mut metadata = Metadata::new();
            metadata.insert(DATA_PART_TYPE_KEY.to_string(), json!(DATA_TYPE_CODE_EXECUTION_RESULT));
            Part::Data { data: result.clone(), metadata }
        }
        ContentPart::ExecutableCode { code, .. } => {
            let mut metadata = Metadata::new();
            metadata.insert(DATA_PART_TYPE_KEY.to_string(), json!(DATA_TYPE_EXECUTABLE_CODE));
            Part::Data { data: code.clone(), metadata }
        }
    }
}

/// Normalize a tool's raw response into a `{result: ...}` envelope
/// (§4.8, top-level only — §9's nested-normalization decision).
pub fn normalize_function_response(response: Value) -> Value {
    if let Value::Object(ref map) = response {
        if map.contains_key("result") {
            return response;
        }
        if let Some(error) = map.get("error") {
            return json!({"result": {"error": error}, "isError": true});
        }
        if let Some(content) = map.get("content") {
            return json!({"result": {"content": content}});
        }
    }
    json!({"result": response})
}

pub fn outbound_status_event(
    task_id: &str,
    context_id: &str,
    long_running_ids: &[(String, String)],
    auth_request_function: &str,
    terminal: Option<wire::TaskState>,
    message: Option<String>,
    is_final: bool,
    partial: bool,
) -> wire::Event {
    let state = if let Some(terminal) = terminal {
        terminal
    } else if long_running_ids.iter().any(|(_, name)| name == auth_request_function) {
        wire::TaskState::AuthRequired
    } else if !long_running_ids.is_empty() {
        wire::TaskState::InputRequired
    } else {
        wire::TaskState::Working
    };

    wire::Event::status(task_id, context_id, state, message, is_final, partial)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bare_error_into_is_error_result() {
        let normalized = normalize_function_response(json!({"error": "boom"}));
        assert_eq!(normalized, json!({"result": {"error": "boom"}, "isError": true}));
    }

    #[test]
    fn leaves_existing_result_field_untouched() {
        let normalized = normalize_function_response(json!({"result": {"sum": 3}}));
        assert_eq!(normalized, json!({"result": {"sum": 3}}));
    }

    #[test]
    fn wraps_raw_content_array() {
        let normalized = normalize_function_response(json!({"content": [1, 2, 3]}));
        assert_eq!(normalized, json!({"result": {"content": [1, 2, 3]}}));
    }

    #[test]
    fn wraps_arbitrary_scalar_as_result() {
        let normalized = normalize_function_response(json!(42));
        assert_eq!(normalized, json!({"result": 42}));
    }

    #[test]
    fn nested_result_payloads_are_not_recursively_normalized() {
        let normalized = normalize_function_response(json!({"content": {"error": "nested, untouched"}}));
        assert_eq!(normalized, json!({"result": {"content": {"error": "nested, untouched"}}}));
    }

    #[test]
    fn function_call_data_part_round_trips_through_inbound_outbound() {
        let wire_part = Part::Data {
            data: json!({"id": "f1", "name": "add", "args": {"a": 1, "b": 2}}),
            metadata: {
                let mut m = Metadata::new();
                m.insert(DATA_PART_TYPE_KEY.to_string(), json!(DATA_TYPE_FUNCTION_CALL));
                m
            },
        };
        let internal = inbound_part(wire_part);
        match &internal {
            ContentPart::FunctionCall { id, name, .. } => {
                assert_eq!(id, "f1");
                assert_eq!(name, "add");
            }
            _ => panic!("expected function call"),
        }
        let back = outbound_part(&internal, &[]);
        match back {
            Part::Data { data, metadata } => {
                assert_eq!(data["name"], "add");
                assert_eq!(metadata[DATA_PART_TYPE_KEY], json!(DATA_TYPE_FUNCTION_CALL));
            }
            _ => panic!("expected data part"),
        }
    }

    #[test]
    fn long_running_function_call_is_tagged() {
        let part = ContentPart::FunctionCall { id: "f1".into(), name: "deploy".into(), args: json!({}) };
        let wire_part = outbound_part(&part, &["f1".to_string()]);
        match wire_part {
            Part::Data { metadata, .. } => assert_eq!(metadata[LONG_RUNNING_KEY], json!(true)),
            _ => panic!("expected data part"),
        }
    }
}
