//! The wire shape this client speaks to a model endpoint. Providers are
//! treated as opaque HTTP services (§ Non-goals: no deep per-provider
//! feature support) — `formats` only covers enough of each response
//! envelope to pull out the assistant's text and, for streaming, the
//! incremental delta.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub raw: Value,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiCompletion {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicCompletion {
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Extract assistant text from a non-streaming response body. Unknown
/// providers fall back to an empty string rather than failing the call —
/// the runtime still has `raw` to inspect.
pub fn extract_text(provider: &str, body: &Value) -> String {
    let parsed = match provider {
        "anthropic" => serde_json::from_value::<AnthropicCompletion>(body.clone())
            .ok()
            .map(|c| c.content.into_iter().map(|b| b.text).collect::<String>()),
        _ => serde_json::from_value::<OpenAiCompletion>(body.clone())
            .ok()
            .and_then(|c| c.choices.into_iter().next())
            .map(|c| c.message.content),
    };
    parsed.unwrap_or_default()
}

/// Finish/stop reason codes considered normal completion; anything else
/// (a content filter, a safety block, a malformed function call, ...)
/// terminates the task with a `failed` event (§7).
const NORMAL_COMPLETION_REASONS: &[&str] = &["stop", "tool_calls", "end_turn", "tool_use", "function_call"];

#[derive(Debug, Clone)]
pub struct FinishInfo {
    pub code: String,
    pub message: String,
}

/// Inspect a raw completion body for a non-normal finish/stop reason, or an
/// explicit top-level error envelope. Provider-blind: checks both the
/// OpenAI-shaped and Anthropic-shaped fields regardless of which provider
/// actually answered, the same way `extract_text` does for content.
pub fn extract_finish_reason(body: &Value) -> Option<FinishInfo> {
    if let Some(err) = body.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("model returned an error")
            .to_string();
        let code = err
            .get("code")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| err.get("type").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| "provider-error".into());
        return Some(FinishInfo { code, message });
    }

    let reason = body
        .pointer("/choices/0/finish_reason")
        .and_then(Value::as_str)
        .or_else(|| body.get("stop_reason").and_then(Value::as_str))?;

    if NORMAL_COMPLETION_REASONS.contains(&reason) {
        return None;
    }

    Some(FinishInfo {
        code: reason.to_string(),
        message: format!("model finished with non-normal reason `{reason}`"),
    })
}

/// Extract the incremental delta out of one SSE `data:` chunk body.
/// Returns `None` for the terminal `[DONE]` marker or for shapes this
/// client doesn't recognize.
pub fn extract_stream_delta(provider: &str, raw_chunk: &str) -> Option<String> {
    let trimmed = raw_chunk.trim();
    if trimmed.is_empty() || trimmed == "[DONE]" {
        return None;
    }
    let value: Value = serde_json::from_str(trimmed).ok()?;
    match provider {
        "anthropic" => value
            .get("delta")
            .and_then(|d| d.get("text"))
            .and_then(|t| t.as_str())
            .map(str::to_string),
        _ => serde_json::from_value::<OpenAiStreamChunk>(value)
            .ok()
            .and_then(|c| c.choices.into_iter().next())
            .and_then(|c| c.delta.content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normal_finish_reason_yields_no_error() {
        let body = json!({"choices": [{"finish_reason": "stop", "message": {"content": "hi"}}]});
        assert!(extract_finish_reason(&body).is_none());
    }

    #[test]
    fn non_normal_finish_reason_is_surfaced() {
        let body = json!({"choices": [{"finish_reason": "malformed_function_call"}]});
        let info = extract_finish_reason(&body).unwrap();
        assert_eq!(info.code, "malformed_function_call");
    }

    #[test]
    fn top_level_error_envelope_is_surfaced() {
        let body = json!({"error": {"code": "rate_limited", "message": "slow down"}});
        let info = extract_finish_reason(&body).unwrap();
        assert_eq!(info.code, "rate_limited");
        assert_eq!(info.message, "slow down");
    }

    #[test]
    fn anthropic_stop_reason_is_checked_too() {
        let body = json!({"stop_reason": "max_tokens"});
        let info = extract_finish_reason(&body).unwrap();
        assert_eq!(info.code, "max_tokens");
    }
}
