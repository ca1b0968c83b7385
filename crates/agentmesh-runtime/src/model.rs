//! The model seam the Event Pipeline calls into each round-trip (§4.7
//! step 2). `ModelClient` is deliberately narrow: providers stay opaque
//! (the agentmesh-llm Non-goal), so the production adapter only extracts
//! plain text plus whatever OpenAI-shaped `tool_calls` its raw response
//! carries.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;

use crate::error::RuntimeResult;
use crate::protocol::{ContentPart, ConversationMessage, Role};

#[derive(Debug, Clone)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    /// A non-normal-completion code (§7); terminates the task with `failed`.
    Error { code: String, message: String },
}

#[derive(Debug, Clone)]
pub struct ModelTurn {
    pub parts: Vec<ContentPart>,
    pub finish: FinishReason,
}

impl ModelTurn {
    pub fn function_calls(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.parts.iter().filter_map(|p| match p {
            ContentPart::FunctionCall { id, name, args } => Some((id.as_str(), name.as_str(), args)),
            _ => None,
        })
    }

    pub fn text(&self) -> Option<String> {
        let joined: String = self
            .parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}

/// One unit of a streamed model round-trip: an incremental text delta, or
/// the turn's final, fully-assembled result.
#[derive(Debug, Clone)]
pub enum StreamChunk {
    TextDelta(String),
    Final(ModelTurn),
}

pub type TurnStream = Pin<Box<dyn Stream<Item = RuntimeResult<StreamChunk>> + Send>>;

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(
        &self,
        system_instruction: Option<&str>,
        messages: &[ConversationMessage],
        tools: &[ToolDeclaration],
    ) -> RuntimeResult<ModelTurn>;

    /// Incremental-mode variant of [`complete`](Self::complete). The
    /// default wraps the non-streaming call in a single-item stream for
    /// providers (like the opaque HTTP adapter) with no true incremental
    /// delivery; providers that do support it override this directly.
    async fn complete_streaming(
        &self,
        system_instruction: Option<&str>,
        messages: &[ConversationMessage],
        tools: &[ToolDeclaration],
    ) -> RuntimeResult<TurnStream> {
        let turn = self.complete(system_instruction, messages, tools).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(StreamChunk::Final(turn)) })))
    }
}

/// Adapter over `agentmesh_llm::LlmClient`. Flattens the conversation to a
/// plain chat-message list (role + text); function-call parts and tool
/// responses are serialized inline as JSON text, since the opaque client
/// has no structured tool-calling contract to target.
pub struct LlmModelClient {
    inner: agentmesh_llm::LlmClient,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl LlmModelClient {
    pub fn new(inner: agentmesh_llm::LlmClient, model: impl Into<String>) -> Self {
        Self { inner, model: model.into(), temperature: None, max_tokens: None }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn flatten(role: Role, parts: &[ContentPart]) -> String {
        let body = parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text, .. } => text.clone(),
                ContentPart::FunctionCall { name, args, .. } => {
                    format!("[tool call {name} args={args}]")
                }
                ContentPart::FunctionResponse { name, response, .. } => {
                    format!("[tool response {name} result={response}]")
                }
                ContentPart::File { uri, mime_type, .. } => {
                    format!("[file {} mime={:?}]", uri.clone().unwrap_or_default(), mime_type)
                }
                ContentPart::CodeExecutionResult { result, .. } => format!("[code result {result}]"),
                ContentPart::ExecutableCode { code, .. } => format!("[code {code}]"),
            })
            .collect::<Vec<_>>()
            .join("\n");
        format!("{}: {body}", role.as_wire_str())
    }
}

#[async_trait]
impl ModelClient for LlmModelClient {
    async fn complete(
        &self,
        system_instruction: Option<&str>,
        messages: &[ConversationMessage],
        _tools: &[ToolDeclaration],
    ) -> RuntimeResult<ModelTurn> {
        let mut chat_messages = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system_instruction {
            chat_messages.push(agentmesh_llm::ChatMessage { role: "system".into(), content: system.into() });
        }
        for message in messages {
            chat_messages.push(agentmesh_llm::ChatMessage {
                role: message.role.as_wire_str().into(),
                content: Self::flatten(message.role, &message.parts),
            });
        }

        let request = agentmesh_llm::CompletionRequest {
            model: self.model.clone(),
            messages: chat_messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };

        let response = self.inner.complete(&request).await?;

        if let Some(finish) = agentmesh_llm::extract_finish_reason(&response.raw) {
            return Ok(ModelTurn {
                parts: Vec::new(),
                finish: FinishReason::Error { code: finish.code, message: finish.message },
            });
        }

        let tool_calls = extract_openai_tool_calls(&response.raw);

        if !tool_calls.is_empty() {
            return Ok(ModelTurn { parts: tool_calls, finish: FinishReason::ToolCalls });
        }

        Ok(ModelTurn {
            parts: vec![ContentPart::text(response.content)],
            finish: FinishReason::Stop,
        })
    }
}

#[cfg(test)]
pub mod fake {
    use std::sync::Mutex;

    use futures::StreamExt;

    use super::*;

    /// One scripted model round-trip. `deltas` lets a turn replay as
    /// incremental text chunks under `complete_streaming` (§8 scenario 6);
    /// `complete` always sees the fully assembled `turn`.
    pub struct ScriptedTurn {
        pub turn: ModelTurn,
        pub deltas: Vec<String>,
    }

    impl ScriptedTurn {
        pub fn text(text: impl Into<String>) -> Self {
            let text = text.into();
            ScriptedTurn { turn: ModelTurn { parts: vec![ContentPart::text(text)], finish: FinishReason::Stop }, deltas: Vec::new() }
        }

        pub fn streamed_text(deltas: impl IntoIterator<Item = impl Into<String>>) -> Self {
            let deltas: Vec<String> = deltas.into_iter().map(Into::into).collect();
            let full = deltas.concat();
            ScriptedTurn { turn: ModelTurn { parts: vec![ContentPart::text(full)], finish: FinishReason::Stop }, deltas }
        }

        pub fn function_call(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
            ScriptedTurn {
                turn: ModelTurn {
                    parts: vec![ContentPart::FunctionCall { id: id.into(), name: name.into(), args }],
                    finish: FinishReason::ToolCalls,
                },
                deltas: Vec::new(),
            }
        }

        pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
            ScriptedTurn {
                turn: ModelTurn { parts: Vec::new(), finish: FinishReason::Error { code: code.into(), message: message.into() } },
                deltas: Vec::new(),
            }
        }
    }

    /// Test-only model client: replays a fixed script of turns in order,
    /// one per `complete`/`complete_streaming` call, per SPEC_FULL.md §8's
    /// "in-process fakes" instruction for scenario tests.
    pub struct FakeModelClient {
        script: Mutex<std::collections::VecDeque<ScriptedTurn>>,
    }

    impl FakeModelClient {
        pub fn new(turns: impl IntoIterator<Item = ScriptedTurn>) -> Self {
            Self { script: Mutex::new(turns.into_iter().collect()) }
        }

        fn next_turn(&self) -> ScriptedTurn {
            self.script.lock().unwrap().pop_front().expect("FakeModelClient script exhausted")
        }
    }

    #[async_trait]
    impl ModelClient for FakeModelClient {
        async fn complete(
            &self,
            _system_instruction: Option<&str>,
            _messages: &[ConversationMessage],
            _tools: &[ToolDeclaration],
        ) -> RuntimeResult<ModelTurn> {
            Ok(self.next_turn().turn)
        }

        async fn complete_streaming(
            &self,
            _system_instruction: Option<&str>,
            _messages: &[ConversationMessage],
            _tools: &[ToolDeclaration],
        ) -> RuntimeResult<TurnStream> {
            let scripted = self.next_turn();
            if scripted.deltas.is_empty() {
                return Ok(Box::pin(futures::stream::once(async move { Ok(StreamChunk::Final(scripted.turn)) })));
            }

            let deltas = futures::stream::iter(scripted.deltas.into_iter().map(|d| Ok(StreamChunk::TextDelta(d))));
            let finale = futures::stream::once(async move { Ok(StreamChunk::Final(scripted.turn)) });
            Ok(Box::pin(deltas.chain(finale)))
        }
    }

    #[tokio::test]
    async fn streaming_replays_deltas_then_final() {
        let client = FakeModelClient::new(vec![ScriptedTurn::streamed_text(["Hel", "lo"])]);
        let mut stream = client.complete_streaming(None, &[], &[]).await.unwrap();
        let mut deltas = Vec::new();
        let mut final_turn = None;
        while let Some(chunk) = stream.next().await {
            match chunk.unwrap() {
                StreamChunk::TextDelta(d) => deltas.push(d),
                StreamChunk::Final(turn) => final_turn = Some(turn),
            }
        }
        assert_eq!(deltas, vec!["Hel".to_string(), "lo".to_string()]);
        assert_eq!(final_turn.unwrap().text().unwrap(), "Hello");
    }

    #[tokio::test]
    async fn non_streaming_turn_yields_single_final_chunk() {
        let client = FakeModelClient::new(vec![ScriptedTurn::text("hi")]);
        let mut stream = client.complete_streaming(None, &[], &[]).await.unwrap();
        let chunk = stream.next().await.unwrap().unwrap();
        assert!(matches!(chunk, StreamChunk::Final(_)));
        assert!(stream.next().await.is_none());
    }
}

fn extract_openai_tool_calls(raw: &Value) -> Vec<ContentPart> {
    let Some(calls) = raw
        .pointer("/choices/0/message/tool_calls")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    calls
        .iter()
        .filter_map(|call| {
            let id = call.get("id")?.as_str()?.to_string();
            let function = call.get("function")?;
            let name = function.get("name")?.as_str()?.to_string();
            let args: Value = function
                .get("arguments")
                .and_then(Value::as_str)
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or(Value::Null);
            Some(ContentPart::FunctionCall { id, name, args })
        })
        .collect()
}
