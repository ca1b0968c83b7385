//! A thin HTTP client over one resolved `ModelSection`. This crate never
//! hardcodes a provider's full surface — only enough of the
//! OpenAI-compatible and Anthropic-compatible response envelopes to pull
//! text back out (§ protocol).

use std::pin::Pin;

use agentmesh_core::ModelSection;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};

use crate::error::{LlmError, LlmResult};
use crate::protocol::{extract_stream_delta, extract_text, CompletionRequest, CompletionResponse};

pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    provider: String,
}

impl LlmClient {
    /// Build a client from a Translator-resolved `ModelSection`. `api_key`
    /// is read by the caller from the Secret the ModelConfig references —
    /// this crate never reads secrets itself.
    pub fn from_model_section(section: &ModelSection, api_key: Option<&str>) -> LlmResult<Self> {
        let mut headers = HeaderMap::new();
        for (k, v) in &section.headers {
            if let (Ok(name), Ok(value)) = (HeaderName::try_from(k.as_str()), HeaderValue::from_str(v)) {
                headers.insert(name, value);
            }
        }
        if let Some(key) = api_key {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {key}")) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(LlmError::Request)?;

        let base_url = section
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url(&section.provider).to_string());

        Ok(Self {
            http,
            base_url,
            provider: section.provider.clone(),
        })
    }

    pub async fn complete(&self, request: &CompletionRequest) -> LlmResult<CompletionResponse> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider { status, body });
        }

        let raw: serde_json::Value = response.json().await.map_err(LlmError::Request)?;
        let content = extract_text(&self.provider, &raw);
        Ok(CompletionResponse { content, raw })
    }

    /// Stream incremental text deltas over server-sent events.
    pub async fn complete_stream(
        &self,
        request: &CompletionRequest,
    ) -> LlmResult<Pin<Box<dyn Stream<Item = LlmResult<String>> + Send>>> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider { status, body });
        }

        // Collects the whole SSE body up front rather than yielding
        // incrementally — the runtime's own streaming layer
        // (agentmesh-runtime) is what paces tokens back to callers.
        let provider = self.provider.clone();
        let mut byte_stream = response.bytes_stream();
        let mut buf = String::new();
        let mut deltas = Vec::new();
        while let Some(chunk) = byte_stream.next().await {
            let chunk = chunk.map_err(LlmError::Request)?;
            buf.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(pos) = buf.find('\n') {
                let line = buf[..pos].trim().to_string();
                buf.drain(..=pos);
                if let Some(data) = line.strip_prefix("data:") {
                    if let Some(delta) = extract_stream_delta(&provider, data) {
                        deltas.push(delta);
                    }
                }
            }
        }

        Ok(Box::pin(futures::stream::iter(deltas.into_iter().map(Ok))))
    }
}

fn default_base_url(provider: &str) -> &'static str {
    match provider {
        "anthropic" => "https://api.anthropic.com/v1",
        "openai" => "https://api.openai.com/v1",
        _ => "http://localhost:11434/v1",
    }
}
