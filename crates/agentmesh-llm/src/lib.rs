//! Opaque model-endpoint client. Given a Translator-resolved `ModelSection`
//! this crate knows how to make one chat-completions call and pull text
//! back out; it has no opinion on what the provider actually is.

pub mod client;
pub mod error;
pub mod protocol;

pub use client::LlmClient;
pub use error::{LlmError, LlmResult};
pub use protocol::{extract_finish_reason, ChatMessage, CompletionRequest, CompletionResponse, FinishInfo};

#[cfg(test)]
mod tests {
    use super::*;
    use agentmesh_core::ModelSection;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn section(base_url: String) -> ModelSection {
        ModelSection {
            provider: "openai".into(),
            model: "gpt-4".into(),
            base_url: Some(base_url),
            tls_material: None,
            headers: Default::default(),
            temperature: Some(0.2),
            max_tokens: None,
        }
    }

    #[tokio::test]
    async fn completes_against_an_openai_shaped_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "hello there" } }]
            })))
            .mount(&server)
            .await;

        let client = LlmClient::from_model_section(&section(server.uri()), Some("sk-test")).unwrap();
        let request = CompletionRequest {
            model: "gpt-4".into(),
            messages: vec![ChatMessage {
                role: "user".into(),
                content: "hi".into(),
            }],
            temperature: Some(0.2),
            max_tokens: None,
            stream: false,
        };

        let response = client.complete(&request).await.unwrap();
        assert_eq!(response.content, "hello there");
    }

    #[tokio::test]
    async fn non_success_status_surfaces_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = LlmClient::from_model_section(&section(server.uri()), None).unwrap();
        let request = CompletionRequest {
            model: "gpt-4".into(),
            messages: vec![],
            temperature: None,
            max_tokens: None,
            stream: false,
        };

        let err = client.complete(&request).await.unwrap_err();
        assert!(matches!(err, LlmError::Provider { status: 429, .. }));
    }
}
