//! ModelConfig: provider tag, model name, secret reference, and
//! provider-specific parameters (§3).

use serde::{Deserialize, Serialize};

use crate::resource::{AcceptedStatus, Resource};

pub type ModelConfig = Resource<ModelConfigSpec, AcceptedStatus>;

/// Provider-specific parameters are kept intentionally shallow: the
/// provider itself is treated as an opaque model endpoint (spec Non-goals),
/// so this only needs enough shape to build a request and route it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfigSpec {
    /// Provider discriminator, e.g. "openai", "anthropic", "azure", "ollama".
    pub provider: String,

    /// Model name as the provider expects it.
    pub model: String,

    /// Reference to the secret carrying the API key, `namespace/name` or
    /// bare `name` (defaults to the ModelConfig's own namespace).
    pub api_key_secret: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsTrust>,

    /// Additional provider-specific fields that don't warrant their own
    /// typed field; passed through verbatim into the generated config.
    #[serde(default, flatten)]
    pub extra: std::collections::HashMap<String, serde_json::Value>,
}

/// Optional TLS trust override, used by both ModelConfig and Agent specs
/// when talking to a privately-rooted endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsTrust {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle_secret: Option<String>,

    #[serde(default)]
    pub insecure_skip_verify: bool,
}
