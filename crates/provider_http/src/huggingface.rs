use async_trait::async_trait;
use config::{HuggingFaceConfig, Settings};
use core_types::{
    AiResponse, BackendError, BackendKind, ChatMessage, ChatRole, METADATA_BACKEND,
    METADATA_MODEL,
};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::http::{build_client, post_json, request_timeout};
use crate::{ChatBackend, FALLBACK_RESPONSE, MAX_NEW_TOKENS, TEMPERATURE, TOP_P};

const KIND: BackendKind = BackendKind::Cloud;

/// Text-generation inference endpoint: the conversation goes out as one
/// role-tagged transcript.
#[derive(Debug, Default)]
pub struct HuggingFaceBackend {
    config: Option<HuggingFaceConfig>,
    client: Option<Client>,
}

impl HuggingFaceBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn api_url(config: &HuggingFaceConfig) -> String {
        format!("{}/{}", config.endpoint.trim_end_matches('/'), config.model)
    }
}

fn has_required_fields(config: &HuggingFaceConfig) -> bool {
    !config.api_key.is_empty() && !config.model.is_empty() && !config.endpoint.is_empty()
}

#[async_trait]
impl ChatBackend for HuggingFaceBackend {
    fn kind(&self) -> BackendKind {
        KIND
    }

    fn initialize(&mut self, settings: &Settings) -> bool {
        self.client = None;
        self.config = None;

        let config = match settings.huggingface() {
            Ok(config) => config,
            Err(err) => {
                warn!(backend = %KIND, error = %err, "failed to read backend settings");
                return false;
            }
        };

        let timeout = request_timeout(KIND, settings);
        self.client = build_client(KIND, Some(&config.api_key), timeout);
        let ready = has_required_fields(&config) && self.client.is_some();
        info!(backend = %KIND, model = %config.model, ready, "backend initialized");
        self.config = Some(config);
        ready
    }

    async fn generate_response(
        &self,
        message: &str,
        context: &[ChatMessage],
    ) -> Result<AiResponse, BackendError> {
        let (Some(config), Some(client)) = (&self.config, &self.client) else {
            return Err(BackendError::Unavailable(KIND));
        };
        if !has_required_fields(config) {
            return Err(BackendError::Unavailable(KIND));
        }

        let payload = InferenceRequest {
            inputs: format_transcript(context, message),
            parameters: GenerationParameters {
                max_new_tokens: MAX_NEW_TOKENS,
                temperature: TEMPERATURE,
                top_p: TOP_P,
                do_sample: true,
                return_full_text: false,
            },
        };

        let result = post_json(client, KIND, &Self::api_url(config), &payload).await?;
        Ok(AiResponse::new(extract_generated_text(&result))
            .with_metadata(METADATA_MODEL, config.model.as_str())
            .with_metadata(METADATA_BACKEND, KIND.provider_name()))
    }

    fn is_available(&self) -> bool {
        self.client.is_some() && self.config.as_ref().is_some_and(has_required_fields)
    }
}

/// Renders the context plus the new user message as `Human:`/`Assistant:`/
/// `System:` lines, closed by an `Assistant:` cue.
pub fn format_transcript(context: &[ChatMessage], message: &str) -> String {
    let mut formatted = String::new();
    let lines = context
        .iter()
        .map(|msg| (msg.role, msg.content.as_str()))
        .chain(std::iter::once((ChatRole::User, message)));
    for (role, content) in lines {
        let prefix = match role {
            ChatRole::User => "Human",
            ChatRole::Assistant => "Assistant",
            ChatRole::System => "System",
        };
        formatted.push_str(prefix);
        formatted.push_str(": ");
        formatted.push_str(content);
        formatted.push('\n');
    }
    formatted.push_str("Assistant:");
    formatted
}

fn extract_generated_text(result: &Value) -> String {
    result
        .as_array()
        .and_then(|items| items.first())
        .and_then(|first| first.get("generated_text"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_RESPONSE.to_string())
}

#[derive(Debug, Serialize)]
struct InferenceRequest {
    inputs: String,
    parameters: GenerationParameters,
}

#[derive(Debug, Serialize)]
struct GenerationParameters {
    max_new_tokens: u32,
    temperature: f64,
    top_p: f64,
    do_sample: bool,
    return_full_text: bool,
}

#[cfg(test)]
mod tests {
    use config::ConfigStore;
    use serde_json::json;
    use tempfile::{TempDir, tempdir};

    use super::*;
    use crate::test_support::serve_once;

    fn cloud_settings(endpoint: &str, api_key: &str) -> (TempDir, Settings) {
        let dir = tempdir().expect("tempdir");
        let mut settings = Settings::load(ConfigStore::from_dir(dir.path())).expect("settings");
        settings
            .set(&["ai_backend", "active_backend"], "cloud")
            .expect("select");
        settings
            .set(&["ai_backend", "huggingface", "endpoint"], endpoint)
            .expect("endpoint");
        settings
            .set(&["ai_backend", "huggingface", "model"], "test-model")
            .expect("model");
        settings
            .set(&["ai_backend", "huggingface", "api_key"], api_key)
            .expect("api key");
        (dir, settings)
    }

    #[test]
    fn transcript_tags_roles_and_ends_with_cue() {
        let context = vec![
            ChatMessage::system("Be brief."),
            ChatMessage::user("What is a fillet?"),
            ChatMessage::assistant("A rounded edge."),
        ];
        assert_eq!(
            format_transcript(&context, "And a chamfer?"),
            "System: Be brief.\nHuman: What is a fillet?\nAssistant: A rounded edge.\nHuman: And a chamfer?\nAssistant:"
        );
        assert_eq!(format_transcript(&[], "Hi"), "Human: Hi\nAssistant:");
    }

    #[test]
    fn empty_api_key_is_not_available() {
        let (_dir, settings) = cloud_settings("https://example.invalid/models", "");
        let mut backend = HuggingFaceBackend::new();
        assert!(!backend.initialize(&settings));
        assert!(!backend.is_available());
    }

    #[tokio::test]
    async fn refuses_to_generate_before_initialize() {
        let backend = HuggingFaceBackend::new();
        let err = backend.generate_response("Hi", &[]).await.unwrap_err();
        assert_eq!(err, BackendError::Unavailable(BackendKind::Cloud));
    }

    #[tokio::test]
    async fn posts_transcript_with_bearer_auth() {
        let server = serve_once(200, r#"[{"generated_text": " Use Pad."}]"#).await;
        let (_dir, settings) = cloud_settings(&format!("{}/models/", server.base_url()), "hf_abc");
        let mut backend = HuggingFaceBackend::new();
        assert!(backend.initialize(&settings));
        assert!(backend.is_available());

        let context = vec![ChatMessage::user("Hello"), ChatMessage::assistant("Hi!")];
        let response = backend
            .generate_response("How do I extrude?", &context)
            .await
            .expect("response");
        assert_eq!(response.text, " Use Pad.");
        assert_eq!(response.metadata.get("model").map(String::as_str), Some("test-model"));
        assert_eq!(response.metadata.get("backend").map(String::as_str), Some("huggingface"));

        let request = server.request().await;
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/models/test-model");
        assert_eq!(request.header("authorization"), Some("Bearer hf_abc"));
        assert_eq!(
            request.json(),
            json!({
                "inputs": "Human: Hello\nAssistant: Hi!\nHuman: How do I extrude?\nAssistant:",
                "parameters": {
                    "max_new_tokens": 1000,
                    "temperature": 0.7,
                    "top_p": 0.95,
                    "do_sample": true,
                    "return_full_text": false
                }
            })
        );
    }

    #[tokio::test]
    async fn empty_list_yields_fallback_text() {
        let server = serve_once(200, "[]").await;
        let (_dir, settings) = cloud_settings(&server.base_url(), "hf_abc");
        let mut backend = HuggingFaceBackend::new();
        assert!(backend.initialize(&settings));

        let response = backend.generate_response("Hi", &[]).await.expect("response");
        assert_eq!(response.text, FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn missing_generated_text_yields_fallback_text() {
        let server = serve_once(200, r#"[{"summary_text": "nope"}]"#).await;
        let (_dir, settings) = cloud_settings(&server.base_url(), "hf_abc");
        let mut backend = HuggingFaceBackend::new();
        assert!(backend.initialize(&settings));

        let response = backend.generate_response("Hi", &[]).await.expect("response");
        assert_eq!(response.text, FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn error_status_is_upstream_error() {
        let server = serve_once(503, r#"{"error": "Model is loading"}"#).await;
        let (_dir, settings) = cloud_settings(&server.base_url(), "hf_abc");
        let mut backend = HuggingFaceBackend::new();
        assert!(backend.initialize(&settings));

        let err = backend.generate_response("Hi", &[]).await.unwrap_err();
        match err {
            BackendError::Upstream { kind, message } => {
                assert_eq!(kind, BackendKind::Cloud);
                assert!(message.contains("503"), "{message}");
                assert!(message.contains("Model is loading"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_upstream_error() {
        let server = serve_once(200, "<html>oops</html>").await;
        let (_dir, settings) = cloud_settings(&server.base_url(), "hf_abc");
        let mut backend = HuggingFaceBackend::new();
        assert!(backend.initialize(&settings));

        let err = backend.generate_response("Hi", &[]).await.unwrap_err();
        assert!(matches!(err, BackendError::Upstream { .. }));
    }
}
