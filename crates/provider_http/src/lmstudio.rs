use async_trait::async_trait;
use config::{LmStudioConfig, Settings};
use core_types::{
    AiResponse, BackendError, BackendKind, ChatMessage, ChatRole, METADATA_BACKEND,
    METADATA_MODEL,
};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::http::{build_client, post_json, request_timeout};
use crate::{ChatBackend, FALLBACK_RESPONSE, MAX_NEW_TOKENS, TEMPERATURE};

const KIND: BackendKind = BackendKind::Local;
const LOCAL_MODEL_ID: &str = "local";

/// OpenAI-compatible chat completions served by a local LM Studio instance.
#[derive(Debug, Default)]
pub struct LmStudioBackend {
    config: Option<LmStudioConfig>,
    api_base: String,
    client: Option<Client>,
}

impl LmStudioBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

}

fn has_required_fields(config: &LmStudioConfig) -> bool {
    !config.host.is_empty() && config.port != 0
}

#[async_trait]
impl ChatBackend for LmStudioBackend {
    fn kind(&self) -> BackendKind {
        KIND
    }

    fn initialize(&mut self, settings: &Settings) -> bool {
        self.client = None;
        self.config = None;
        self.api_base.clear();

        let config = match settings.lmstudio() {
            Ok(config) => config,
            Err(err) => {
                warn!(backend = %KIND, error = %err, "failed to read backend settings");
                return false;
            }
        };

        self.api_base = format!("http://{}:{}/v1", config.host, config.port);
        let timeout = request_timeout(KIND, settings);
        self.client = build_client(KIND, None, timeout);
        let ready = has_required_fields(&config) && self.client.is_some();
        info!(backend = %KIND, api_base = %self.api_base, ready, "backend initialized");
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

        let messages = context
            .iter()
            .map(|msg| WireMessage {
                role: msg.role,
                content: &msg.content,
            })
            .chain(std::iter::once(WireMessage {
                role: ChatRole::User,
                content: message,
            }))
            .collect();
        let payload = ChatCompletionRequest {
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_NEW_TOKENS,
            stream: false,
        };

        let url = format!("{}/chat/completions", self.api_base);
        let result = post_json(client, KIND, &url, &payload).await?;
        Ok(AiResponse::new(extract_content(&result))
            .with_metadata(METADATA_MODEL, LOCAL_MODEL_ID)
            .with_metadata(METADATA_BACKEND, KIND.provider_name()))
    }

    fn is_available(&self) -> bool {
        self.client.is_some() && self.config.as_ref().is_some_and(has_required_fields)
    }
}

fn extract_content(result: &Value) -> String {
    result
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_RESPONSE.to_string())
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    messages: Vec<WireMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: ChatRole,
    content: &'a str,
}
