use async_trait::async_trait;
use config::{ConfigError, Settings};
use core_types::{AiResponse, BackendError, BackendKind, ChatMessage, UnknownBackend};
use thiserror::Error;

mod http;
mod huggingface;
mod lmstudio;
#[cfg(test)]
mod test_support;

pub use huggingface::{HuggingFaceBackend, format_transcript};
pub use lmstudio::LmStudioBackend;

/// Reply text used when a provider answers successfully but without the
/// field we read the generated text from.
pub const FALLBACK_RESPONSE: &str = "I apologize, but I couldn't generate a proper response.";

pub const MAX_NEW_TOKENS: u32 = 1000;
pub const TEMPERATURE: f64 = 0.7;
pub const TOP_P: f64 = 0.95;

/// Uniform contract over the HTTP chat providers.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Snapshots this backend's settings and recreates its HTTP client.
    /// Returns whether every required field is filled in.
    fn initialize(&mut self, settings: &Settings) -> bool;

    async fn generate_response(
        &self,
        message: &str,
        context: &[ChatMessage],
    ) -> Result<AiResponse, BackendError>;

    fn is_available(&self) -> bool;
}

#[derive(Debug, Error)]
pub enum FactoryError {
    #[error(transparent)]
    UnknownBackend(#[from] UnknownBackend),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Builds the backend named by `ai_backend.active_backend`. Does not
/// initialize it.
pub fn create_service(settings: &Settings) -> Result<Box<dyn ChatBackend>, FactoryError> {
    let selection = settings.active_backend()?;
    let kind: BackendKind = selection.parse()?;
    Ok(create_backend(kind))
}

pub fn create_backend(kind: BackendKind) -> Box<dyn ChatBackend> {
    match kind {
        BackendKind::Cloud => Box::new(HuggingFaceBackend::new()),
        BackendKind::Local => Box::new(LmStudioBackend::new()),
    }
}

pub trait BackendFactory: Send + Sync {
    fn create(&self, settings: &Settings) -> Result<Box<dyn ChatBackend>, FactoryError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create(&self, settings: &Settings) -> Result<Box<dyn ChatBackend>, FactoryError> {
        create_service(settings)
    }
}
