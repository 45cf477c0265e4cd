use std::sync::Arc;

use config::SharedSettings;
use core_types::{AiResponse, BackendError, BackendKind, ChatMessage, METADATA_ERROR};
use provider_http::{BackendFactory, ChatBackend, DefaultBackendFactory, FactoryError};
use thiserror::Error;
use tracing::{info, warn};

pub const APOLOGY_TEXT: &str = "I apologize, but I encountered an error while processing your request. Please check your settings and try again.";

/// Failures that leave the manager without a usable backend. Generation
/// errors never show up here.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Factory(#[from] FactoryError),

    #[error("Failed to initialize AI service ({0})")]
    InitializationFailed(BackendKind),
}

/// Owns the active backend and rebuilds it from settings on demand.
pub struct ServiceManager {
    settings: SharedSettings,
    factory: Arc<dyn BackendFactory>,
    backend: Option<Box<dyn ChatBackend>>,
}

impl ServiceManager {
    pub fn new(settings: SharedSettings) -> Result<Self, ServiceError> {
        Self::with_factory(settings, Arc::new(DefaultBackendFactory))
    }

    pub fn with_factory(
        settings: SharedSettings,
        factory: Arc<dyn BackendFactory>,
    ) -> Result<Self, ServiceError> {
        let mut manager = Self {
            settings,
            factory,
            backend: None,
        };
        manager.backend = Some(manager.build_backend()?);
        Ok(manager)
    }

    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    pub fn active_kind(&self) -> Option<BackendKind> {
        self.backend.as_ref().map(|backend| backend.kind())
    }

    pub fn is_ready(&self) -> bool {
        self.backend
            .as_ref()
            .is_some_and(|backend| backend.is_available())
    }

    /// Delegates to the backend, rebuilding it first when it is missing or
    /// unavailable. Backend failures come back as an apology response; the
    /// only `Err` is a failed (re)initialization.
    pub async fn generate_response(
        &mut self,
        message: &str,
        context: &[ChatMessage],
    ) -> Result<AiResponse, ServiceError> {
        let backend = match self.backend.take() {
            Some(backend) if backend.is_available() => backend,
            stale => {
                if let Some(backend) = stale {
                    warn!(backend = %backend.kind(), "backend unavailable, reinitializing");
                }
                self.build_backend()?
            }
        };

        let result = backend.generate_response(message, context).await;
        self.backend = Some(backend);

        Ok(match result {
            Ok(response) => response,
            Err(err) => {
                warn!(backend = %err.kind(), error = %err, "generation failed");
                degraded_response(&err)
            }
        })
    }

    /// Rebuilds the backend from the current selection regardless of state.
    pub fn switch_backend(&mut self) -> Result<(), ServiceError> {
        self.backend = None;
        self.backend = Some(self.build_backend()?);
        Ok(())
    }

    fn build_backend(&self) -> Result<Box<dyn ChatBackend>, ServiceError> {
        let settings = self.settings.read();
        let mut backend = self.factory.create(&settings)?;
        if !backend.initialize(&settings) {
            return Err(ServiceError::InitializationFailed(backend.kind()));
        }
        info!(backend = %backend.kind(), "ai service ready");
        Ok(backend)
    }
}

fn degraded_response(err: &BackendError) -> AiResponse {
    AiResponse::new(APOLOGY_TEXT)
        .with_metadata(METADATA_ERROR, format!("Error generating response: {err}"))
}
