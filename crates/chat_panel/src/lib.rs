use std::path::Path;

use ai_service::{ServiceError, ServiceManager};
use config::{ConfigError, HistoryConfig, SettingsForm, SharedSettings};
use core_types::{AiResponse, BackendKind, ChatMessage};
use thiserror::Error;
use tracing::{debug, info, warn};

mod conversation;
mod export;
mod history;

pub use conversation::{CONTEXT_WINDOW, Conversation};
pub use export::{ExportFormat, export_to};
pub use history::{HISTORY_DIR, HISTORY_FILE, HistoryStore, StorageError};

#[derive(Debug, Error)]
pub enum PanelError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Conversation state behind the chat panel, minus any widgets.
pub struct ChatPanel {
    service: ServiceManager,
    conversation: Conversation,
    history: HistoryStore,
}

impl ChatPanel {
    /// Replays stored history. An unreadable history file is logged and the
    /// panel starts empty.
    pub fn open(service: ServiceManager, history: HistoryStore) -> Self {
        let conversation = match history.load() {
            Ok(messages) => {
                info!(count = messages.len(), path = %history.path().display(), "chat history loaded");
                Conversation::from_messages(messages)
            }
            Err(err) => {
                warn!(error = %err, path = %history.path().display(), "failed to load chat history");
                Conversation::default()
            }
        };

        Self {
            service,
            conversation,
            history,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn service(&self) -> &ServiceManager {
        &self.service
    }

    pub fn settings(&self) -> &SharedSettings {
        self.service.settings()
    }

    /// Sends one user message with the trailing context window and records
    /// the reply. Blank input is ignored.
    pub async fn send_message(&mut self, input: &str) -> Result<Option<AiResponse>, PanelError> {
        let message = input.trim();
        if message.is_empty() {
            return Ok(None);
        }

        let context = self.conversation.context_window(CONTEXT_WINDOW).to_vec();
        self.add_message(ChatMessage::user(message));

        let response = self.service.generate_response(message, &context).await?;
        if response.is_degraded() {
            debug!(error = ?response.error(), "showing degraded response");
        }
        if !response.text.is_empty() {
            self.add_message(ChatMessage::assistant(response.text.as_str()));
        }
        Ok(Some(response))
    }

    fn add_message(&mut self, message: ChatMessage) {
        self.conversation.push(message);

        if self.history_config().auto_save {
            if let Err(err) = self.save_history() {
                warn!(error = %err, "failed to auto-save chat history");
            }
        }
    }

    fn history_config(&self) -> HistoryConfig {
        match self.settings().read().history() {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "history settings unreadable, using defaults");
                HistoryConfig {
                    max_messages: 0,
                    auto_save: true,
                }
            }
        }
    }

    /// Persists the conversation, keeping only the last `history.max_messages`
    /// entries (zero keeps everything).
    pub fn save_history(&self) -> Result<(), PanelError> {
        let max_messages = self.history_config().max_messages;
        let messages = if max_messages == 0 {
            self.conversation.messages()
        } else {
            self.conversation.context_window(max_messages)
        };
        self.history.save(messages)?;
        Ok(())
    }

    pub fn export(&self, path: &Path) -> Result<ExportFormat, PanelError> {
        let format = export_to(path, self.conversation.messages())?;
        info!(path = %path.display(), ?format, "chat exported");
        Ok(format)
    }

    /// Writes the settings form and rebuilds the backend from it.
    pub fn apply_settings(&mut self, form: &SettingsForm) -> Result<(), PanelError> {
        form.apply(&mut self.settings().write())?;
        self.service.switch_backend()?;
        Ok(())
    }

    pub fn select_backend(&mut self, kind: BackendKind) -> Result<(), PanelError> {
        self.settings().write().set_active_backend(kind)?;
        self.service.switch_backend()?;
        Ok(())
    }

    pub fn reset_settings(&mut self) -> Result<(), PanelError> {
        self.settings().write().reset()?;
        self.service.switch_backend()?;
        Ok(())
    }

    pub fn close(self) -> Result<(), PanelError> {
        self.save_history()
    }
}
