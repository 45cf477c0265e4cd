use std::fs;
use std::path::{Path, PathBuf};

use core_types::ChatMessage;
use thiserror::Error;

pub const HISTORY_DIR: &str = "chat_history";
pub const HISTORY_FILE: &str = "chat_history.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid chat history json: {0}")]
    Json(#[from] serde_json::Error),
}

/// The conversation as one JSON array, rewritten wholesale on every save.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn from_data_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(HISTORY_DIR).join(HISTORY_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<ChatMessage>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, messages: &[ChatMessage]) -> Result<(), StorageError> {
        let text = serde_json::to_string_pretty(messages)?;
        write_file(&self.path, &text)
    }
}

pub(crate) fn write_file(path: &Path, contents: &str) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, contents).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })
}
