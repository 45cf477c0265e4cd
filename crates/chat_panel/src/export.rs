use std::path::Path;

use core_types::ChatMessage;

use crate::history::{StorageError, write_file};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Text,
}

impl ExportFormat {
    /// `.json` files get the raw history; anything else a readable transcript.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

pub fn render(messages: &[ChatMessage], format: ExportFormat) -> Result<String, StorageError> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(messages)?),
        ExportFormat::Text => Ok(messages
            .iter()
            .map(|msg| format!("{}: {}\n\n", msg.role.title(), msg.content))
            .collect()),
    }
}

pub fn export_to(path: &Path, messages: &[ChatMessage]) -> Result<ExportFormat, StorageError> {
    let format = ExportFormat::from_path(path);
    write_file(path, &render(messages, format)?)?;
    Ok(format)
}
