use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ResponseMetadata = BTreeMap<String, String>;

pub const METADATA_MODEL: &str = "model";
pub const METADATA_BACKEND: &str = "backend";
pub const METADATA_ERROR: &str = "error";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    /// Capitalized label used by transcripts and plain-text exports.
    pub fn title(self) -> &'static str {
        match self {
            Self::System => "System",
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// One entry of a conversation. Any role sequence is legal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Local wall-clock time, serialized without offset.
    pub timestamp: NaiveDateTime,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Local::now().naive_local(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiResponse {
    pub text: String,
    #[serde(default)]
    pub metadata: ResponseMetadata,
}

impl AiResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: ResponseMetadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn error(&self) -> Option<&str> {
        self.metadata.get(METADATA_ERROR).map(String::as_str)
    }

    pub fn is_degraded(&self) -> bool {
        self.metadata.contains_key(METADATA_ERROR)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Cloud,
    Local,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cloud => "cloud",
            Self::Local => "local",
        }
    }

    /// Name of the provider, also the key of its settings section under
    /// `ai_backend`.
    pub fn provider_name(self) -> &'static str {
        match self {
            Self::Cloud => "huggingface",
            Self::Local => "lmstudio",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Cloud => "HuggingFace",
            Self::Local => "LM Studio",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown AI backend: {0}")]
pub struct UnknownBackend(pub String);

impl FromStr for BackendKind {
    type Err = UnknownBackend;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "cloud" | "huggingface" => Ok(Self::Cloud),
            "local" | "lmstudio" => Ok(Self::Local),
            other => Err(UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("{} service is not properly configured", .0.display_name())]
    Unavailable(BackendKind),

    #[error("Error calling {} API: {message}", .kind.display_name())]
    Upstream { kind: BackendKind, message: String },
}

impl BackendError {
    pub fn upstream(kind: BackendKind, message: impl Into<String>) -> Self {
        Self::Upstream {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Unavailable(kind) => *kind,
            Self::Upstream { kind, .. } => *kind,
        }
    }
}
