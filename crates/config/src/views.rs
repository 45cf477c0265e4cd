use std::time::Duration;

use core_types::BackendKind;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{ConfigError, Result, Settings};

const FONT_SIZE_MIN: u64 = 8;
const FONT_SIZE_MAX: u64 = 24;
const MAX_MESSAGES_MIN: u64 = 10;
const MAX_MESSAGES_MAX: u64 = 1000;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HuggingFaceConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LmStudioConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub model_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatColors {
    pub user_bubble: String,
    pub ai_bubble: String,
    pub background: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FontConfig {
    pub size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UiConfig {
    pub theme: String,
    pub chat_colors: ChatColors,
    pub font: FontConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryConfig {
    pub max_messages: usize,
    pub auto_save: bool,
}

impl Settings {
    /// Raw selection string. Validation belongs to the backend factory.
    pub fn active_backend(&self) -> Result<String> {
        self.get_as(&["ai_backend", "active_backend"])
    }

    pub fn set_active_backend(&mut self, kind: BackendKind) -> Result<()> {
        self.set(&["ai_backend", "active_backend"], kind.as_str())
    }

    pub fn request_timeout(&self) -> Result<Duration> {
        let secs: u64 = self.get_as(&["ai_backend", "request_timeout_secs"])?;
        Ok(Duration::from_secs(secs))
    }

    pub fn huggingface(&self) -> Result<HuggingFaceConfig> {
        self.get_as(&["ai_backend", BackendKind::Cloud.provider_name()])
    }

    pub fn lmstudio(&self) -> Result<LmStudioConfig> {
        self.get_as(&["ai_backend", BackendKind::Local.provider_name()])
    }

    pub fn ui(&self) -> Result<UiConfig> {
        self.get_as(&["ui"])
    }

    pub fn history(&self) -> Result<HistoryConfig> {
        self.get_as(&["history"])
    }
}

/// Every user-editable field, as the settings dialog presents them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsForm {
    pub active_backend: String,
    pub huggingface: HuggingFaceConfig,
    pub lmstudio: LmStudioConfig,
    pub ui: UiConfig,
    pub history: HistoryConfig,
}

impl SettingsForm {
    pub fn load(settings: &Settings) -> Result<Self> {
        Ok(Self {
            active_backend: settings.active_backend()?,
            huggingface: settings.huggingface()?,
            lmstudio: settings.lmstudio()?,
            ui: settings.ui()?,
            history: settings.history()?,
        })
    }

    /// Rejects values the dialog's spin boxes would not allow.
    pub fn validate(&self) -> Result<()> {
        check_range(
            "ai_backend.lmstudio.port",
            u64::from(self.lmstudio.port),
            1,
            u64::from(u16::MAX),
        )?;
        check_range(
            "ui.font.size",
            u64::from(self.ui.font.size),
            FONT_SIZE_MIN,
            FONT_SIZE_MAX,
        )?;
        check_range(
            "history.max_messages",
            self.history.max_messages as u64,
            MAX_MESSAGES_MIN,
            MAX_MESSAGES_MAX,
        )
    }

    /// Writes each field back individually; every write persists. Nothing
    /// is written when validation fails.
    pub fn apply(&self, settings: &mut Settings) -> Result<()> {
        self.validate()?;

        settings.set(
            &["ai_backend", "active_backend"],
            self.active_backend.as_str(),
        )?;

        let hf = BackendKind::Cloud.provider_name();
        settings.set(&["ai_backend", hf, "api_key"], self.huggingface.api_key.as_str())?;
        settings.set(&["ai_backend", hf, "model"], self.huggingface.model.as_str())?;
        settings.set(&["ai_backend", hf, "endpoint"], self.huggingface.endpoint.as_str())?;

        let lm = BackendKind::Local.provider_name();
        settings.set(&["ai_backend", lm, "host"], self.lmstudio.host.as_str())?;
        settings.set(&["ai_backend", lm, "port"], self.lmstudio.port)?;
        settings.set(&["ai_backend", lm, "model_path"], self.lmstudio.model_path.as_str())?;

        settings.set(&["ui", "theme"], self.ui.theme.to_lowercase())?;
        let colors = &self.ui.chat_colors;
        settings.set(
            &["ui", "chat_colors"],
            json!({
                "user_bubble": colors.user_bubble,
                "ai_bubble": colors.ai_bubble,
                "background": colors.background,
            }),
        )?;
        settings.set(&["ui", "font", "size"], self.ui.font.size)?;

        settings.set(&["history", "max_messages"], self.history.max_messages)?;
        settings.set(&["history", "auto_save"], self.history.auto_save)
    }
}

fn check_range(key: &'static str, value: u64, min: u64, max: u64) -> Result<()> {
    if (min..=max).contains(&value) {
        return Ok(());
    }
    Err(ConfigError::OutOfRange {
        key,
        value,
        min,
        max,
    })
}
