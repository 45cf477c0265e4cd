use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

mod views;

pub use views::{
    ChatColors, FontConfig, HistoryConfig, HuggingFaceConfig, LmStudioConfig, SettingsForm,
    UiConfig,
};

/// Shipped defaults. The user file only ever shadows these.
pub const DEFAULT_SETTINGS: &str = include_str!("../assets/default_settings.json");
pub const USER_SETTINGS_FILE: &str = "user_settings.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("setting not found: {0}")]
    KeyNotFound(String),

    #[error("user settings at {} must be a JSON object", .path.display())]
    InvalidOverride { path: PathBuf },

    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("setting `{key}` must be between {min} and {max}, got {value}")]
    OutOfRange {
        key: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("setting `{key}` has an unexpected shape: {source}")]
    Shape {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

pub type SharedSettings = Arc<RwLock<Settings>>;

#[derive(Debug, Clone)]
enum Defaults {
    Bundled,
    Custom(Value),
}

/// Owns the two on-disk layers: bundled defaults and the user override file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    defaults: Defaults,
    path: PathBuf,
}

impl ConfigStore {
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            defaults: Defaults::Bundled,
            path: dir.into().join(USER_SETTINGS_FILE),
        }
    }

    pub fn with_defaults(mut self, defaults: Value) -> Self {
        self.defaults = Defaults::Custom(defaults);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn defaults(&self) -> Result<Value> {
        match &self.defaults {
            Defaults::Bundled => Ok(serde_json::from_str(DEFAULT_SETTINGS)?),
            Defaults::Custom(value) => Ok(value.clone()),
        }
    }

    /// Returns the merged tree, creating the override file as a copy of
    /// the defaults on first run.
    pub fn load(&self) -> Result<Value> {
        let defaults = self.defaults()?;

        if !self.path.exists() {
            info!(path = %self.path.display(), "creating user settings from defaults");
            self.save(&defaults)?;
            return Ok(defaults);
        }

        let raw = fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        let user: Value = serde_json::from_str(&raw)?;
        if !user.is_object() {
            return Err(ConfigError::InvalidOverride {
                path: self.path.clone(),
            });
        }
        Ok(merge_settings(&defaults, &user))
    }

    pub fn save(&self, tree: &Value) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let text = serde_json::to_string_pretty(tree)?;
        fs::write(&self.path, text).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn remove_override(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        fs::remove_file(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Overlays `user` on `default`. Objects merge key by key; any other user
/// value replaces the default outright.
pub fn merge_settings(default: &Value, user: &Value) -> Value {
    match (default, user) {
        (Value::Object(default_map), Value::Object(user_map)) => {
            let mut merged = default_map.clone();
            for (key, value) in user_map {
                let entry = match merged.get(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_settings(existing, value)
                    }
                    _ => value.clone(),
                };
                merged.insert(key.clone(), entry);
            }
            Value::Object(merged)
        }
        _ => user.clone(),
    }
}

/// The merged configuration tree plus the store it persists to.
#[derive(Debug)]
pub struct Settings {
    store: ConfigStore,
    tree: Value,
}

impl Settings {
    pub fn load(store: ConfigStore) -> Result<Self> {
        let tree = store.load()?;
        Ok(Self { store, tree })
    }

    pub fn into_shared(self) -> SharedSettings {
        Arc::new(RwLock::new(self))
    }

    pub fn tree(&self) -> &Value {
        &self.tree
    }

    pub fn get(&self, path: &[&str]) -> Result<&Value> {
        let mut current = &self.tree;
        for (depth, key) in path.iter().enumerate() {
            current = current
                .as_object()
                .and_then(|map| map.get(*key))
                .ok_or_else(|| ConfigError::KeyNotFound(join_path(&path[..=depth])))?;
        }
        Ok(current)
    }

    pub fn get_as<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T> {
        let value = self.get(path)?.clone();
        serde_json::from_value(value).map_err(|source| ConfigError::Shape {
            key: join_path(path),
            source,
        })
    }

    pub fn get_dotted(&self, key: &str) -> Result<&Value> {
        let path = split_dotted(key)?;
        self.get(&path)
    }

    /// Assigns `value` at `path` and rewrites the whole override file.
    pub fn set(&mut self, path: &[&str], value: impl Into<Value>) -> Result<()> {
        let Some((last, parents)) = path.split_last() else {
            return Err(ConfigError::KeyNotFound(String::new()));
        };

        let parent = navigate_mut(&mut self.tree, parents)?;
        parent.insert((*last).to_string(), value.into());
        debug!(key = %join_path(path), "setting updated");
        self.store.save(&self.tree)
    }

    pub fn set_dotted(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let path = split_dotted(key)?;
        self.set(&path, value)
    }

    pub fn reset(&mut self) -> Result<()> {
        info!(path = %self.store.path().display(), "resetting settings to defaults");
        self.store.remove_override()?;
        self.tree = self.store.load()?;
        Ok(())
    }
}

fn navigate_mut<'a>(tree: &'a mut Value, path: &[&str]) -> Result<&'a mut Map<String, Value>> {
    let mut current = tree;
    for (depth, key) in path.iter().enumerate() {
        current = current
            .as_object_mut()
            .and_then(|map| map.get_mut(*key))
            .ok_or_else(|| ConfigError::KeyNotFound(join_path(&path[..=depth])))?;
    }
    current
        .as_object_mut()
        .ok_or_else(|| ConfigError::KeyNotFound(join_path(path)))
}

fn join_path(path: &[&str]) -> String {
    path.join(".")
}

fn split_dotted(key: &str) -> Result<Vec<&str>> {
    let path: Vec<&str> = key.split('.').collect();
    if path.iter().any(|segment| segment.is_empty()) {
        return Err(ConfigError::KeyNotFound(key.to_string()));
    }
    Ok(path)
}
