//! Configuration snapshots, defaults and the persistence seam.
//!
//! A [`ConfigSnapshot`] is a flat, immutable map of dotted keys (`messages.enable_join`)
//! to scalar values. On disk the same data is a nested JSON document:
//!
//! ```json
//! { "telegram": { "token": "123:abc", "chat_id": "-100200" },
//!   "messages": { "enable_join": true, "parse_mode": "none" } }
//! ```
//!
//! Persisted documents are always merged over [`ConfigSnapshot::defaults`], so every
//! key the relay reads has a value even when the file predates it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::EventKind;
use crate::error::{ConfigError, ConfigResult};

pub const TOKEN_KEY: &str = "telegram.token";
pub const CHAT_ID_KEY: &str = "telegram.chat_id";
pub const API_URL_KEY: &str = "telegram.api_url";
pub const PARSE_MODE_KEY: &str = "messages.parse_mode";
pub const CHECK_SECONDS_KEY: &str = "messages.low_tps_check_seconds";
pub const THRESHOLD_KEY: &str = "messages.low_tps_threshold";
pub const COOLDOWN_SECONDS_KEY: &str = "messages.low_tps_cooldown_seconds";
pub const RELOAD_TEMPLATE_KEY: &str = "messages.reload";

pub const TOKEN_PLACEHOLDER: &str = "YOUR_TELEGRAM_BOT_TOKEN";
pub const CHAT_ID_PLACEHOLDER: &str = "YOUR_CHAT_ID";

const DEFAULT_API_URL: &str = "https://api.telegram.org";
const DEFAULT_PARSE_MODE: &str = "none";
const DEFAULT_RELOAD_TEMPLATE: &str = "✅ Configuration reloaded by {who}.";

fn default_check_seconds() -> i64 {
    15
}

fn default_threshold() -> f64 {
    16.0
}

fn default_cooldown_seconds() -> i64 {
    300
}

/// A single scalar configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(value) => write!(f, "{value}"),
            ConfigValue::Int(value) => write!(f, "{value}"),
            ConfigValue::Float(value) => write!(f, "{value}"),
            ConfigValue::String(value) => f.write_str(value),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

/// Where and as whom messages are delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telegram {
    /// Base URL of the Bot API, without trailing slash
    pub api_url: String,
    pub token: String,
    pub chat_id: String,
}

/// Settings the health monitor reads on every tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthSettings {
    pub check_interval: Duration,
    pub threshold: f64,
    pub cooldown: Duration,
}

/// Immutable view of the whole configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSnapshot {
    values: BTreeMap<String, ConfigValue>,
}

impl ConfigSnapshot {
    /// An empty snapshot. Every getter falls back to its default.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The shipped defaults, including placeholder credentials.
    pub fn defaults() -> Self {
        let mut values = BTreeMap::new();
        values.insert(TOKEN_KEY.to_string(), TOKEN_PLACEHOLDER.into());
        values.insert(CHAT_ID_KEY.to_string(), CHAT_ID_PLACEHOLDER.into());
        values.insert(API_URL_KEY.to_string(), DEFAULT_API_URL.into());
        values.insert(PARSE_MODE_KEY.to_string(), DEFAULT_PARSE_MODE.into());
        values.insert(CHECK_SECONDS_KEY.to_string(), default_check_seconds().into());
        values.insert(THRESHOLD_KEY.to_string(), default_threshold().into());
        values.insert(COOLDOWN_SECONDS_KEY.to_string(), default_cooldown_seconds().into());
        values.insert(RELOAD_TEMPLATE_KEY.to_string(), DEFAULT_RELOAD_TEMPLATE.into());

        for kind in EventKind::ALL {
            values.insert(kind.flag_key(), kind.default_enabled().into());
            values.insert(kind.template_key(), kind.default_template().into());
        }

        Self { values }
    }

    /// Flatten a nested JSON document into dotted keys.
    ///
    /// `null` leaves are skipped, arrays are rejected.
    pub fn from_document(document: &Value) -> ConfigResult<Self> {
        let Value::Object(root) = document else {
            return Err(ConfigError::Parse(
                "top level of the configuration must be an object".to_string(),
            ));
        };

        let mut values = BTreeMap::new();
        flatten_into(&mut values, "", root)?;
        Ok(Self { values })
    }

    /// Parse a persisted document and lay it over the defaults.
    pub fn from_document_with_defaults(document: &Value) -> ConfigResult<Self> {
        let persisted = Self::from_document(document)?;
        Ok(Self::defaults().merged_with(&persisted))
    }

    /// Nest the dotted keys back into a JSON document.
    pub fn to_document(&self) -> Value {
        let mut root = Map::new();
        for (key, value) in &self.values {
            insert_nested(&mut root, key, value);
        }
        Value::Object(root)
    }

    /// New snapshot containing `self`'s values overwritten by `other`'s.
    pub fn merged_with(&self, other: &ConfigSnapshot) -> ConfigSnapshot {
        let mut values = self.values.clone();
        values.extend(other.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { values }
    }

    /// New snapshot equal to this one except for `key`.
    pub fn with_value(&self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        let mut values = self.values.clone();
        values.insert(key.into(), value.into());
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.values.iter()
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(ConfigValue::Bool(value)) => *value,
            Some(ConfigValue::String(value)) => value.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(ConfigValue::String(value)) => Some(value),
            _ => None,
        }
    }

    /// Any scalar rendered as text. Numeric chat ids are common in hand-written files.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).map(ToString::to_string)
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        match self.values.get(key) {
            Some(ConfigValue::Int(value)) => *value,
            Some(ConfigValue::Float(value)) => *value as i64,
            Some(ConfigValue::String(value)) => value.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_float(&self, key: &str, default: f64) -> f64 {
        match self.values.get(key) {
            Some(ConfigValue::Float(value)) => *value,
            Some(ConfigValue::Int(value)) => *value as f64,
            Some(ConfigValue::String(value)) => value.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn is_enabled(&self, kind: EventKind) -> bool {
        self.get_bool(&kind.flag_key(), kind.default_enabled())
    }

    pub fn template(&self, kind: EventKind) -> &str {
        self.get_str(&kind.template_key())
            .unwrap_or(kind.default_template())
    }

    pub fn reload_template(&self) -> &str {
        self.get_str(RELOAD_TEMPLATE_KEY)
            .unwrap_or(DEFAULT_RELOAD_TEMPLATE)
    }

    /// The configured render mode, or `None` when markup is disabled.
    pub fn parse_mode(&self) -> Option<&str> {
        self.get_str(PARSE_MODE_KEY)
            .map(str::trim)
            .filter(|mode| !mode.is_empty() && !mode.eq_ignore_ascii_case("none"))
    }

    pub fn health_settings(&self) -> HealthSettings {
        let check_seconds = self
            .get_int(CHECK_SECONDS_KEY, default_check_seconds())
            .max(1) as u64;
        let cooldown_seconds = self
            .get_int(COOLDOWN_SECONDS_KEY, default_cooldown_seconds())
            .max(0) as u64;

        HealthSettings {
            check_interval: Duration::from_secs(check_seconds),
            threshold: self.get_float(THRESHOLD_KEY, default_threshold()),
            cooldown: Duration::from_secs(cooldown_seconds),
        }
    }

    /// Validated delivery target. Fails when either credential is blank or a placeholder.
    pub fn telegram(&self) -> ConfigResult<Telegram> {
        let token = self.get_string(TOKEN_KEY).unwrap_or_default();
        let chat_id = self.get_string(CHAT_ID_KEY).unwrap_or_default();

        if token.trim().is_empty() || token.contains(TOKEN_PLACEHOLDER) {
            return Err(ConfigError::InvalidCredentials(format!(
                "please set {TOKEN_KEY}"
            )));
        }

        if chat_id.trim().is_empty() || chat_id.contains(CHAT_ID_PLACEHOLDER) {
            return Err(ConfigError::InvalidCredentials(format!(
                "please set {CHAT_ID_KEY}"
            )));
        }

        let api_url = self
            .get_str(API_URL_KEY)
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Telegram {
            api_url,
            token: token.trim().to_string(),
            chat_id: chat_id.trim().to_string(),
        })
    }
}

fn flatten_into(
    values: &mut BTreeMap<String, ConfigValue>,
    prefix: &str,
    object: &Map<String, Value>,
) -> ConfigResult<()> {
    for (name, value) in object {
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };

        match value {
            Value::Object(nested) => flatten_into(values, &key, nested)?,
            Value::Null => trace!("skipping null configuration value {key}"),
            Value::Array(_) => {
                return Err(ConfigError::InvalidValue {
                    key,
                    expected: "scalar",
                });
            }
            scalar => {
                let value = serde_json::from_value::<ConfigValue>(scalar.clone())?;
                values.insert(key, value);
            }
        }
    }

    Ok(())
}

fn insert_nested(root: &mut Map<String, Value>, key: &str, value: &ConfigValue) {
    let mut segments = key.split('.').peekable();
    let mut current = root;

    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(
                segment.to_string(),
                serde_json::to_value(value).unwrap_or(Value::Null),
            );
            return;
        }

        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else {
            return;
        };
        current = next;
    }
}

/// Persistence collaborator. The relay never touches storage directly.
pub trait ConfigStore: Send + Sync {
    /// Load the persisted configuration merged over the defaults.
    fn load(&self) -> ConfigResult<ConfigSnapshot>;

    /// Persist a snapshot after it has been published.
    fn save(&self, snapshot: &ConfigSnapshot) -> ConfigResult<()>;
}

/// Stores the configuration as a pretty-printed JSON document
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self) -> ConfigResult<ConfigSnapshot> {
        if !self.path.exists() {
            warn!(
                "{} does not exist, writing default configuration",
                self.path.display()
            );
            let defaults = ConfigSnapshot::defaults();
            self.save(&defaults)?;
            return Ok(defaults);
        }

        let snapshot = read_config_file(&self.path)?;

        // copy any keys the file is missing back to disk
        if !snapshot_is_persisted(&self.path, &snapshot)? {
            debug!("adding missing default keys to {}", self.path.display());
            self.save(&snapshot)?;
        }

        Ok(snapshot)
    }

    fn save(&self, snapshot: &ConfigSnapshot) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(&snapshot.to_document())?;
        std::fs::write(&self.path, content)?;
        trace!("saved configuration to {}", self.path.display());
        Ok(())
    }
}

fn snapshot_is_persisted(path: &Path, snapshot: &ConfigSnapshot) -> ConfigResult<bool> {
    let content = std::fs::read_to_string(path)?;
    let document: Value = serde_json::from_str(&content)?;
    Ok(ConfigSnapshot::from_document(&document)?.len() == snapshot.len())
}

/// Keeps the configuration in memory. Useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    persisted: Mutex<ConfigSnapshot>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        Self {
            persisted: Mutex::new(ConfigSnapshot::defaults().merged_with(&snapshot)),
            saves: Mutex::new(0),
        }
    }

    /// Replace what the next `load` returns, as if someone edited the file.
    pub fn replace(&self, snapshot: ConfigSnapshot) {
        if let Ok(mut persisted) = self.persisted.lock() {
            *persisted = ConfigSnapshot::defaults().merged_with(&snapshot);
        }
    }

    pub fn persisted(&self) -> ConfigSnapshot {
        self.persisted
            .lock()
            .map(|persisted| persisted.clone())
            .unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|saves| *saves).unwrap_or_default()
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> ConfigResult<ConfigSnapshot> {
        self.persisted
            .lock()
            .map(|persisted| persisted.clone())
            .map_err(|e| ConfigError::Store(e.to_string()))
    }

    fn save(&self, snapshot: &ConfigSnapshot) -> ConfigResult<()> {
        let mut persisted = self
            .persisted
            .lock()
            .map_err(|e| ConfigError::Store(e.to_string()))?;
        *persisted = snapshot.clone();

        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }
}

pub fn read_config_file(path: impl AsRef<Path>) -> ConfigResult<ConfigSnapshot> {
    let file_content = std::fs::read_to_string(path.as_ref())?;
    let document: Value = serde_json::from_str(&file_content)?;
    ConfigSnapshot::from_document_with_defaults(&document)
        .inspect(|config| trace!("loaded config with {} keys", config.len()))
}
