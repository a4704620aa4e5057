//! Settings sections and the layered loader that binds them.
//!
//! Every source is flattened into `Section:Key` pairs; later sources win.
//! The pairs are then folded into a JSON tree and each section deserializes
//! by its type name (`JwtSettings`, `DatabaseSettings`, ...).
//!
//! Sources, in order:
//! - in `Development`: the `.env` file, a JSON user-secrets file, then
//!   environment variables (`Section__Key`)
//! - otherwise: environment variables, then Azure Key Vault secrets
//!   prefixed `KlusterApi-`

pub mod key_vault;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use kluster_notifications::MailSettings;
use kluster_payments::PaystackSettings;
use kluster_users::JwtSettings;

use crate::db::DatabaseSettings;

pub use key_vault::{KeyVault, KeyVaultClient, SECRET_PREFIX};

/// Selects where secrets come from.
pub const ENVIRONMENT_VAR: &str = "APP_ENVIRONMENT";
/// Overrides the user-secrets file used in development.
pub const USER_SECRETS_VAR: &str = "KLUSTER_USER_SECRETS";
const DEFAULT_USER_SECRETS: &str = "secrets.json";

const SECTIONS: [&str; 9] = [
    "DatabaseSettings",
    "MessageBrokerSettings",
    "MailSettings",
    "PaystackSettings",
    "JwtSettings",
    "KeyVault",
    "CorsSettings",
    "ServerSettings",
    "JobSettings",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid .env file: {0}")]
    DotEnv(#[from] dotenvy::Error),

    #[error("failed to bind settings: {0}")]
    Bind(#[source] serde_json::Error),

    #[error("key vault: {0}")]
    KeyVault(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Production,
}

impl AppEnvironment {
    pub fn from_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("development") => AppEnvironment::Development,
            _ => AppEnvironment::Production,
        }
    }

    pub fn current() -> Self {
        Self::from_value(std::env::var(ENVIRONMENT_VAR).ok().as_deref())
    }

    pub fn is_development(self) -> bool {
        self == AppEnvironment::Development
    }
}

fn default_channel() -> String {
    "kluster.messages".to_string()
}

/// `MessageBrokerSettings` section. The in-memory bus is used when `Url` is empty.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageBrokerSettings {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_channel")]
    pub channel: String,
}

impl Default for MessageBrokerSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            channel: default_channel(),
        }
    }
}

impl MessageBrokerSettings {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum CorsPolicy {
    /// Only the hosted web client.
    #[default]
    AllowSimpleDev,
    AllowAnyOrigin,
}

/// `CorsSettings` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CorsSettings {
    pub policy: CorsPolicy,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// `ServerSettings` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port", deserialize_with = "kluster_core::settings::from_text")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_overdue_sweep_secs() -> u64 {
    3600
}

fn default_completed_retention_secs() -> u64 {
    3600
}

/// `JobSettings` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobSettings {
    #[serde(default = "default_poll_interval_ms", deserialize_with = "kluster_core::settings::from_text")]
    pub poll_interval_ms: u64,
    /// How often pending invoices are checked for their due date.
    #[serde(default = "default_overdue_sweep_secs", deserialize_with = "kluster_core::settings::from_text")]
    pub overdue_sweep_secs: u64,
    /// Completed jobs are deleted once they are this old.
    #[serde(
        default = "default_completed_retention_secs",
        deserialize_with = "kluster_core::settings::from_text"
    )]
    pub completed_retention_secs: u64,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            overdue_sweep_secs: default_overdue_sweep_secs(),
            completed_retention_secs: default_completed_retention_secs(),
        }
    }
}

/// All settings sections, keyed by type name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppSettings {
    #[serde(default, rename = "DatabaseSettings")]
    pub database: DatabaseSettings,
    #[serde(default, rename = "MessageBrokerSettings")]
    pub message_broker: MessageBrokerSettings,
    #[serde(default, rename = "MailSettings")]
    pub mail: MailSettings,
    #[serde(default, rename = "PaystackSettings")]
    pub paystack: PaystackSettings,
    #[serde(default, rename = "JwtSettings")]
    pub jwt: JwtSettings,
    #[serde(default, rename = "KeyVault")]
    pub key_vault: KeyVault,
    #[serde(default, rename = "CorsSettings")]
    pub cors: CorsSettings,
    #[serde(default, rename = "ServerSettings")]
    pub server: ServerSettings,
    #[serde(default, rename = "JobSettings")]
    pub jobs: JobSettings,
}

impl AppSettings {
    /// Load settings for the current [`AppEnvironment`].
    pub async fn load() -> Result<Self, ConfigError> {
        let environment = AppEnvironment::current();

        let layers = if environment.is_development() {
            tracing::info!("loading development secrets");
            let dotenv = match dotenvy::dotenv_iter() {
                Ok(iter) => iter.collect::<Result<Vec<_>, _>>()?,
                Err(err) if err.not_found() => {
                    tracing::debug!(".env file not found");
                    Vec::new()
                }
                Err(err) => return Err(err.into()),
            };
            let path = std::env::var(USER_SECRETS_VAR).unwrap_or_else(|_| DEFAULT_USER_SECRETS.to_string());
            SettingsLayers::development(dotenv, Path::new(&path), std::env::vars()).await?
        } else {
            let mut layers = SettingsLayers::new();
            layers.add_env_vars(std::env::vars());
            let partial = layers.bind()?;
            if partial.key_vault.is_configured() {
                tracing::info!(vault = %partial.key_vault.vault, "fetching secrets from key vault");
                let client = KeyVaultClient::new(reqwest::Client::new(), partial.key_vault);
                let secrets = client.fetch_prefixed(SECRET_PREFIX).await?;
                tracing::info!(count = secrets.len(), "key vault secrets retrieved");
                layers.add_pairs(secrets);
            } else {
                tracing::warn!("KeyVault section is not configured; using environment only");
            }
            layers
        };

        let settings = layers.bind()?;
        tracing::info!(environment = ?environment, "settings bound");
        Ok(settings)
    }
}

/// Flattened `Section:Key` pairs from every source, in priority order.
#[derive(Debug, Clone, Default)]
pub struct SettingsLayers {
    values: BTreeMap<String, String>,
}

impl SettingsLayers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys use `__` as the section separator; other variables are skipped.
    pub fn add_env_vars<I, K, V>(&mut self, vars: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let key = key.as_ref();
            if key.contains("__") {
                self.values.insert(key.replace("__", ":"), value.into());
            }
        }
        self
    }

    /// Keys already in `Section:Key` form.
    pub fn add_pairs<I, K, V>(&mut self, pairs: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in pairs {
            self.values.insert(key.into(), value.into());
        }
        self
    }

    /// Nested objects are flattened; scalars are kept as text.
    pub fn add_json(&mut self, value: &Value) -> &mut Self {
        flatten(None, value, &mut self.values);
        self
    }

    /// A missing file is not an error.
    pub async fn add_json_file(&mut self, path: &Path) -> Result<&mut Self, ConfigError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "user secrets file not found");
                return Ok(self);
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let value: Value = serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.add_json(&value))
    }

    /// Development layering: `.env`, then the user-secrets file, then the
    /// process environment, which always has the last word.
    pub async fn development<D, E, K, V>(dotenv: D, user_secrets: &Path, env_vars: E) -> Result<Self, ConfigError>
    where
        D: IntoIterator<Item = (String, String)>,
        E: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut layers = Self::new();
        layers.add_env_vars(dotenv);
        layers.add_json_file(user_secrets).await?;
        layers.add_env_vars(env_vars);
        Ok(layers)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Every known section is present, so field-level defaults apply even
    /// when no source mentions the section.
    pub fn to_value(&self) -> Value {
        let mut root = Map::new();
        for section in SECTIONS {
            root.insert(section.to_string(), Value::Object(Map::new()));
        }
        for (key, value) in &self.values {
            let segments: Vec<&str> = key.split(':').collect();
            insert_path(&mut root, &segments, value);
        }
        Value::Object(root)
    }

    pub fn bind(&self) -> Result<AppSettings, ConfigError> {
        serde_json::from_value(self.to_value()).map_err(ConfigError::Bind)
    }
}

fn flatten(prefix: Option<&str>, value: &Value, out: &mut BTreeMap<String, String>) {
    let join = |key: &str| match prefix {
        Some(p) => format!("{p}:{key}"),
        None => key.to_string(),
    };
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten(Some(&join(key)), child, out);
            }
        }
        Value::Null => {}
        Value::String(s) => {
            if let Some(p) = prefix {
                out.insert(p.to_string(), s.clone());
            }
        }
        other => {
            if let Some(p) = prefix {
                out.insert(p.to_string(), other.to_string());
            }
        }
    }
}

fn insert_path(node: &mut Map<String, Value>, segments: &[&str], value: &str) {
    match segments {
        [] => {}
        [leaf] => {
            node.insert((*leaf).to_string(), Value::String(value.to_string()));
        }
        [head, rest @ ..] => {
            let child = node
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                insert_path(map, rest, value);
            }
        }
    }
}
