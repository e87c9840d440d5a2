//! Configuration parsing and validation for modellab.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::pricing::{PricingEntry, PricingError, PricingTable};

/// Convention env vars consulted, in order, when no `api_key` is configured.
pub const API_KEY_ENV_VARS: &[&str] = &["MODELLAB_API_KEY", "OPENROUTER_API_KEY"];

/// Env var overriding `upstream.default_model`.
pub const DEFAULT_MODEL_ENV_VAR: &str = "MODELLAB_DEFAULT_MODEL";

/// Root configuration structure.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    /// Extra or replacement pricing entries keyed by canonical model id.
    pub pricing: BTreeMap<String, PricingEntry>,
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:8000")
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Allowed CORS origins; `*` allows any
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_listen() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Upstream aggregation API configuration.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL, e.g. "https://openrouter.ai/api/v1"
    pub url: String,
    pub api_key: Option<ApiKey>,
    /// Sent as `HTTP-Referer`
    pub referer: String,
    /// Sent as `X-Title`
    pub title: String,
    /// Model used when a request does not name one
    pub default_model: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

fn default_upstream_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_referer() -> String {
    "http://localhost:3000".to_string()
}

fn default_title() -> String {
    "Model Lab".to_string()
}

fn default_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Upstream API key. Never printed: `Debug` shows a placeholder.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// The raw key, for the `Authorization` header only.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

impl From<String> for ApiKey {
    fn from(key: String) -> Self {
        ApiKey(SecretString::from(key))
    }
}

impl From<&str> for ApiKey {
    fn from(key: &str) -> Self {
        ApiKey(SecretString::from(key))
    }
}

/// How the upstream API key was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    /// Key was a literal string in config (no ${} references)
    Literal,
    /// Key contained ${VAR} references expanded from environment
    EnvExpanded,
    /// Key was auto-discovered from convention env var (holds var name)
    Convention(String),
    /// No key available
    None,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Literal => write!(f, "config-literal"),
            KeySource::EnvExpanded => write!(f, "env-expanded"),
            KeySource::Convention(var) => write!(f, "convention ({})", var),
            KeySource::None => write!(f, "none"),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Cannot expand '{var}' in '{field}': {message}")]
    EnvVar {
        var: String,
        field: String,
        message: String,
    },

    #[error("Invalid pricing configuration: {0}")]
    Pricing(#[from] PricingError),
}

/// Raw upstream section deserialized directly from TOML.
/// String values may contain `${VAR}` references not yet expanded.
#[derive(Debug, Default, Deserialize)]
pub struct RawUpstreamConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub referer: Option<String>,
    pub title: Option<String>,
    pub default_model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
}

/// Raw configuration deserialized directly from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: RawUpstreamConfig,
    #[serde(default)]
    pub pricing: BTreeMap<String, PricingEntry>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Replace every `${NAME}` in `input` with `lookup(NAME)`.
///
/// A `$` not followed by `{` is literal. An unset variable, a missing `}`
/// or an empty name is an error naming `field`.
fn expand_env_vars_with<F>(input: &str, field: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let env_error = |var: &str, message: String| ConfigError::EnvVar {
        var: var.to_string(),
        field: field.to_string(),
        message,
    };

    let mut expanded = String::with_capacity(input.len());
    let mut remaining = input;

    while let Some((literal, reference)) = remaining.split_once("${") {
        expanded.push_str(literal);

        let (name, rest) = reference
            .split_once('}')
            .ok_or_else(|| env_error("${", format!("unclosed reference in '{}'", input)))?;
        if name.is_empty() {
            return Err(env_error(name, "empty variable name".to_string()));
        }

        let value = lookup(name).ok_or_else(|| env_error(name, "variable is not set".to_string()))?;
        expanded.push_str(&value);
        remaining = rest;
    }

    expanded.push_str(remaining);
    Ok(expanded)
}

/// Expand an optional raw value, falling back to `default` when absent.
fn expand_or<F>(
    raw: Option<String>,
    field: &str,
    default: fn() -> String,
    lookup: &F,
) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match raw {
        Some(value) => expand_env_vars_with(&value, field, lookup),
        None => Ok(default()),
    }
}

/// Resolve the API key and report where it came from.
///
/// - `${VAR}` in the configured key: expanded, source = `EnvExpanded`
/// - Any other configured value: used as is, source = `Literal`
/// - Absent: first set convention var in [`API_KEY_ENV_VARS`], or `KeySource::None`
fn resolve_api_key<F>(
    raw: Option<String>,
    lookup: &F,
) -> Result<(Option<ApiKey>, KeySource), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match raw {
        Some(raw_key) if raw_key.contains("${") => {
            let expanded = expand_env_vars_with(&raw_key, "upstream.api_key", lookup)?;
            Ok((Some(ApiKey::from(expanded)), KeySource::EnvExpanded))
        }
        Some(raw_key) => Ok((Some(ApiKey::from(raw_key)), KeySource::Literal)),
        None => Ok(API_KEY_ENV_VARS
            .iter()
            .find_map(|&var| {
                lookup(var)
                    .filter(|value| !value.is_empty())
                    .map(|value| (var.to_string(), value))
            })
            .map(|(var, value)| (Some(ApiKey::from(value)), KeySource::Convention(var)))
            .unwrap_or((None, KeySource::None))),
    }
}

impl Config {
    /// Convert raw (deserialized) config to final config with env var expansion.
    pub fn from_raw(raw: RawConfig) -> Result<(Self, KeySource), ConfigError> {
        Self::from_raw_with(raw, |name| std::env::var(name).ok())
    }

    /// Convert raw config using a custom variable lookup.
    pub fn from_raw_with<F>(raw: RawConfig, lookup: F) -> Result<(Self, KeySource), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let up = raw.upstream;
        let (api_key, key_source) = resolve_api_key(up.api_key, &lookup)?;

        let default_model = match lookup(DEFAULT_MODEL_ENV_VAR).filter(|m| !m.trim().is_empty()) {
            Some(model) => model.trim().to_string(),
            None => up.default_model.unwrap_or_else(default_model),
        };

        let upstream = UpstreamConfig {
            url: expand_or(up.url, "upstream.url", default_upstream_url, &lookup)?,
            api_key,
            referer: expand_or(up.referer, "upstream.referer", default_referer, &lookup)?,
            title: expand_or(up.title, "upstream.title", default_title, &lookup)?,
            default_model,
            timeout_secs: up.timeout_secs.unwrap_or_else(default_timeout_secs),
            connect_timeout_secs: up
                .connect_timeout_secs
                .unwrap_or_else(default_connect_timeout_secs),
        };

        let config = Config {
            server: raw.server,
            upstream,
            pricing: raw.pricing,
            logging: raw.logging,
        };

        Ok((config, key_source))
    }

    /// Load configuration from a TOML file with environment variable expansion.
    ///
    /// Returns the config and the API key source.
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<(Self, KeySource), ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        let raw: RawConfig = toml::from_str(&content)?;
        let (config, key_source) = Self::from_raw(raw)?;
        config.validate()?;

        Ok((config, key_source))
    }

    /// Load from `path` if it exists, otherwise build entirely from defaults
    /// and the environment.
    pub fn load(path: impl AsRef<Path>) -> Result<(Self, KeySource), ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            return Self::from_file_with_env(path);
        }

        tracing::info!(
            path = %path.display(),
            "Config file not found, using defaults and environment"
        );
        let (config, key_source) = Self::from_raw(RawConfig::default())?;
        config.validate()?;
        Ok((config, key_source))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.url.trim().is_empty() {
            return Err(ConfigError::Validation("upstream.url is empty".to_string()));
        }

        if self.upstream.default_model.trim().is_empty() {
            return Err(ConfigError::Validation(
                "upstream.default_model is empty".to_string(),
            ));
        }

        if self.server.cors_origins.is_empty() {
            return Err(ConfigError::Validation(
                "server.cors_origins must list at least one origin".to_string(),
            ));
        }

        if self.upstream.api_key.is_none() {
            tracing::warn!(
                "No upstream API key configured - upstream calls will fail authentication"
            );
        }

        // Catch bad rates at startup rather than on first request.
        self.pricing_table_with(|_| None)?;

        Ok(())
    }

    /// Build the pricing table: compiled-in defaults, then `[pricing]`
    /// entries from this config, then environment overrides.
    pub fn pricing_table(&self) -> Result<PricingTable, ConfigError> {
        self.pricing_table_with(|name| std::env::var(name).ok())
    }

    /// Build the pricing table with a custom override lookup.
    pub fn pricing_table_with<F>(&self, lookup: F) -> Result<PricingTable, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut table = PricingTable::builtin()?;
        table.merge(&self.pricing)?;
        table.apply_overrides_with(lookup);
        Ok(table)
    }

    /// Whether any configured CORS origin is the wildcard.
    pub fn allows_any_origin(&self) -> bool {
        self.server.cors_origins.iter().any(|o| o == "*")
    }
}
