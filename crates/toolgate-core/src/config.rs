//! Configuration management for toolgate
//!
//! Loads configuration with priority:
//! 1. toolgate.toml (or specified config file), with `${VAR}` references resolved
//! 2. Environment variables (fallback for values the file leaves unset)
//! 3. Defaults
//!
//! Command-line flags are layered on top by the binary. The engine never reads
//! the environment itself; it receives the resolved values.

use crate::credentials::Credentials;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "toolgate.toml";

/// toolgate configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub spec: SpecConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub auth: AuthSettings,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the OpenAPI document lives
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecConfig {
    /// File path or http(s) URL
    pub path: Option<String>,
}

/// Upstream API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL used instead of the spec's servers
    pub base_url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Static headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Credentials (values may reference env vars with ${VAR_NAME})
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSettings {
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
    /// "user:pass"
    pub basic: Option<String>,
}

/// Tool generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Keep only operations whose summary/description matches
    pub include_desc_regex: Option<String>,

    /// Drop operations whose summary/description matches
    pub exclude_desc_regex: Option<String>,

    /// One of: as-is, snake, lower, upper
    #[serde(default = "default_name_format")]
    pub name_format: String,

    pub prefix: Option<String>,

    /// Require `__confirmed: true` before PUT/POST/DELETE/PATCH
    #[serde(default = "default_true")]
    pub confirm_dangerous: bool,

    /// Fail on spec defects instead of repairing them
    #[serde(default)]
    pub strict: bool,

    /// Register tools without binding them to HTTP execution
    #[serde(default)]
    pub dry_run: bool,
}

/// HTTP transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout_secs(),
            headers: BTreeMap::new(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            include_desc_regex: None,
            exclude_desc_regex: None,
            name_format: default_name_format(),
            prefix: None,
            confirm_dangerous: true,
            strict: false,
            dry_run: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

impl GateConfig {
    /// Load configuration with the following priority:
    /// 1. toolgate.toml in the current directory or a parent
    /// 2. Environment variables (fallback)
    /// 3. Defaults
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file, or search for one when `path` is `None`
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::find_config_file()?,
        };

        let mut config = match config_path {
            Some(config_path) => {
                tracing::debug!("Loading configuration from: {:?}", config_path);

                let contents = fs::read_to_string(&config_path)
                    .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

                toml::from_str::<GateConfig>(&contents)
                    .with_context(|| format!("Failed to parse config file: {:?}", config_path))?
            }
            None => {
                tracing::debug!("No {} found, using defaults", CONFIG_FILE_NAME);
                GateConfig::default()
            }
        };

        let lookup = |name: &str| env::var(name).ok();
        config.resolve_env_vars(&lookup);
        config.apply_env_fallbacks(&lookup);

        Ok(config)
    }

    /// Find toolgate.toml by searching current directory and parents
    fn find_config_file() -> Result<Option<PathBuf>> {
        let mut current = env::current_dir()?;

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Ok(Some(config_path));
            }

            if !current.pop() {
                return Ok(None);
            }
        }
    }

    /// Resolve ${VAR_NAME} references in every string that may hold a secret or URL
    fn resolve_env_vars(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        let resolve = |slot: &mut Option<String>| {
            if let Some(value) = slot.take() {
                *slot = Self::resolve_env_var(&value, lookup);
            }
        };

        resolve(&mut self.spec.path);
        resolve(&mut self.upstream.base_url);
        resolve(&mut self.auth.api_key);
        resolve(&mut self.auth.bearer_token);
        resolve(&mut self.auth.basic);

        for value in self.upstream.headers.values_mut() {
            if let Some(resolved) = Self::resolve_env_var(value, lookup) {
                *value = resolved;
            }
        }
    }

    /// Fill values the file left unset from the conventional environment variables
    fn apply_env_fallbacks(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if self.upstream.base_url.is_none() {
            self.upstream.base_url = non_empty("OPENAPI_BASE_URL");
        }
        if self.auth.api_key.is_none() {
            self.auth.api_key = non_empty("API_KEY");
        }
        if self.auth.bearer_token.is_none() {
            self.auth.bearer_token = non_empty("BEARER_TOKEN");
        }
        if self.auth.basic.is_none() {
            self.auth.basic = non_empty("BASIC_AUTH");
        }
        if self.upstream.headers.is_empty() {
            if let Some(raw) = non_empty("REQUEST_HEADERS") {
                match Credentials::parse_header_list(&raw) {
                    Ok(headers) => self.upstream.headers = headers,
                    Err(e) => tracing::warn!("Ignoring REQUEST_HEADERS: {}", e),
                }
            }
        }
    }

    /// Resolve a single ${VAR_NAME} reference
    fn resolve_env_var(value: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Option<String> {
        if value.starts_with("${") && value.ends_with('}') {
            let var_name = &value[2..value.len() - 1];
            lookup(var_name)
        } else {
            Some(value.to_string())
        }
    }

    /// Credentials described by this configuration
    pub fn credentials(&self) -> crate::Result<Credentials> {
        let basic = self
            .auth
            .basic
            .as_deref()
            .map(Credentials::parse_basic)
            .transpose()?;

        Ok(Credentials {
            api_key: self.auth.api_key.clone(),
            bearer_token: self.auth.bearer_token.clone(),
            basic,
            headers: self.upstream.headers.clone(),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_secs)
    }

    /// The spec location, with a clear error when none was configured
    pub fn spec_path(&self) -> Result<&str> {
        self.spec.path.as_deref().ok_or_else(|| {
            anyhow!(
                "No OpenAPI spec configured. Pass one on the command line or set it in {}:\n\
                [spec]\n\
                path = \"./openapi.yaml\"",
                CONFIG_FILE_NAME
            )
        })
    }

    /// Create test-friendly defaults
    pub fn test_defaults() -> Self {
        Self {
            spec: SpecConfig {
                path: Some("openapi.yaml".to_string()),
            },
            upstream: UpstreamConfig {
                base_url: Some("http://127.0.0.1:9".to_string()),
                timeout_secs: 5,
                headers: BTreeMap::new(),
            },
            auth: AuthSettings::default(),
            tools: ToolsConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_name_format() -> String {
    "as-is".to_string()
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}
