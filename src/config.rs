//! Resolver configuration
//!
//! Static settings (sandbox root, reserved prefixes, token layout) come from an
//! optional TOML file; the strict-include switch can be overridden from the
//! process environment.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Environment variable that enables strict include mode
pub const STRICT_INCLUDES_ENV: &str = "STRICT_INCLUDES";

/// Errors that can occur when loading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Configuration for include, state and token resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    /// Sandbox root; no include may resolve outside it
    pub root: PathBuf,

    /// Abort resolution on the first `$include` failure instead of
    /// substituting a placeholder
    pub strict_includes: bool,

    /// Include prefixes resolved against the root instead of the including file
    pub reserved_prefixes: Vec<String>,

    /// Directory (relative to root) retried once for missing `components/` paths
    pub legacy_component_dir: PathBuf,

    /// Directory (relative to root) holding `colors.<theme>.json` tables
    pub tokens_dir: PathBuf,

    /// Leading character marking a token reference
    pub token_marker: char,

    /// Theme used when the caller does not name one
    pub default_theme: String,
}

/// TOML structure for deserializing a configuration file
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    root: Option<PathBuf>,
    strict_includes: Option<bool>,
    reserved_prefixes: Option<Vec<String>>,
    legacy_component_dir: Option<PathBuf>,
    tokens_dir: Option<PathBuf>,
    token_marker: Option<char>,
    default_theme: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("ui"),
            strict_includes: false,
            reserved_prefixes: vec!["components/".to_string(), "pages/".to_string()],
            legacy_component_dir: PathBuf::from("components/header"),
            tokens_dir: PathBuf::from("tokens"),
            token_marker: '@',
            default_theme: "light".to_string(),
        }
    }
}

impl ResolverConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    ///
    /// A relative `root` is interpreted relative to the config file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_str(&content)?;
        if config.root.is_relative() {
            if let Some(dir) = path.parent() {
                config.root = dir.join(&config.root);
            }
        }
        Ok(config)
    }

    /// Load configuration from a TOML string; missing keys keep their defaults
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let parsed: TomlConfig = toml::from_str(content)?;
        let defaults = Self::default();

        Ok(Self {
            root: parsed.root.unwrap_or(defaults.root),
            strict_includes: parsed.strict_includes.unwrap_or(defaults.strict_includes),
            reserved_prefixes: parsed.reserved_prefixes.unwrap_or(defaults.reserved_prefixes),
            legacy_component_dir: parsed
                .legacy_component_dir
                .unwrap_or(defaults.legacy_component_dir),
            tokens_dir: parsed.tokens_dir.unwrap_or(defaults.tokens_dir),
            token_marker: parsed.token_marker.unwrap_or(defaults.token_marker),
            default_theme: parsed.default_theme.unwrap_or(defaults.default_theme),
        })
    }

    /// Set the sandbox root
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Set strict include mode
    pub fn with_strict_includes(mut self, strict: bool) -> Self {
        self.strict_includes = strict;
        self
    }

    /// Replace the reserved include prefixes
    pub fn with_reserved_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the token marker character
    pub fn with_token_marker(mut self, marker: char) -> Self {
        self.token_marker = marker;
        self
    }

    /// Set the default theme
    pub fn with_default_theme(mut self, theme: impl Into<String>) -> Self {
        self.default_theme = theme.into();
        self
    }

    /// Enable strict mode when `STRICT_INCLUDES` is set to a truthy value
    ///
    /// An unset or falsy variable leaves the configured value untouched.
    pub fn with_env_overrides(self) -> Self {
        let strict = std::env::var(STRICT_INCLUDES_ENV)
            .map(|v| is_truthy(&v))
            .unwrap_or(false);
        if strict {
            self.with_strict_includes(true)
        } else {
            self
        }
    }
}

/// `1`, `true`, `yes` or `on`, case-insensitive
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
