//! Design tokens
//!
//! Theme tables map dotted paths to arbitrary JSON values. String leaves that
//! start with the token marker (`"@color.bg"`) are replaced by the value found
//! at that path. Lookup misses leave the string untouched so that tokens meant
//! for the client pass through.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur when loading a token table
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Failed to read token file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse token JSON: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Token table must be a JSON object")]
    NotAnObject,
}

/// A theme's token table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenTable {
    root: Map<String, Value>,
}

impl TokenTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a table from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, TokenError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load a table from a JSON string
    pub fn from_str(content: &str) -> Result<Self, TokenError> {
        let parsed: Value = serde_json::from_str(content)?;
        Self::from_value(parsed)
    }

    /// Wrap an already-parsed JSON object
    pub fn from_value(value: Value) -> Result<Self, TokenError> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            _ => Err(TokenError::NotAnObject),
        }
    }

    /// Look up a dotted path by stepwise key descent
    ///
    /// Every segment must address an object key. A stored `null` counts as
    /// not found.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        (!current.is_null()).then_some(current)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

/// Replace marked string leaves with their token values, in place
///
/// Must run after include, state and patch resolution so that tokens brought
/// in by included components are reached.
pub fn apply_tokens(node: &mut Value, table: &TokenTable, marker: char) {
    match node {
        Value::Object(map) => {
            for child in map.values_mut() {
                apply_tokens(child, table, marker);
            }
        }
        Value::Array(items) => {
            for item in items {
                apply_tokens(item, table, marker);
            }
        }
        Value::String(s) => {
            let resolved = s
                .strip_prefix(marker)
                .and_then(|path| table.lookup(path))
                .cloned();
            if let Some(value) = resolved {
                *node = value;
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Process-wide cache of token tables keyed by theme
///
/// Read-through: the first request for a theme loads
/// `<tokens_dir>/colors.<theme>.json`. A missing or invalid file yields an
/// empty table, which is cached like any other. Entries are never evicted.
#[derive(Debug)]
pub struct TokenCache {
    tokens_dir: PathBuf,
    tables: RwLock<HashMap<String, Arc<TokenTable>>>,
}

impl TokenCache {
    /// Create a cache reading tables from `tokens_dir`
    pub fn new(tokens_dir: impl Into<PathBuf>) -> Self {
        Self {
            tokens_dir: tokens_dir.into(),
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Get the table for `theme`, loading it on first use
    ///
    /// Concurrent first loads of the same theme are harmless: tables are
    /// inserted whole and the first insert wins.
    pub fn get(&self, theme: &str) -> Arc<TokenTable> {
        let key = normalize_theme(theme);

        if let Some(table) = self.read_cached(&key) {
            return table;
        }

        let loaded = Arc::new(self.load(&key));
        match self.tables.write() {
            Ok(mut tables) => Arc::clone(tables.entry(key).or_insert(loaded)),
            Err(poisoned) => Arc::clone(poisoned.into_inner().entry(key).or_insert(loaded)),
        }
    }

    /// Insert a table directly, replacing nothing that is already cached
    pub fn preload(&self, theme: &str, table: TokenTable) -> Arc<TokenTable> {
        let key = normalize_theme(theme);
        let table = Arc::new(table);
        match self.tables.write() {
            Ok(mut tables) => Arc::clone(tables.entry(key).or_insert(table)),
            Err(poisoned) => Arc::clone(poisoned.into_inner().entry(key).or_insert(table)),
        }
    }

    /// Themes currently cached
    pub fn themes(&self) -> Vec<String> {
        let mut themes: Vec<String> = match self.tables.read() {
            Ok(tables) => tables.keys().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
        };
        themes.sort();
        themes
    }

    fn read_cached(&self, key: &str) -> Option<Arc<TokenTable>> {
        match self.tables.read() {
            Ok(tables) => tables.get(key).cloned(),
            Err(poisoned) => poisoned.into_inner().get(key).cloned(),
        }
    }

    fn load(&self, theme: &str) -> TokenTable {
        if !is_safe_theme(theme) {
            warn!(theme, "rejecting theme name outside the tokens directory");
            return TokenTable::new();
        }

        let path = self.tokens_dir.join(format!("colors.{theme}.json"));
        match TokenTable::from_file(&path) {
            Ok(table) => {
                info!(theme, path = %path.display(), "loaded token table");
                table
            }
            Err(TokenError::IoError(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(theme, path = %path.display(), "no token table for theme");
                TokenTable::new()
            }
            Err(err) => {
                warn!(theme, path = %path.display(), error = %err, "failed to load token table");
                TokenTable::new()
            }
        }
    }
}

fn normalize_theme(theme: &str) -> String {
    theme.trim().to_lowercase()
}

/// A theme name must stay a single file-name fragment
fn is_safe_theme(theme: &str) -> bool {
    !theme.is_empty()
        && theme
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}
