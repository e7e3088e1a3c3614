//! Page lookup under `<root>/pages`

use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::include::PathSandbox;

const PAGES_DIR: &str = "pages";

/// Errors that can occur when locating or loading a page
#[derive(Debug, Error)]
pub enum PageError {
    /// No page file with this name
    #[error("page not found: {name}")]
    NotFound { name: String },

    /// Page name resolves outside the pages directory
    #[error("page name escapes the pages directory: {name}")]
    OutsidePages { name: String },

    /// Page file exists but cannot be read or parsed
    #[error("failed to load page {}: {message}", path.display())]
    Load { path: PathBuf, message: String },
}

/// Locates page templates by name
#[derive(Debug, Clone)]
pub struct PageStore {
    sandbox: PathSandbox,
    pages_dir: PathBuf,
}

impl PageStore {
    pub fn new(sandbox: PathSandbox) -> Self {
        let pages_dir = sandbox.root().join(PAGES_DIR);
        Self { sandbox, pages_dir }
    }

    /// Path of `pages/<name>.json`; a trailing `.json` on `name` is ignored
    pub fn locate(&self, name: &str) -> Result<PathBuf, PageError> {
        let stem = name.strip_suffix(".json").unwrap_or(name);
        let requested = format!("{PAGES_DIR}/{stem}.json");

        let path = self
            .sandbox
            .resolve(self.sandbox.root(), &requested)
            .map_err(|_| PageError::OutsidePages {
                name: name.to_string(),
            })?;
        if !path.starts_with(&self.pages_dir) {
            return Err(PageError::OutsidePages {
                name: name.to_string(),
            });
        }
        if !path.is_file() {
            return Err(PageError::NotFound {
                name: name.to_string(),
            });
        }
        Ok(path)
    }

    /// Locate the first candidate that exists
    pub fn locate_first(&self, candidates: &[&str]) -> Result<PathBuf, PageError> {
        for name in candidates {
            match self.locate(name) {
                Ok(path) => return Ok(path),
                Err(PageError::NotFound { .. }) => {
                    debug!(page = *name, "page candidate missing");
                }
                Err(err) => return Err(err),
            }
        }
        Err(PageError::NotFound {
            name: candidates.join(", "),
        })
    }

    /// Load and parse a page without resolving its includes
    pub fn load(&self, name: &str) -> Result<(Value, PathBuf), PageError> {
        let path = self.locate(name)?;
        let value = read_json(&path)?;
        Ok((value, path))
    }

    /// Load the first candidate that exists
    pub fn load_first(&self, candidates: &[&str]) -> Result<(Value, PathBuf), PageError> {
        let path = self.locate_first(candidates)?;
        let value = read_json(&path)?;
        Ok((value, path))
    }
}

fn read_json(path: &Path) -> Result<Value, PageError> {
    let load_error = |message: String| PageError::Load {
        path: path.to_path_buf(),
        message,
    };
    let content = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| load_error(e.to_string()))
}

/// Card document shown in place of a missing page
pub fn not_found_card(name: &str) -> Value {
    let log_id = if name.is_empty() { "page" } else { name };
    json!({
        "card": {
            "log_id": log_id,
            "states": [{
                "state_id": 0,
                "div": {
                    "type": "container",
                    "items": [{
                        "type": "text",
                        "text": format!("page '{name}' not found"),
                        "text_alignment_horizontal": "center",
                        "paddings": {"top": 16, "bottom": 16}
                    }]
                }
            }]
        }
    })
}
