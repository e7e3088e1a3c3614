//! Path sandbox for include resolution
//!
//! Every path an include directive names is resolved here and must end up
//! inside the sandbox root.

use std::path::{Component, Path, PathBuf};

use crate::config::ResolverConfig;
use crate::error::IncludeError;

/// Requests with this prefix get the legacy-layout retry
const COMPONENTS_PREFIX: &str = "components/";

/// Resolves include paths and confines them to a root directory
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
    reserved_prefixes: Vec<String>,
    legacy_component_dir: PathBuf,
}

impl PathSandbox {
    /// Create a sandbox rooted at `root` with the default prefixes
    pub fn new(root: impl AsRef<Path>) -> Self {
        let defaults = ResolverConfig::default();
        Self {
            root: canonical(root.as_ref()),
            reserved_prefixes: defaults.reserved_prefixes,
            legacy_component_dir: defaults.legacy_component_dir,
        }
    }

    /// Create a sandbox from the resolver configuration
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self {
            root: canonical(&config.root),
            reserved_prefixes: config.reserved_prefixes.clone(),
            legacy_component_dir: config.legacy_component_dir.clone(),
        }
    }

    /// Replace the prefixes resolved against the root
    pub fn with_reserved_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the directory retried for missing `components/` paths
    pub fn with_legacy_component_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.legacy_component_dir = dir.into();
        self
    }

    /// The canonical sandbox root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `requested` as written in a file located in `base_dir`
    ///
    /// Reserved prefixes resolve against the root, anything else against
    /// `base_dir`. Leading separators are stripped first, so absolute paths
    /// cannot be injected.
    pub fn resolve(&self, base_dir: &Path, requested: &str) -> Result<PathBuf, IncludeError> {
        let trimmed = requested.trim_start_matches(['/', '\\']);
        let from_root = self
            .reserved_prefixes
            .iter()
            .any(|prefix| trimmed.starts_with(prefix.as_str()));
        let anchor = if from_root {
            self.root.clone()
        } else {
            canonical(base_dir)
        };

        let resolved = self.confine(requested, &anchor.join(trimmed))?;
        if resolved.exists() || !trimmed.starts_with(COMPONENTS_PREFIX) {
            return Ok(resolved);
        }

        // One retry for components that moved during the header layout migration
        if let Some(file_name) = Path::new(trimmed).file_name() {
            let legacy = self.root.join(&self.legacy_component_dir).join(file_name);
            if legacy.is_file() {
                if let Ok(legacy) = self.confine(requested, &legacy) {
                    return Ok(legacy);
                }
            }
        }
        Ok(resolved)
    }

    /// Check that an already-joined path lies inside the root
    pub fn check(&self, path: &Path) -> Result<PathBuf, IncludeError> {
        self.confine(&path.display().to_string(), path)
    }

    /// Whether `path` lies inside the root
    pub fn contains(&self, path: &Path) -> bool {
        self.check(path).is_ok()
    }

    fn confine(&self, requested: &str, joined: &Path) -> Result<PathBuf, IncludeError> {
        let resolved = canonical(joined);
        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(IncludeError::sandbox(requested, resolved))
        }
    }
}

/// Absolute, lexically normalised path; symlinks resolved when it exists
fn canonical(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let normalized = normalize_lexically(&absolute);
    normalized.canonicalize().unwrap_or(normalized)
}

/// Drop `.` and fold `..` without touching the filesystem
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                out.push(component.as_os_str());
            }
        }
    }
    out
}
