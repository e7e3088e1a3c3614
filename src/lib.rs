//! SDUI Resolver - template resolution for server-driven UI documents
//!
//! Turns a JSON node tree containing `$include` directives, state variants and
//! design-token references into a fully materialized document that a
//! rendering client can consume.
//!
//! # Example
//!
//! ```rust,no_run
//! use sdui_resolver::{Renderer, ResolverConfig};
//!
//! let renderer = Renderer::new(ResolverConfig::new().with_root("ui"));
//! let page = renderer.render_page("home", Some("dark")).unwrap();
//! println!("{}", page);
//! ```

pub mod config;
pub mod error;
pub mod include;
pub mod page;
pub mod tokens;
pub mod tree;

pub use config::{ConfigError, ResolverConfig};
pub use error::IncludeError;
pub use include::{missing_component, IncludeResolver, PathSandbox};
pub use page::{not_found_card, PageError, PageStore};
pub use tokens::{apply_tokens, TokenCache, TokenTable};
pub use tree::{
    merge_card_variables, replace_by_id, replace_first_by_type, replace_first_of_any, PatchOp,
};

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during the render pipeline
#[derive(Debug, Error)]
pub enum RenderError {
    /// Include expansion failed in strict mode
    #[error("include error: {0}")]
    Include(#[from] IncludeError),

    /// Page lookup or load failed
    #[error("page error: {0}")]
    Page(#[from] PageError),

    /// Configuration could not be loaded
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Caller-supplied edit stage failed
    #[error("{0}")]
    Handler(String),
}

impl RenderError {
    /// Format the error, with source context where available
    pub fn format(&self) -> String {
        match self {
            RenderError::Include(err) => err.format(),
            other => other.to_string(),
        }
    }
}

/// Resolution pipeline: includes, then caller edits, then tokens
///
/// `Renderer` is `Send + Sync`; share it behind an `Arc` to serve concurrent
/// requests. The token cache is the only state shared between calls.
#[derive(Debug, Clone)]
pub struct Renderer {
    config: ResolverConfig,
    includes: IncludeResolver,
    pages: PageStore,
    tokens: Arc<TokenCache>,
}

impl Renderer {
    /// Create a renderer with its own token cache under `<root>/<tokens_dir>`
    pub fn new(config: ResolverConfig) -> Self {
        let tokens = Arc::new(TokenCache::new(config.root.join(&config.tokens_dir)));
        let includes = IncludeResolver::from_config(&config);
        let pages = PageStore::new(includes.sandbox().clone());
        Self {
            config,
            includes,
            pages,
            tokens,
        }
    }

    /// Share an existing token cache
    pub fn with_token_cache(mut self, tokens: Arc<TokenCache>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn includes(&self) -> &IncludeResolver {
        &self.includes
    }

    pub fn pages(&self) -> &PageStore {
        &self.pages
    }

    pub fn token_cache(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    /// The canonical sandbox root
    pub fn root(&self) -> &Path {
        self.includes.sandbox().root()
    }

    /// Expand every include directive in `node`
    pub fn resolve_includes(&self, node: Value, base_dir: &Path) -> Result<Value, RenderError> {
        Ok(self.includes.resolve(node, base_dir)?)
    }

    /// Substitute tokens for `theme`, or the configured default theme
    pub fn apply_tokens(&self, node: &mut Value, theme: Option<&str>) {
        let theme = theme.unwrap_or(&self.config.default_theme);
        let table = self.tokens.get(theme);
        apply_tokens(node, &table, self.config.token_marker);
    }

    /// Resolve includes, then tokens
    pub fn render_value(
        &self,
        node: Value,
        base_dir: &Path,
        theme: Option<&str>,
    ) -> Result<Value, RenderError> {
        self.render_with(node, base_dir, theme, |_| Ok(()))
    }

    /// Resolve includes, run `edit`, resolve again, then tokens
    ///
    /// `edit` may inject new directives (for example a replacement that is
    /// itself an `$include`); the second pass expands them. Without directives
    /// the second pass is the identity.
    pub fn render_with<F>(
        &self,
        node: Value,
        base_dir: &Path,
        theme: Option<&str>,
        edit: F,
    ) -> Result<Value, RenderError>
    where
        F: FnOnce(&mut Value) -> Result<(), RenderError>,
    {
        let mut resolved = self.resolve_includes(node, base_dir)?;
        edit(&mut resolved)?;
        let mut resolved = self.resolve_includes(resolved, base_dir)?;
        self.apply_tokens(&mut resolved, theme);
        Ok(resolved)
    }

    /// Render a template file that lies inside the root
    ///
    /// A relative `path` is taken relative to the root.
    pub fn render_file(&self, path: &Path, theme: Option<&str>) -> Result<Value, RenderError> {
        let path = self.root().join(path);
        let mut resolved = self.includes.resolve_file(&path)?;
        self.apply_tokens(&mut resolved, theme);
        Ok(resolved)
    }

    /// Render `pages/<name>.json`
    pub fn render_page(&self, name: &str, theme: Option<&str>) -> Result<Value, RenderError> {
        self.render_page_with(name, theme, |_| Ok(()))
    }

    /// Render a page with a caller edit stage, see [`Renderer::render_with`]
    pub fn render_page_with<F>(
        &self,
        name: &str,
        theme: Option<&str>,
        edit: F,
    ) -> Result<Value, RenderError>
    where
        F: FnOnce(&mut Value) -> Result<(), RenderError>,
    {
        let (page, path) = self.pages.load(name)?;
        debug!(page = name, path = %path.display(), "rendering page");
        self.render_loaded_page(page, &path, theme, edit)
    }

    /// Render the first page of `candidates` that exists
    pub fn render_first_page_with<F>(
        &self,
        candidates: &[&str],
        theme: Option<&str>,
        edit: F,
    ) -> Result<Value, RenderError>
    where
        F: FnOnce(&mut Value) -> Result<(), RenderError>,
    {
        let (page, path) = self.pages.load_first(candidates)?;
        debug!(path = %path.display(), "rendering first available page");
        self.render_loaded_page(page, &path, theme, edit)
    }

    fn render_loaded_page<F>(
        &self,
        page: Value,
        path: &Path,
        theme: Option<&str>,
        edit: F,
    ) -> Result<Value, RenderError>
    where
        F: FnOnce(&mut Value) -> Result<(), RenderError>,
    {
        let base_dir = path
            .parent()
            .map_or_else(|| self.root().to_path_buf(), Path::to_path_buf);
        self.render_with(page, &base_dir, theme, edit)
    }

    /// Render a page, or the not-found card when the page does not exist
    ///
    /// Other failures are still returned.
    pub fn render_page_or_not_found(
        &self,
        name: &str,
        theme: Option<&str>,
    ) -> Result<Value, RenderError> {
        match self.render_page(name, theme) {
            Err(RenderError::Page(PageError::NotFound { .. } | PageError::OutsidePages { .. })) => {
                let mut card = not_found_card(name);
                self.apply_tokens(&mut card, theme);
                Ok(card)
            }
            other => other,
        }
    }
}
