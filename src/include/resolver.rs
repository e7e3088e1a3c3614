//! Include resolution - expands `$include` directives into loaded subtrees

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::directive::{Directive, IncludeForm, IncludeKind, IncludeSpec};
use super::sandbox::PathSandbox;
use super::state::{flatten, Flattened};
use crate::config::ResolverConfig;
use crate::error::IncludeError;
use crate::tree::is_variant_component;

/// Per-call state for include resolution
#[derive(Debug, Default)]
pub struct ResolutionContext {
    /// Include files currently being expanded, outermost first
    chain: Vec<PathBuf>,
    /// Parsed files; every expansion gets its own clone
    loaded: HashMap<PathBuf, Value>,
}

impl ResolutionContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a file is currently being expanded (cycle detection)
    pub fn is_resolving(&self, path: &Path) -> bool {
        self.chain.iter().any(|p| p == path)
    }

    /// Mark a file as being expanded
    pub fn start_resolving(&mut self, path: &Path) {
        self.chain.push(path.to_path_buf());
    }

    /// Mark the innermost file as done
    pub fn done_resolving(&mut self, path: &Path) {
        if self.chain.last().is_some_and(|last| last == path) {
            self.chain.pop();
        }
    }

    /// The current include chain, outermost first
    pub fn chain(&self) -> &[PathBuf] {
        &self.chain
    }

    /// Load and parse a file, returning a private deep copy
    pub fn load(&mut self, path: &Path) -> Result<Value, IncludeError> {
        if let Some(cached) = self.loaded.get(path) {
            return Ok(cached.clone());
        }
        let content = std::fs::read_to_string(path).map_err(|e| IncludeError::io(path, &e))?;
        let parsed: Value =
            serde_json::from_str(&content).map_err(|e| IncludeError::parse(path, &e))?;
        self.loaded.insert(path.to_path_buf(), parsed.clone());
        Ok(parsed)
    }

    fn cycle_error(&self, path: &Path) -> IncludeError {
        let start = self.chain.iter().position(|p| p == path).unwrap_or(0);
        let mut cycle = self.chain[start..].to_vec();
        cycle.push(path.to_path_buf());
        IncludeError::cyclic(cycle)
    }
}

/// Expands include directives, honoring the soft/strict failure policy
#[derive(Debug, Clone)]
pub struct IncludeResolver {
    sandbox: PathSandbox,
    strict: bool,
}

impl IncludeResolver {
    /// Create a soft-mode resolver over `sandbox`
    pub fn new(sandbox: PathSandbox) -> Self {
        Self {
            sandbox,
            strict: false,
        }
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new(PathSandbox::from_config(config)).with_strict(config.strict_includes)
    }

    /// Set strict mode for `$include` (never affects `$include_optional`)
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn sandbox(&self) -> &PathSandbox {
        &self.sandbox
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Resolve every directive in `node`; relative paths start at `base_dir`
    pub fn resolve(&self, node: Value, base_dir: &Path) -> Result<Value, IncludeError> {
        let mut ctx = ResolutionContext::new();
        self.resolve_node(node, base_dir, &mut ctx)
    }

    /// Load a template file inside the sandbox and resolve it
    ///
    /// The file itself is part of the include chain, so it cannot include
    /// itself. Errors here are always returned; there is no directive to
    /// replace with a placeholder.
    pub fn resolve_file(&self, path: &Path) -> Result<Value, IncludeError> {
        let path = self.sandbox.check(path)?;
        let mut ctx = ResolutionContext::new();
        let loaded = ctx.load(&path)?;
        let base_dir = self.dir_of(&path);

        ctx.start_resolving(&path);
        let result = self.resolve_node(loaded, &base_dir, &mut ctx);
        ctx.done_resolving(&path);
        result
    }

    /// Resolve `node` within an existing context
    pub fn resolve_node(
        &self,
        node: Value,
        base_dir: &Path,
        ctx: &mut ResolutionContext,
    ) -> Result<Value, IncludeError> {
        match node {
            Value::Object(map) => {
                if let Some(directive) = Directive::find(&map) {
                    return self.expand(directive, base_dir, ctx);
                }
                let mut resolved = Map::new();
                for (key, value) in map {
                    resolved.insert(key, self.resolve_node(value, base_dir, ctx)?);
                }
                Ok(Value::Object(resolved))
            }
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.resolve_node(item, base_dir, ctx))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            scalar @ (Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)) => {
                Ok(scalar)
            }
        }
    }

    fn is_soft(&self, kind: IncludeKind) -> bool {
        kind == IncludeKind::Optional || !self.strict
    }

    /// Expand one directive, applying the failure policy
    fn expand(
        &self,
        directive: Directive<'_>,
        base_dir: &Path,
        ctx: &mut ResolutionContext,
    ) -> Result<Value, IncludeError> {
        match self.expand_directive(directive, base_dir, ctx) {
            Ok(value) => Ok(value),
            Err(err) if self.is_soft(directive.kind) => {
                let attempted = directive.attempted();
                warn!(include = %attempted, error = %err, "include failed, using placeholder");
                Ok(missing_component(&attempted))
            }
            Err(err) => Err(err),
        }
    }

    fn expand_directive(
        &self,
        directive: Directive<'_>,
        base_dir: &Path,
        ctx: &mut ResolutionContext,
    ) -> Result<Value, IncludeError> {
        let spec = IncludeSpec::parse(directive.value)?;
        let path = self.sandbox.resolve(base_dir, &spec.path)?;
        if ctx.is_resolving(&path) {
            return Err(ctx.cycle_error(&path));
        }
        let loaded = ctx.load(&path)?;
        let include_dir = self.dir_of(&path);
        debug!(include = %spec.path, path = %path.display(), "expanding include");

        ctx.start_resolving(&path);
        let result = self.expand_loaded(loaded, &spec, &include_dir, ctx);
        ctx.done_resolving(&path);
        result
    }

    /// Resolve the loaded tree, then apply patches and state selection
    fn expand_loaded(
        &self,
        loaded: Value,
        spec: &IncludeSpec,
        include_dir: &Path,
        ctx: &mut ResolutionContext,
    ) -> Result<Value, IncludeError> {
        let mut resolved = self.resolve_node(loaded, include_dir, ctx)?;
        if spec.form == IncludeForm::Path {
            return Ok(resolved);
        }

        for op in &spec.patches {
            if !op.apply_with_root_fallback(&mut resolved) {
                debug!(include = %spec.path, id = ?op.id, "patch matched no node");
            }
        }
        // Patched-in values may carry directives of their own
        if !spec.patches.is_empty() {
            resolved = self.resolve_node(resolved, include_dir, ctx)?;
        }

        if !is_variant_component(&resolved) {
            return Ok(resolved);
        }
        match flatten(resolved, &spec.state) {
            Flattened::Payload(div) => {
                debug!(include = %spec.path, "flattening selected state");
                self.resolve_node(div, include_dir, ctx)
            }
            Flattened::Wrapper(wrapper) => Ok(wrapper),
        }
    }

    fn dir_of(&self, path: &Path) -> PathBuf {
        path.parent()
            .map_or_else(|| self.sandbox.root().to_path_buf(), Path::to_path_buf)
    }
}

/// Visible stand-in for an include that could not be expanded
pub fn missing_component(attempted: &str) -> Value {
    json!({
        "type": "container",
        "width": {"type": "match_parent"},
        "items": [{
            "type": "text",
            "text": format!("Component not found: {attempted}"),
            "text_alignment_horizontal": "center",
            "paddings": {"top": 8, "bottom": 8}
        }],
        "background": [{"type": "solid", "color": "#FFF0B3"}],
        "border": {"corner_radius": 8},
        "margins": {"top": 4, "bottom": 4}
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    struct Ui {
        _dir: tempfile::TempDir,
        root: PathBuf,
    }

    impl Ui {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().join("ui");
            fs::create_dir_all(root.join("components")).unwrap();
            fs::create_dir_all(root.join("pages")).unwrap();
            let root = root.canonicalize().unwrap();
            Self { _dir: dir, root }
        }

        fn write(&self, rel: &str, value: Value) -> &Self {
            let path = self.root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
            self
        }

        fn resolver(&self) -> IncludeResolver {
            IncludeResolver::new(PathSandbox::new(&self.root))
        }
    }

    fn placeholder_text(node: &Value) -> &str {
        node["items"][0]["text"].as_str().unwrap()
    }

    #[test]
    fn test_string_include() {
        let ui = Ui::new();
        ui.write("components/header.json", json!({"type": "text", "text": "@title"}));

        let tree = json!({"type": "container", "items": [{"$include": "components/header.json"}]});
        let resolved = ui.resolver().resolve(tree, &ui.root).unwrap();
        assert_eq!(
            resolved,
            json!({"type": "container", "items": [{"type": "text", "text": "@title"}]})
        );
    }

    #[test]
    fn test_nested_relative_include_uses_file_dir() {
        let ui = Ui::new();
        ui.write("components/card/card.json", json!({"items": [{"$include": "body.json"}]}))
            .write("components/card/body.json", json!({"type": "text"}));

        let resolved = ui
            .resolver()
            .resolve(json!({"$include": "components/card/card.json"}), &ui.root)
            .unwrap();
        assert_eq!(resolved, json!({"items": [{"type": "text"}]}));
    }

    #[test]
    fn test_directive_siblings_are_discarded() {
        let ui = Ui::new();
        ui.write("components/a.json", json!({"type": "text"}));
        let resolved = ui
            .resolver()
            .resolve(json!({"$include": "components/a.json", "margin": 4}), &ui.root)
            .unwrap();
        assert_eq!(resolved, json!({"type": "text"}));
    }

    #[test]
    fn test_missing_file_soft_placeholder() {
        let ui = Ui::new();
        let resolved = ui
            .resolver()
            .resolve(json!([{"$include": "components/none.json"}]), &ui.root)
            .unwrap();
        assert_eq!(resolved, json!([missing_component("components/none.json")]));
    }

    #[test]
    fn test_missing_file_strict_error() {
        let ui = Ui::new();
        let result = ui
            .resolver()
            .with_strict(true)
            .resolve(json!([{"$include": "components/none.json"}]), &ui.root);
        assert!(matches!(result, Err(IncludeError::LoadFailure { .. })));
    }

    #[test]
    fn test_optional_is_soft_in_strict_mode() {
        let ui = Ui::new();
        let resolved = ui
            .resolver()
            .with_strict(true)
            .resolve(json!({"$include_optional": "components/none.json"}), &ui.root)
            .unwrap();
        assert_eq!(placeholder_text(&resolved), "Component not found: components/none.json");
    }

    #[test]
    fn test_invalid_json_reports_position() {
        let ui = Ui::new();
        fs::write(ui.root.join("components/bad.json"), "{\n  \"type\": \n}").unwrap();
        let result = ui
            .resolver()
            .with_strict(true)
            .resolve(json!({"$include": "components/bad.json"}), &ui.root);
        match result {
            Err(IncludeError::LoadFailure { position, .. }) => assert_eq!(position.map(|p| p.0), Some(3)),
            other => panic!("Expected LoadFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_sandbox_violation_soft_and_strict() {
        let ui = Ui::new();
        let tree = json!({"$include": "../../outside.json"});

        let soft = ui.resolver().resolve(tree.clone(), &ui.root).unwrap();
        assert_eq!(placeholder_text(&soft), "Component not found: ../../outside.json");

        let strict = ui.resolver().with_strict(true).resolve(tree, &ui.root);
        assert!(matches!(strict, Err(IncludeError::SandboxViolation { .. })));
    }

    #[test]
    fn test_malformed_directive_placeholder() {
        let ui = Ui::new();
        let resolved = ui
            .resolver()
            .resolve(json!({"$include": {"state_id": "1"}}), &ui.root)
            .unwrap();
        assert_eq!(placeholder_text(&resolved), r#"Component not found: {"state_id":"1"}"#);
    }

    #[test]
    fn test_self_include_cycle() {
        let ui = Ui::new();
        ui.write("components/loop.json", json!({"items": [{"$include": "loop.json"}]}));

        let soft = ui
            .resolver()
            .resolve(json!({"$include": "components/loop.json"}), &ui.root)
            .unwrap();
        assert_eq!(soft, json!({"items": [missing_component("loop.json")]}));

        let strict = ui
            .resolver()
            .with_strict(true)
            .resolve(json!({"$include": "components/loop.json"}), &ui.root);
        match strict {
            Err(IncludeError::CyclicInclude { chain }) => {
                assert_eq!(chain, vec![ui.root.join("components/loop.json"); 2]);
            }
            other => panic!("Expected CyclicInclude, got {:?}", other),
        }
    }

    #[test]
    fn test_repeated_include_is_not_a_cycle() {
        let ui = Ui::new();
        ui.write("components/chip.json", json!({"type": "text", "id": "chip"}));
        let tree = json!({"items": [
            {"$include": {"path": "components/chip.json", "patch": [{"id": "chip", "set": {"text": "A"}}]}},
            {"$include": {"path": "components/chip.json", "patch": [{"id": "chip", "set": {"text": "B"}}]}}
        ]});

        let resolved = ui.resolver().with_strict(true).resolve(tree, &ui.root).unwrap();
        assert_eq!(
            resolved,
            json!({"items": [
                {"type": "text", "id": "chip", "text": "A"},
                {"type": "text", "id": "chip", "text": "B"}
            ]})
        );
    }

    #[test]
    fn test_patch_reaches_nested_include() {
        let ui = Ui::new();
        ui.write("components/row.json", json!({"items": [{"$include": "label.json"}]}))
            .write("components/label.json", json!({"type": "text", "id": "label"}));

        let tree = json!({"$include": {
            "path": "components/row.json",
            "patch": [{"id": "label", "set": {"text": "Hi"}}]
        }});
        let resolved = ui.resolver().resolve(tree, &ui.root).unwrap();
        assert_eq!(resolved, json!({"items": [{"type": "text", "id": "label", "text": "Hi"}]}));
    }

    #[test]
    fn test_patched_in_include_is_expanded_from_include_dir() {
        let ui = Ui::new();
        ui.write("components/box.json", json!({"type": "container", "id": "box"}))
            .write("components/inner.json", json!({"type": "text", "text": "inner"}));

        let tree = json!({"$include": {
            "path": "components/box.json",
            "patch": [{"id": "box", "set": {"items": [{"$include": "inner.json"}]}}]
        }});
        let resolved = ui.resolver().with_strict(true).resolve(tree, &ui.root).unwrap();
        assert_eq!(
            resolved,
            json!({
                "type": "container",
                "id": "box",
                "items": [{"type": "text", "text": "inner"}]
            })
        );
    }

    #[test]
    fn test_patched_in_self_include_is_a_cycle() {
        let ui = Ui::new();
        ui.write("components/box.json", json!({"type": "container", "id": "box"}));

        let tree = json!({"$include": {
            "path": "components/box.json",
            "patch": [{"id": "box", "set": {"items": [{"$include": "box.json"}]}}]
        }});
        let resolved = ui.resolver().resolve(tree, &ui.root).unwrap();
        assert_eq!(resolved["items"][0], missing_component("box.json"));
    }

    #[test]
    fn test_root_patch_fallback() {
        let ui = Ui::new();
        ui.write("components/box.json", json!({"type": "container", "width": 1}));
        let tree = json!({"$include": {
            "path": "components/box.json",
            "patch": [{"id": "root", "set": {"width": 2}, "unset": ["type"]}]
        }});
        let resolved = ui.resolver().resolve(tree, &ui.root).unwrap();
        assert_eq!(resolved, json!({"width": 2}));
    }

    #[test]
    fn test_state_include_flattens_and_resolves_div() {
        let ui = Ui::new();
        ui.write(
            "components/lesson_card.json",
            json!({
                "type": "state",
                "states": [
                    {"state_id": "0", "div": {"type": "text", "id": "lesson_title"}},
                    {"state_id": "1", "div": {"items": [
                        {"type": "text", "id": "lesson_title_brand"},
                        {"$include": "badge.json"}
                    ]}}
                ]
            }),
        )
        .write("components/badge.json", json!({"type": "image"}));

        let tree = json!({"$include": {
            "path": "/components/lesson_card.json",
            "state_id": "1",
            "patch": [{"id": "lesson_title_brand", "set": {"text": "Verbs"}}],
            "div_set": {"action": {"url": "/view/lesson/1"}}
        }});
        let resolved = ui.resolver().resolve(tree, &ui.root).unwrap();
        assert_eq!(
            resolved,
            json!({
                "items": [
                    {"type": "text", "id": "lesson_title_brand", "text": "Verbs"},
                    {"type": "image"}
                ],
                "action": {"url": "/view/lesson/1"}
            })
        );
    }

    #[test]
    fn test_string_include_keeps_variant_untouched() {
        let ui = Ui::new();
        let variant = json!({
            "type": "state",
            "state_id": "1",
            "states": [{"state_id": "0", "div": {}}, {"state_id": "1", "div": {}}]
        });
        ui.write("components/toggle.json", variant.clone());

        let resolved = ui
            .resolver()
            .resolve(json!({"$include": "components/toggle.json"}), &ui.root)
            .unwrap();
        assert_eq!(resolved, variant);
    }

    #[test]
    fn test_resolve_file_tracks_its_own_path() {
        let ui = Ui::new();
        ui.write("pages/home.json", json!({"items": [{"$include": "home.json"}]}));

        let resolved = ui.resolver().resolve_file(&ui.root.join("pages/home.json")).unwrap();
        assert_eq!(resolved, json!({"items": [missing_component("home.json")]}));
    }

    #[test]
    fn test_resolve_file_outside_root() {
        let ui = Ui::new();
        let result = ui.resolver().resolve_file(&ui.root.join("../secret.json"));
        assert!(matches!(result, Err(IncludeError::SandboxViolation { .. })));
    }

    #[test]
    fn test_context_chain_bookkeeping() {
        let mut ctx = ResolutionContext::new();
        let a = PathBuf::from("/ui/a.json");
        let b = PathBuf::from("/ui/b.json");
        ctx.start_resolving(&a);
        ctx.start_resolving(&b);
        assert!(ctx.is_resolving(&a));
        assert_eq!(ctx.chain(), &[a.clone(), b.clone()]);

        ctx.done_resolving(&b);
        assert!(!ctx.is_resolving(&b));
        assert!(matches!(
            ctx.cycle_error(&a),
            IncludeError::CyclicInclude { chain } if chain == vec![a.clone(), a.clone()]
        ));
    }
}
