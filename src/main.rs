//! SDUI render CLI
//!
//! Usage:
//!   sdui-render [OPTIONS] [PAGE]
//!
//! Options:
//!   -f, --file <FILE>        Render a template file inside the UI root
//!   -r, --root <DIR>         UI root directory
//!   -c, --config <FILE>      Resolver configuration (TOML format)
//!   -t, --theme <THEME>      Token theme
//!       --strict             Fail on the first include error
//!       --replace <ID=FILE>  Replace the node with ID (or the first tabs node) by an include of FILE
//!       --var <NAME=VALUE>   Set a card variable
//!       --compact            Compact JSON output
//!       --fallback           Print the not-found card for missing pages
//!   -h, --help               Print help

use std::path::PathBuf;

use clap::Parser;
use serde_json::{json, Map, Value};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sdui_resolver::{
    merge_card_variables, not_found_card, replace_by_id, replace_first_by_type, PageError,
    RenderError, Renderer, ResolverConfig,
};

/// Pages tried in order when no page name is given
const HOME_PAGES: [&str; 2] = ["home", "home_lessons"];

/// Node type replaced when a `--replace` id matches nothing
const FALLBACK_SLOT_TYPE: &str = "tabs";

#[derive(Parser)]
#[command(name = "sdui-render")]
#[command(about = "Resolve server-driven UI templates into client-ready JSON")]
struct Cli {
    /// Page name under pages/ (defaults to the home page)
    page: Option<String>,

    /// Template file to render instead of a page
    #[arg(short, long, conflicts_with = "page")]
    file: Option<PathBuf>,

    /// UI root directory (overrides the config file)
    #[arg(short, long, env = "SDUI_ROOT")]
    root: Option<PathBuf>,

    /// Resolver configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Token theme (defaults to the configured theme)
    #[arg(short, long, env = "SDUI_THEME")]
    theme: Option<String>,

    /// Strict include mode; STRICT_INCLUDES=1 has the same effect
    #[arg(long)]
    strict: bool,

    /// Replace the node with ID by an include of FILE; falls back to the first
    /// `tabs` node (repeatable)
    #[arg(long = "replace", value_name = "ID=FILE", value_parser = parse_key_val)]
    replacements: Vec<(String, String)>,

    /// Card variable in name=value format, value parsed as JSON when possible (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_key_val)]
    variables: Vec<(String, String)>,

    /// Compact JSON output
    #[arg(long)]
    compact: bool,

    /// Print the not-found card instead of failing on a missing page
    #[arg(long)]
    fallback: bool,
}

/// Parse a key=value argument
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid argument '{}': expected key=value", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sdui_resolver=info,sdui_render=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e.format());
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<String, RenderError> {
    let renderer = Renderer::new(load_config(cli)?);
    let theme = cli.theme.as_deref();
    info!(
        root = %renderer.root().display(),
        strict = renderer.includes().is_strict(),
        "resolver ready"
    );

    let rendered = match &cli.file {
        Some(file) => renderer.render_file(file, theme)?,
        None => {
            let edit = |node: &mut Value| apply_edits(cli, node);
            let result = match &cli.page {
                Some(page) => renderer.render_page_with(page, theme, edit),
                None => renderer.render_first_page_with(&HOME_PAGES, theme, edit),
            };
            match result {
                Err(RenderError::Page(PageError::NotFound { .. })) if cli.fallback => {
                    not_found_card(cli.page.as_deref().unwrap_or(HOME_PAGES[0]))
                }
                other => other?,
            }
        }
    };

    let output = if cli.compact {
        serde_json::to_string(&rendered)
    } else {
        serde_json::to_string_pretty(&rendered)
    };
    output.map_err(|e| RenderError::Handler(format!("failed to serialize output: {}", e)))
}

fn load_config(cli: &Cli) -> Result<ResolverConfig, RenderError> {
    let mut config = match &cli.config {
        Some(path) => ResolverConfig::from_file(path)?,
        None => ResolverConfig::default(),
    }
    .with_env_overrides();

    if let Some(root) = &cli.root {
        config = config.with_root(root);
    }
    if cli.strict {
        config = config.with_strict_includes(true);
    }
    Ok(config)
}

/// Edit stage between include passes: replacements, then card variables
fn apply_edits(cli: &Cli, node: &mut Value) -> Result<(), RenderError> {
    for (id, file) in &cli.replacements {
        let replacement = json!({ "$include": file });
        if !replace_by_id(node, id, &replacement)
            && !replace_first_by_type(node, FALLBACK_SLOT_TYPE, &replacement)
        {
            return Err(RenderError::Handler(format!(
                "no node with id '{}' and no '{}' node",
                id, FALLBACK_SLOT_TYPE
            )));
        }
    }

    if !cli.variables.is_empty() {
        let values: Map<String, Value> = cli
            .variables
            .iter()
            .map(|(name, raw)| {
                let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::from(raw.as_str()));
                (name.clone(), value)
            })
            .collect();
        if !merge_card_variables(node, &values) {
            return Err(RenderError::Handler(
                "document has no variables list to update".to_string(),
            ));
        }
    }
    Ok(())
}
