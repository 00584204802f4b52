// src/commands/theme.rs

//! `hs cms theme generate-selectors`: find which CSS rules read which theme fields.

use anyhow::{bail, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::util::{list_files, read_to_string, write_json};

pub const SELECTORS_FILE_NAME: &str = "selectors.json";

/// Field path -> selectors of the rules that reference it.
pub type SelectorMap = BTreeMap<String, BTreeSet<String>>;

struct Patterns {
    expression: Regex,
    statement: Regex,
    comment: Regex,
    rule: Regex,
    placeholder: Regex,
    field: Regex,
}

impl Patterns {
    fn new() -> Result<Self> {
        Ok(Self {
            expression: Regex::new(r"(?s)\{\{(.*?)\}\}")?,
            statement: Regex::new(r"(?s)\{%.*?%\}")?,
            comment: Regex::new(r"(?s)/\*.*?\*/|\{#.*?#\}")?,
            rule: Regex::new(r"([^{}]+)\{([^{}]*)\}")?,
            placeholder: Regex::new(r"__HUBL_(\d+)__")?,
            field: Regex::new(r"\btheme\.([A-Za-z0-9_]+(?:\.[A-Za-z0-9_]+)*)")?,
        })
    }
}

/// Collect field references from one stylesheet into `out`.
fn scan_css(patterns: &Patterns, css: &str, out: &mut SelectorMap) {
    let css = patterns.comment.replace_all(css, "");

    // HubL braces would confuse the CSS rule matcher: park expressions in placeholders
    let mut expressions: Vec<String> = Vec::new();
    let css = patterns.expression.replace_all(&css, |caps: &regex::Captures| {
        expressions.push(caps[1].to_string());
        format!("__HUBL_{}__", expressions.len() - 1)
    });
    let css = patterns.statement.replace_all(&css, "");

    for rule in patterns.rule.captures_iter(&css) {
        let selector = rule[1].split_whitespace().collect::<Vec<_>>().join(" ");
        if selector.is_empty() || selector.starts_with('@') {
            continue;
        }

        for ph in patterns.placeholder.captures_iter(&rule[2]) {
            let Some(expr) = ph[1].parse::<usize>().ok().and_then(|i| expressions.get(i)) else {
                continue;
            };
            for field in patterns.field.captures_iter(expr) {
                out.entry(format!("theme.{}", &field[1]))
                    .or_default()
                    .insert(selector.clone());
            }
        }
    }
}

/// Scan every `.css` file below `theme_path`.
pub fn collect_selectors(theme_path: &Path) -> Result<SelectorMap> {
    let patterns = Patterns::new()?;
    let mut map = SelectorMap::new();

    for rel in list_files(theme_path)? {
        if rel.extension().and_then(|e| e.to_str()) != Some("css") {
            continue;
        }
        let css = read_to_string(&theme_path.join(&rel))?;
        scan_css(&patterns, &css, &mut map);
    }

    Ok(map)
}

pub fn generate_selectors(theme_path: &Path) -> Result<()> {
    if !theme_path.is_dir() {
        bail!("{} is not a theme directory", theme_path.display());
    }
    if !theme_path.join("fields.json").is_file() {
        tracing::warn!("{} has no fields.json", theme_path.display());
    }

    let map = collect_selectors(theme_path)?;
    if map.is_empty() {
        bail!("No theme field references found in CSS under {}", theme_path.display());
    }

    let out = theme_path.join(SELECTORS_FILE_NAME);
    write_json(&out, &serde_json::to_value(&map)?)?;
    tracing::info!("Wrote {} field mappings to {}", map.len(), out.display());

    if let Some(unused) = unused_fields(theme_path, &map)? {
        for field in unused {
            tracing::debug!(field = %field, "theme field not referenced in CSS");
        }
    }
    Ok(())
}

/// Leaf field paths declared in `fields.json` but never referenced.
fn unused_fields(theme_path: &Path, map: &SelectorMap) -> Result<Option<Vec<String>>> {
    let path = theme_path.join("fields.json");
    if !path.is_file() {
        return Ok(None);
    }
    let fields = crate::util::read_json(&path)?;

    fn walk(prefix: &str, fields: &Value, out: &mut Vec<String>) {
        let Some(list) = fields.as_array() else { return };
        for field in list {
            let Some(name) = field.get("name").and_then(Value::as_str) else {
                continue;
            };
            let full = format!("{}.{}", prefix, name);
            match field.get("children") {
                Some(children) => walk(&full, children, out),
                None => out.push(full),
            }
        }
    }

    let mut declared = Vec::new();
    walk("theme", &fields, &mut declared);
    Ok(Some(
        declared
            .into_iter()
            .filter(|f| !map.keys().any(|k| k == f || k.starts_with(&format!("{}.", f))))
            .collect(),
    ))
}
