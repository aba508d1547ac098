//! Template resolution: manifest lookup, per-file caching, placeholder filling
//!
//! A template is an HTML fragment with `{{ KEY }}` placeholders. Templates are
//! listed in a JSON manifest:
//!
//! ```json
//! { "templates": { "title": { "file": "title.html" } } }
//! ```
//!
//! Files are read on first use and kept for the lifetime of the resolver. The
//! cache is keyed by the resolved file path, so two names pointing at the same
//! file share one string. There is no invalidation; edits to template files
//! are picked up by constructing a new resolver.

use crate::{Error, Result};
use log::debug;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Values substituted into a template, keyed by placeholder name
pub type DataRecord = HashMap<String, Value>;

/// Keys whose array values render as `<li>` items instead of a joined string
pub const DEFAULT_LIST_KEYS: &[&str] = &["POINTS", "ITEMS"];

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\{\{\s*([A-Z0-9_]+)\s*\}\}").expect("placeholder pattern is valid"));

/// A single manifest entry
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TemplateEntry {
    /// Path of the template file, relative to the templates directory
    pub file: String,
}

/// Mapping from template name to file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    pub templates: HashMap<String, TemplateEntry>,
}

impl Manifest {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::ConfigError(format!("Invalid template manifest: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read manifest {}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn get(&self, name: &str) -> Option<&TemplateEntry> {
        self.templates.get(name)
    }
}

/// Either a manifest template name or a literal HTML template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Named(String),
    Literal(String),
}

/// Loads manifest templates and fills them with data records
pub struct TemplateResolver {
    manifest: Manifest,
    templates_dir: PathBuf,
    list_keys: HashSet<String>,
    cache: RwLock<HashMap<PathBuf, Arc<str>>>,
}

impl TemplateResolver {
    /// Create a resolver over an already parsed manifest.
    pub fn new(manifest: Manifest, templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            manifest,
            templates_dir: templates_dir.into(),
            list_keys: DEFAULT_LIST_KEYS.iter().map(|k| k.to_string()).collect(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Open a template root laid out as `root/manifest.json` + `root/templates/`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let manifest = Manifest::load(root.join("manifest.json"))?;
        Ok(Self::new(manifest, root.join("templates")))
    }

    /// Replace the set of keys rendered as list items.
    pub fn with_list_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.list_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn list_keys(&self) -> &HashSet<String> {
        &self.list_keys
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Load a template by manifest name, reading its file at most once.
    pub fn load(&self, name: &str) -> Result<Arc<str>> {
        let entry = self
            .manifest
            .get(name)
            .ok_or_else(|| Error::TemplateNotFound(name.to_string()))?;
        let path = self.templates_dir.join(&entry.file);

        if let Some(tpl) = self.cache.read().unwrap_or_else(|e| e.into_inner()).get(&path) {
            return Ok(tpl.clone());
        }

        debug!("reading template '{}' from {}", name, path.display());
        let text: Arc<str> = std::fs::read_to_string(&path)?.into();

        // Another thread may have filled the slot meanwhile; keep the first copy.
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        Ok(cache.entry(path).or_insert(text).clone())
    }

    /// Resolve a template source against a data record.
    pub fn resolve(&self, source: &TemplateSource, data: &DataRecord) -> Result<String> {
        match source {
            TemplateSource::Named(name) => {
                let tpl = self.load(name)?;
                Ok(fill(&tpl, data, &self.list_keys))
            }
            TemplateSource::Literal(html) => Ok(fill(html, data, &self.list_keys)),
        }
    }

    /// Number of distinct template files currently cached.
    pub fn cached_files(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Substitute every `{{ KEY }}` token in `template`.
///
/// Substituted text is not scanned again, and nothing is HTML-escaped.
pub fn fill(template: &str, data: &DataRecord, list_keys: &HashSet<String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            render_value(key, data.get(key), list_keys)
        })
        .into_owned()
}

fn render_value(key: &str, value: Option<&Value>, list_keys: &HashSet<String>) -> String {
    match value {
        Some(Value::Array(items)) if list_keys.contains(key) => items
            .iter()
            .map(|item| format!("<li>{}</li>", scalar(item)))
            .collect(),
        Some(Value::Array(items)) => items.iter().map(scalar).collect::<Vec<_>>().join(", "),
        Some(other) => scalar(other),
        None => String::new(),
    }
}

// Only null is blank; 0, false and "" keep their literal form.
fn scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
