//! Composite identity of a recognizer.
//!
//! A recognizer is identified by the plugin that provided it, its key in that
//! plugin's recognizer map, and its own `id`. On disk this is written as
//! `"<pluginIdentifier>:<localKey>:<id>"`, but equality is component-wise so
//! identifiers or keys containing `:` never collide.

use std::fmt;

use serde_json::{Map, Value};

pub const FIELD_KEY: &str = "key";
pub const FIELD_ID: &str = "id";
pub const FIELD_PLUGIN_IDENTIFIER: &str = "pluginIdentifier";
pub const FIELD_PLUGIN_VERSION: &str = "pluginVersion";

const SEPARATOR: char = ':';

/// Rendering of a recognizer without an `id`, kept compatible with files
/// written by earlier releases.
const MISSING_ID: &str = "undefined";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecognizerKey {
    pub plugin_identifier: String,
    pub local_key: String,
    pub id: String,
}

impl RecognizerKey {
    pub fn new(
        plugin_identifier: impl Into<String>,
        local_key: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            plugin_identifier: plugin_identifier.into(),
            local_key: local_key.into(),
            id: id.into(),
        }
    }

    /// Key for a recognizer declared by `plugin_identifier` under `local_key`
    pub fn for_declaration(
        plugin_identifier: &str,
        local_key: &str,
        entry: &Map<String, Value>,
    ) -> Self {
        Self::new(plugin_identifier, local_key, render_id(entry.get(FIELD_ID)))
    }

    /// Recover the key of a stored recognizer from its `key` field.
    ///
    /// The entry's own `pluginIdentifier` and `id` fields disambiguate where
    /// the separators fall. Without them the first and last `:` are used.
    /// Returns `None` when the entry has no key or the key is not composite.
    pub fn from_entry(entry: &Map<String, Value>) -> Option<Self> {
        let raw = entry.get(FIELD_KEY)?.as_str()?;
        if raw.is_empty() {
            return None;
        }

        if let Some(key) = Self::split_with_fields(raw, entry) {
            return Some(key);
        }

        let (plugin, rest) = raw.split_once(SEPARATOR)?;
        let (local, id) = rest.rsplit_once(SEPARATOR)?;
        Some(Self::new(plugin, local, id))
    }

    fn split_with_fields(raw: &str, entry: &Map<String, Value>) -> Option<Self> {
        let plugin = entry.get(FIELD_PLUGIN_IDENTIFIER)?.as_str()?;
        let id = render_id(entry.get(FIELD_ID));

        let rest = raw.strip_prefix(plugin)?.strip_prefix(SEPARATOR)?;
        let local = rest.strip_suffix(id.as_str())?.strip_suffix(SEPARATOR)?;
        Some(Self::new(plugin, local, id))
    }
}

impl fmt::Display for RecognizerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.plugin_identifier,
            self.local_key,
            self.id,
            sep = SEPARATOR
        )
    }
}

fn render_id(id: Option<&Value>) -> String {
    match id {
        None => MISSING_ID.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
