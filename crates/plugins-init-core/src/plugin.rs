//! Plugin descriptor, loaded from a plugin's `pluginDefinition.json`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fs_util::{file_exists, read_json};

pub const PLUGIN_DEFINITION_FILE: &str = "pluginDefinition.json";

/// Identity and install location of a plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    pub identifier: String,

    #[serde(default)]
    pub plugin_version: String,

    #[serde(default)]
    pub plugin_location: PathBuf,
}

impl PluginDescriptor {
    pub fn new(
        identifier: impl Into<String>,
        plugin_version: impl Into<String>,
        plugin_location: impl Into<PathBuf>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            plugin_version: plugin_version.into(),
            plugin_location: plugin_location.into(),
        }
    }

    /// Load the descriptor of the plugin installed at `plugin_dir`.
    ///
    /// Returns `Ok(None)` when the directory has no `pluginDefinition.json`.
    pub fn load(plugin_dir: &Path) -> Result<Option<Self>> {
        let path = plugin_dir.join(PLUGIN_DEFINITION_FILE);
        if !file_exists(&path) {
            return Ok(None);
        }

        let mut descriptor: PluginDescriptor = read_json(&path)?;
        descriptor.plugin_location = plugin_dir.to_path_buf();
        Ok(Some(descriptor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PluginInitError;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn load_reads_identity_and_sets_location() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(PLUGIN_DEFINITION_FILE),
            r#"{"identifier":"org.example.editor","pluginVersion":"1.2.0","apiVersion":"2.0.0","webContent":{}}"#,
        )
        .unwrap();

        let descriptor = PluginDescriptor::load(tmp.path()).unwrap().unwrap();
        assert_eq!(descriptor.identifier, "org.example.editor");
        assert_eq!(descriptor.plugin_version, "1.2.0");
        assert_eq!(descriptor.plugin_location, tmp.path());
    }

    #[test]
    fn load_missing_definition() {
        let tmp = TempDir::new().unwrap();
        assert!(PluginDescriptor::load(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn load_malformed_definition() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(PLUGIN_DEFINITION_FILE), "{\"pluginVersion\":").unwrap();

        let err = PluginDescriptor::load(tmp.path()).unwrap_err();
        assert!(matches!(err, PluginInitError::Json { .. }));
    }
}
