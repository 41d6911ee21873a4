//! Plugin pointer files
//!
//! The runtime finds each plugin through `<pointer_dir>/<identifier>.json`:
//!
//! ```json
//! {
//!   "identifier": "org.example.editor",
//!   "pluginLocation": "components/editor/web",
//!   "relativeTo": "$ZWE_zowe_runtimeDirectory"
//! }
//! ```
//!
//! `relativeTo` names an environment variable the runtime expands; it is
//! omitted for absolute locations.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::app2app::{App2AppPropagator, PropagationReport};
use crate::config::InitConfig;
use crate::error::Result;
use crate::fs_util::{file_exists, read_json, write_json_pretty};
use crate::outcome::Outcome;
use crate::plugin::PluginDescriptor;

/// Root variable recorded for plugins installed under the runtime directory
pub const RUNTIME_ROOT_VARIABLE: &str = "$ZWE_zowe_runtimeDirectory";

const POINTER_EXTENSION: &str = "json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginPointer {
    pub identifier: String,

    pub plugin_location: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_to: Option<String>,
}

impl PluginPointer {
    /// Pointer for a plugin at `plugin_path`.
    ///
    /// Paths inside `runtime_dir` are stored relative to it and tagged with
    /// [`RUNTIME_ROOT_VARIABLE`]; anything else is stored as given.
    pub fn for_path(identifier: &str, plugin_path: &Path, runtime_dir: Option<&Path>) -> Self {
        let relative = runtime_dir.and_then(|root| plugin_path.strip_prefix(root).ok());

        match relative {
            Some(rel) => Self {
                identifier: identifier.to_string(),
                plugin_location: rel.to_string_lossy().into_owned(),
                relative_to: Some(RUNTIME_ROOT_VARIABLE.to_string()),
            },
            None => Self {
                identifier: identifier.to_string(),
                plugin_location: plugin_path.to_string_lossy().into_owned(),
                relative_to: None,
            },
        }
    }

    /// Pointer file name for `identifier`
    pub fn file_name(identifier: &str) -> String {
        format!("{}.{}", identifier, POINTER_EXTENSION)
    }

    /// True when both pointers resolve to the same place
    pub fn same_location(&self, other: &PluginPointer) -> bool {
        self.relative_to == other.relative_to && self.plugin_location == other.plugin_location
    }
}

/// What `PointerRegistry::register` did
#[derive(Debug)]
pub struct RegistrationReport {
    pub pointer: Outcome,
    pub app2app: PropagationReport,
}

impl RegistrationReport {
    pub fn has_failures(&self) -> bool {
        self.pointer.is_failed() || self.app2app.counts().has_failures()
    }
}

/// Writes and removes pointer files, then propagates app-to-app config
#[derive(Debug, Clone)]
pub struct PointerRegistry {
    pointer_dir: PathBuf,
    runtime_dir: Option<PathBuf>,
    file_mode: u32,
    app2app: App2AppPropagator,
}

impl PointerRegistry {
    pub fn new(
        pointer_dir: PathBuf,
        runtime_dir: Option<PathBuf>,
        file_mode: u32,
        app2app: App2AppPropagator,
    ) -> Self {
        Self {
            pointer_dir,
            runtime_dir,
            file_mode,
            app2app,
        }
    }

    pub fn from_config(config: &InitConfig) -> Result<Self> {
        Ok(Self::new(
            config.pointer_dir()?,
            config.runtime_dir.clone(),
            config.file_mode,
            App2AppPropagator::from_config(config)?,
        ))
    }

    pub fn pointer_dir(&self) -> &Path {
        &self.pointer_dir
    }

    pub fn pointer_path(&self, identifier: &str) -> PathBuf {
        self.pointer_dir.join(PluginPointer::file_name(identifier))
    }

    /// Write the pointer for the plugin at `plugin_path`, then propagate its
    /// recognizers and actions. Propagation runs even if the pointer write
    /// failed.
    pub fn register(&self, plugin_path: &Path, plugin: &PluginDescriptor) -> RegistrationReport {
        let pointer =
            PluginPointer::for_path(&plugin.identifier, plugin_path, self.runtime_dir.as_deref());
        let path = self.pointer_path(&plugin.identifier);

        let outcome = match write_json_pretty(&path, &pointer, self.file_mode) {
            Ok(()) => {
                info!(
                    plugin = %plugin.identifier,
                    location = %pointer.plugin_location,
                    "ZWED5014I Registered plugin at {}",
                    path.display()
                );
                Outcome::Success
            }
            Err(e) => {
                error!(
                    "ZWED5014E Could not register plugin {}, write {} failed: {}",
                    plugin.identifier,
                    path.display(),
                    e
                );
                Outcome::Failed(e.to_string())
            }
        };

        RegistrationReport {
            pointer: outcome,
            app2app: self.app2app.register(plugin_path, plugin),
        }
    }

    /// Remove the plugin's pointer file, or failing that its action file.
    ///
    /// `NotFound` when neither exists.
    pub fn deregister(&self, plugin: &PluginDescriptor) -> Outcome {
        let path = self.pointer_path(&plugin.identifier);
        if !file_exists(&path) {
            debug!(plugin = %plugin.identifier, "No pointer file, trying action file");
            return self.app2app.deregister(&plugin.identifier);
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                info!(plugin = %plugin.identifier, "Deregistered plugin");
                Outcome::Success
            }
            Err(e) => {
                error!(
                    "ZWED5015E Could not deregister plugin {}, delete {} failed: {}",
                    plugin.identifier,
                    path.display(),
                    e
                );
                Outcome::Failed(e.to_string())
            }
        }
    }

    /// Read back a registered pointer
    pub fn load(&self, identifier: &str) -> Option<PluginPointer> {
        let path = self.pointer_path(identifier);
        if !file_exists(&path) {
            return None;
        }
        match read_json(&path) {
            Ok(pointer) => Some(pointer),
            Err(e) => {
                warn!("ZWED5012W Unreadable plugin reference {}: {}", path.display(), e);
                None
            }
        }
    }

    /// All readable pointers, sorted by file name
    pub fn list(&self) -> Vec<PluginPointer> {
        WalkDir::new(&self.pointer_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let path = e.into_path();
                if path.extension().and_then(|x| x.to_str()) != Some(POINTER_EXTENSION) {
                    return None;
                }
                match read_json::<PluginPointer>(&path) {
                    Ok(pointer) => Some(pointer),
                    Err(err) => {
                        warn!("ZWED5012W Unreadable plugin reference {}: {}", path.display(), err);
                        None
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        tmp: TempDir,
        registry: PointerRegistry,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let pointers = tmp.path().join("plugins");
        let actions = tmp.path().join("actions");
        let recognizers = tmp.path().join("recognizers");
        for dir in [&pointers, &actions, &recognizers] {
            fs::create_dir_all(dir).unwrap();
        }

        let registry = PointerRegistry::new(
            pointers,
            Some(tmp.path().join("runtime")),
            0o770,
            App2AppPropagator::new(actions, recognizers, 0o770),
        );
        Fixture { tmp, registry }
    }

    #[test]
    fn pointer_inside_runtime_is_relative() {
        let pointer = PluginPointer::for_path(
            "org.example.editor",
            Path::new("/opt/zowe/components/editor/web"),
            Some(Path::new("/opt/zowe")),
        );

        assert_eq!(pointer.plugin_location, "components/editor/web");
        assert_eq!(pointer.relative_to.as_deref(), Some(RUNTIME_ROOT_VARIABLE));
    }

    #[test]
    fn pointer_trailing_slash_on_root() {
        let pointer = PluginPointer::for_path(
            "p",
            Path::new("/opt/zowe/components/p"),
            Some(Path::new("/opt/zowe/")),
        );
        assert_eq!(pointer.plugin_location, "components/p");
    }

    #[test]
    fn pointer_outside_runtime_is_absolute() {
        let pointer = PluginPointer::for_path(
            "org.example.editor",
            Path::new("/opt/zowe2/editor"),
            Some(Path::new("/opt/zowe")),
        );

        assert_eq!(pointer.plugin_location, "/opt/zowe2/editor");
        assert!(pointer.relative_to.is_none());

        let json = serde_json::to_string(&pointer).unwrap();
        assert!(!json.contains("relativeTo"));
    }

    #[test]
    fn register_writes_pointer_and_actions() {
        let fx = fixture();
        let plugin_dir = fx.tmp.path().join("runtime").join("components").join("editor");
        let actions = plugin_dir.join("config").join("actions");
        fs::create_dir_all(&actions).unwrap();
        fs::write(actions.join("org.example.editor"), r#"{"actions":{}}"#).unwrap();

        let plugin = PluginDescriptor::new("org.example.editor", "1.0.0", &plugin_dir);
        let report = fx.registry.register(&plugin_dir, &plugin);

        assert_eq!(report.pointer, Outcome::Success);
        assert_eq!(report.app2app.actions, Some(Outcome::Success));
        assert!(!report.has_failures());

        let pointer = fx.registry.load("org.example.editor").unwrap();
        assert_eq!(pointer.identifier, "org.example.editor");
        assert_eq!(
            Path::new(&pointer.plugin_location),
            Path::new("components").join("editor")
        );
    }

    #[test]
    fn register_write_failure_still_propagates() {
        let fx = fixture();
        fs::remove_dir_all(fx.registry.pointer_dir()).unwrap();
        let plugin_dir = fx.tmp.path().join("elsewhere");
        let actions = plugin_dir.join("config").join("actions");
        fs::create_dir_all(&actions).unwrap();
        fs::write(actions.join("p"), r#"{"actions":{"a":{}}}"#).unwrap();

        let report = fx
            .registry
            .register(&plugin_dir, &PluginDescriptor::new("p", "1", &plugin_dir));

        assert!(report.pointer.is_failed());
        assert_eq!(report.app2app.actions, Some(Outcome::Success));
    }

    #[test]
    fn deregister_pointer() {
        let fx = fixture();
        let plugin = PluginDescriptor::new("p", "1", "/elsewhere/p");
        fs::write(fx.registry.pointer_path("p"), "{}").unwrap();

        assert_eq!(fx.registry.deregister(&plugin), Outcome::Success);
        assert!(!fx.registry.pointer_path("p").exists());
    }

    #[test]
    fn deregister_falls_back_to_action_file() {
        let fx = fixture();
        let plugin = PluginDescriptor::new("p", "1", "/elsewhere/p");
        let action = fx.tmp.path().join("actions").join("p");
        fs::write(&action, r#"{"actions":{}}"#).unwrap();

        assert_eq!(fx.registry.deregister(&plugin), Outcome::Success);
        assert!(!action.exists());
    }

    #[test]
    fn deregister_nothing_registered() {
        let fx = fixture();
        let plugin = PluginDescriptor::new("p", "1", "/elsewhere/p");
        assert_eq!(fx.registry.deregister(&plugin), Outcome::NotFound);
    }

    #[test]
    fn list_skips_unreadable_pointers() {
        let fx = fixture();
        let dir = fx.registry.pointer_dir();
        fs::write(
            dir.join("b.json"),
            r#"{"identifier":"b","pluginLocation":"/b"}"#,
        )
        .unwrap();
        fs::write(
            dir.join("a.json"),
            r#"{"identifier":"a","pluginLocation":"a","relativeTo":"$ROOT"}"#,
        )
        .unwrap();
        fs::write(dir.join("broken.json"), "{").unwrap();
        fs::write(dir.join("notes.txt"), "hello").unwrap();

        let ids: Vec<_> = fx
            .registry
            .list()
            .into_iter()
            .map(|p| p.identifier)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
