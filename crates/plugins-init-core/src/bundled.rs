//! Bundled plugin reconciliation
//!
//! Every install ships descriptors for its built-in plugins in
//! `<server_root>/defaults/plugins`. Each one becomes a pointer file in the
//! workspace. A pointer that already points to the same place is left
//! alone, so repeated runs do not touch the workspace.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::InitConfig;
use crate::error::Result;
use crate::fs_util::{read_json, write_json_pretty};
use crate::outcome::{Outcome, OutcomeCounts};
use crate::pointer::PluginPointer;

const DESCRIPTOR_SUFFIX: &str = ".json";

/// Length of the install-relative prefix carried by legacy descriptors
const LEGACY_PREFIX_LEN: usize = 6;

/// A descriptor shipped in the bundled plugins directory
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundledDescriptor {
    pub plugin_location: String,

    #[serde(default)]
    pub relative_to: Option<String>,
}

/// Location fields of an existing pointer; everything else is ignored
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredLocation {
    #[serde(default)]
    plugin_location: Option<String>,

    #[serde(default)]
    relative_to: Option<String>,
}

#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Bundled file name and what happened to it
    pub results: Vec<(String, Outcome)>,
}

impl ReconcileReport {
    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for (_, outcome) in &self.results {
            counts.record(outcome);
        }
        counts
    }
}

/// Writes pointer files for the plugins shipped with the install
#[derive(Debug, Clone)]
pub struct BundledPluginReconciler {
    bundled_dir: PathBuf,
    install_root: PathBuf,
}

impl BundledPluginReconciler {
    pub fn new(bundled_dir: PathBuf, install_root: PathBuf) -> Self {
        Self {
            bundled_dir,
            install_root,
        }
    }

    pub fn from_config(config: &InitConfig) -> Result<Self> {
        Ok(Self::new(
            config.bundled_plugins_dir()?,
            config.install_root()?,
        ))
    }

    pub fn bundled_dir(&self) -> &Path {
        &self.bundled_dir
    }

    /// Resolve where a bundled descriptor points.
    ///
    /// Absolute locations are kept as-is, locations with a `relativeTo` root
    /// keep both fields, and anything else is a legacy path resolved against
    /// the install root.
    pub fn resolve(&self, identifier: &str, descriptor: &BundledDescriptor) -> PluginPointer {
        let location = &descriptor.plugin_location;

        let (plugin_location, relative_to) = if Path::new(location).is_absolute() {
            (location.clone(), None)
        } else if let Some(root) = &descriptor.relative_to {
            (location.clone(), Some(root.clone()))
        } else {
            let legacy: String = location.chars().skip(LEGACY_PREFIX_LEN).collect();
            let resolved = self.install_root.join(legacy);
            (resolved.to_string_lossy().into_owned(), None)
        };

        PluginPointer {
            identifier: identifier.to_string(),
            plugin_location,
            relative_to,
        }
    }

    /// Write the pointer for one bundled plugin into `destination` unless an
    /// identical one was already there.
    pub fn reconcile(
        &self,
        plugin_id: &str,
        destination: &Path,
        previously_seen: &BTreeSet<String>,
        file_mode: u32,
    ) -> Outcome {
        let file_name = if plugin_id.ends_with(DESCRIPTOR_SUFFIX) {
            plugin_id.to_string()
        } else {
            format!("{}{}", plugin_id, DESCRIPTOR_SUFFIX)
        };
        let identifier = &file_name[..file_name.len() - DESCRIPTOR_SUFFIX.len()];
        let descriptor_path = self.bundled_dir.join(&file_name);

        match fs::symlink_metadata(&descriptor_path) {
            Ok(meta) if meta.is_dir() => {
                debug!(entry = %file_name, "Skipping directory in bundled plugins");
                return Outcome::Skipped;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    "ZWED5013W Bundled plugin {} not found at {}: {}",
                    identifier,
                    descriptor_path.display(),
                    e
                );
                return Outcome::NotFound;
            }
        }

        let descriptor: BundledDescriptor = match read_json(&descriptor_path) {
            Ok(d) => d,
            Err(e) => {
                error!(
                    "ZWED5013E Could not read bundled plugin {}: {}",
                    descriptor_path.display(),
                    e
                );
                return Outcome::Failed(e.to_string());
            }
        };

        let pointer = self.resolve(identifier, &descriptor);
        let target = destination.join(&file_name);

        if previously_seen.contains(&file_name) && unchanged(&target, &pointer) {
            debug!(plugin = %identifier, "Plugin reference unchanged");
            return Outcome::Skipped;
        }

        match write_json_pretty(&target, &pointer, file_mode) {
            Ok(()) => {
                debug!(plugin = %identifier, target = %target.display(), "Wrote plugin reference");
                Outcome::Success
            }
            Err(e) => {
                error!(
                    "ZWED5014E Could not write plugin reference {}: {}",
                    target.display(),
                    e
                );
                Outcome::Failed(e.to_string())
            }
        }
    }

    /// Reconcile every entry of the bundled plugins directory
    pub fn reconcile_all(
        &self,
        destination: &Path,
        previously_seen: &BTreeSet<String>,
        file_mode: u32,
    ) -> ReconcileReport {
        info!("ZWED5011I - Generating default plugin references");
        let mut report = ReconcileReport::default();

        for entry in WalkDir::new(&self.bundled_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            match entry {
                Ok(entry) => {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    let outcome = self.reconcile(&name, destination, previously_seen, file_mode);
                    report.results.push((name, outcome));
                }
                Err(e) => {
                    error!(
                        "ZWED5013E Could not list bundled plugins in {}: {}",
                        self.bundled_dir.display(),
                        e
                    );
                    report.results.push((
                        self.bundled_dir.display().to_string(),
                        Outcome::Failed(e.to_string()),
                    ));
                }
            }
        }

        report
    }
}

/// File names present in `destination` before reconciliation; empty when
/// the directory does not exist yet
pub fn previously_seen(destination: &Path) -> BTreeSet<String> {
    fs::read_dir(destination)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

/// True when the pointer at `target` already holds the same location.
/// Read errors count as a change.
fn unchanged(target: &Path, pointer: &PluginPointer) -> bool {
    match read_json::<StoredLocation>(target) {
        Ok(stored) => {
            stored.relative_to == pointer.relative_to
                && stored.plugin_location.as_deref() == Some(pointer.plugin_location.as_str())
        }
        Err(e) => {
            warn!(
                "ZWED5012W Error reading old plugin reference {}, rewriting: {}",
                target.display(),
                e
            );
            false
        }
    }
}
