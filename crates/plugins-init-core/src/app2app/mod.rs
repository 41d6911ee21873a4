//! App-to-App Module
//!
//! Propagates a plugin's recognizers and actions into the shared config
//! area read by the desktop.
//!
//! - `key`: composite recognizer identity
//! - `merge`: recognizer merge and action copy

pub mod key;
pub mod merge;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error};
use walkdir::WalkDir;

use crate::config::InitConfig;
use crate::error::Result;
use crate::fs_util::{directory_exists, file_exists};
use crate::outcome::{Outcome, OutcomeCounts};
use crate::plugin::PluginDescriptor;

// Re-exports
pub use key::RecognizerKey;
pub use merge::{
    copy_actions, load_existing_recognizers, merge_recognizer_file, merge_recognizers,
    stamp_actions, stamp_recognizers, ActionFile, EntryMap, RecognizerFile,
};

const PLUGIN_CONFIG_DIR: &str = "config";
const PLUGIN_RECOGNIZERS_DIR: &str = "recognizers";
const PLUGIN_ACTIONS_DIR: &str = "actions";

/// What happened to each file during propagation
#[derive(Debug, Default)]
pub struct PropagationReport {
    /// One entry per recognizer file found in the plugin
    pub recognizers: Vec<(PathBuf, Outcome)>,
    /// Outcome of the action copy
    pub actions: Option<Outcome>,
}

impl PropagationReport {
    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for (_, outcome) in &self.recognizers {
            counts.record(outcome);
        }
        if let Some(outcome) = &self.actions {
            counts.record(outcome);
        }
        counts
    }
}

/// Copies plugin recognizers and actions into the shared directories
#[derive(Debug, Clone)]
pub struct App2AppPropagator {
    actions_dir: PathBuf,
    recognizers_dir: PathBuf,
    file_mode: u32,
}

impl App2AppPropagator {
    pub fn new(actions_dir: PathBuf, recognizers_dir: PathBuf, file_mode: u32) -> Self {
        Self {
            actions_dir,
            recognizers_dir,
            file_mode,
        }
    }

    pub fn from_config(config: &InitConfig) -> Result<Self> {
        Ok(Self::new(
            config.actions_dir()?,
            config.recognizers_dir()?,
            config.file_mode,
        ))
    }

    pub fn actions_dir(&self) -> &Path {
        &self.actions_dir
    }

    pub fn recognizers_dir(&self) -> &Path {
        &self.recognizers_dir
    }

    /// Shared action file of a plugin
    pub fn action_path(&self, plugin_id: &str) -> PathBuf {
        self.actions_dir.join(plugin_id)
    }

    /// Merge the plugin's `config/recognizers/*` and copy its
    /// `config/actions/<id>` into the shared directories
    pub fn register(&self, plugin_dir: &Path, plugin: &PluginDescriptor) -> PropagationReport {
        debug!("app2app for {}", plugin.identifier);
        let report = PropagationReport {
            recognizers: self.copy_recognizers(plugin_dir, plugin),
            actions: self.copy_actions(plugin_dir, plugin),
        };
        debug!("app2app done for {}", plugin.identifier);
        report
    }

    fn copy_recognizers(
        &self,
        plugin_dir: &Path,
        plugin: &PluginDescriptor,
    ) -> Vec<(PathBuf, Outcome)> {
        let source_dir = plugin_dir
            .join(PLUGIN_CONFIG_DIR)
            .join(PLUGIN_RECOGNIZERS_DIR);
        if !directory_exists(&source_dir) {
            return Vec::new();
        }
        debug!("rec {} exists", source_dir.display());

        let mut results = Vec::new();
        for entry in WalkDir::new(&source_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    error!(
                        "ZWED0177W Unable to list recognizers in {}: {}",
                        source_dir.display(),
                        e
                    );
                    results.push((source_dir.clone(), Outcome::Failed(e.to_string())));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let destination = self.recognizers_dir.join(entry.file_name());
            let outcome =
                merge_recognizer_file(entry.path(), &destination, plugin, self.file_mode);
            results.push((destination, outcome));
        }
        results
    }

    fn copy_actions(&self, plugin_dir: &Path, plugin: &PluginDescriptor) -> Option<Outcome> {
        let source = plugin_dir
            .join(PLUGIN_CONFIG_DIR)
            .join(PLUGIN_ACTIONS_DIR)
            .join(&plugin.identifier);
        if !file_exists(&source) {
            return None;
        }
        debug!("act {} exists", source.display());

        Some(copy_actions(
            &source,
            &self.action_path(&plugin.identifier),
            plugin,
            self.file_mode,
        ))
    }

    /// Remove the plugin's shared action file.
    ///
    /// Recognizers are shared across plugins and are left in place.
    pub fn deregister(&self, plugin_id: &str) -> Outcome {
        let path = self.action_path(plugin_id);
        if !file_exists(&path) {
            return Outcome::NotFound;
        }

        match fs::remove_file(&path) {
            Ok(()) => Outcome::Success,
            Err(e) => {
                error!(
                    "ZWED5015E Could not deregister plugin {}, delete {} failed: {}",
                    plugin_id,
                    path.display(),
                    e
                );
                Outcome::Failed(e.to_string())
            }
        }
    }
}
