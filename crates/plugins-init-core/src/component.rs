//! Component and manifest lookup on an installed runtime.

use std::path::{Path, PathBuf};

use crate::fs_util::{directory_exists, file_exists};

/// Manifest file names, in lookup order
pub const MANIFEST_FILES: &[&str] = &["manifest.yaml", "manifest.yml", "manifest.json"];

const COMPONENTS_DIR: &str = "components";

/// Find the manifest of a component directory, trying each known file name
pub fn manifest_path(component_dir: &Path) -> Option<PathBuf> {
    MANIFEST_FILES
        .iter()
        .map(|name| component_dir.join(name))
        .find(|path| file_exists(path))
}

/// Find the install directory of a component.
///
/// Core components live under `<runtime>/components/<id>`; extensions live
/// directly under the extension root.
pub fn find_component_directory(
    runtime_dir: &Path,
    extension_dir: Option<&Path>,
    component_id: &str,
) -> Option<PathBuf> {
    let core = runtime_dir.join(COMPONENTS_DIR).join(component_id);
    if directory_exists(&core) {
        return Some(core);
    }

    extension_dir
        .map(|ext| ext.join(component_id))
        .filter(|dir| directory_exists(dir))
}
