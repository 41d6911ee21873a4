//! Filesystem probes and mode-aware writes shared by every component.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PluginInitError, Result};

/// Default mode bits for created files
pub const FILE_MODE: u32 = 0o770;
/// Default mode bits for created directories
pub const FOLDER_MODE: u32 = 0o770;

/// True when `path` exists and is not a directory
pub fn file_exists(path: &Path) -> bool {
    fs::metadata(path).map(|m| !m.is_dir()).unwrap_or(false)
}

/// True when `path` exists and is a directory
pub fn directory_exists(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

/// Create `dir` and any missing parents. An existing directory is not an error.
pub fn mkdirp(dir: &Path, mode: u32) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    match builder.create(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Write `contents` to `path`, truncating any existing file.
///
/// `mode` only applies when the file is created; an existing file keeps
/// its permissions.
pub fn write_with_mode(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    Ok(())
}

/// Read and deserialize a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| PluginInitError::Json {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Serialize `value` as 2-space indented JSON and write it with `mode`
pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T, mode: u32) -> Result<()> {
    let content = serde_json::to_string_pretty(value).map_err(|e| PluginInitError::Json {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    write_with_mode(path, content.as_bytes(), mode)
}

/// Serialize `value` as compact JSON and write it with `mode`
pub fn write_json_compact<T: Serialize>(path: &Path, value: &T, mode: u32) -> Result<()> {
    let content = serde_json::to_string(value).map_err(|e| PluginInitError::Json {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    write_with_mode(path, content.as_bytes(), mode)
}
