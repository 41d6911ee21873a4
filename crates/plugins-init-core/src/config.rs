use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PluginInitError, Result};
use crate::fs_util::{FILE_MODE, FOLDER_MODE};

const CONFIG_FILE: &str = "plugins-init.toml";

pub const ENV_LOG_LEVEL: &str = "ZWE_PRIVATE_LOG_LEVEL_ZWELS";
pub const ENV_RUNTIME_DIR: &str = "ZWE_zowe_runtimeDirectory";
pub const ENV_EXTENSION_DIR: &str = "ZWE_zowe_extensionDirectory";
pub const ENV_WORKSPACE_DIR: &str = "ZWE_zowe_workspaceDirectory";

const BUNDLED_PLUGINS_SUBDIR: &[&str] = &["defaults", "plugins"];
const POINTER_SUBDIR: &[&str] = &["app-server", "plugins"];
const ACTIONS_SUBDIR: &[&str] = &["app-server", "ServiceConfiguration", "actions"];
const RECOGNIZERS_SUBDIR: &[&str] = &["app-server", "ServiceConfiguration", "recognizers"];

/// Default config template with rich comments
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# plugins-init configuration file
#
# Every directory can also come from the environment:
#   ZWE_zowe_runtimeDirectory, ZWE_zowe_extensionDirectory,
#   ZWE_zowe_workspaceDirectory, ZWE_PRIVATE_LOG_LEVEL_ZWELS

# App server root; bundled descriptors are read from <server_root>/defaults/plugins
# server_root = "/opt/zowe/components/app-server/share/zlux-app-server"

# workspace_dir = "/global/zowe/workspace"

# Mode bits for created files and directories
file_mode = 0o770
folder_mode = 0o770
"#;

/// Settings for one run of the utility
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitConfig {
    /// App server root holding `defaults/plugins`
    #[serde(default)]
    pub server_root: Option<PathBuf>,

    /// Runtime root; plugins below it are registered relative to it
    #[serde(default)]
    pub runtime_dir: Option<PathBuf>,

    /// Extension root, searched after `<runtime>/components`
    #[serde(default)]
    pub extension_dir: Option<PathBuf>,

    /// Workspace root used to derive the output directories
    #[serde(default)]
    pub workspace_dir: Option<PathBuf>,

    #[serde(default)]
    pub pointer_dir: Option<PathBuf>,

    #[serde(default)]
    pub actions_dir: Option<PathBuf>,

    #[serde(default)]
    pub recognizers_dir: Option<PathBuf>,

    #[serde(default = "default_file_mode")]
    pub file_mode: u32,

    #[serde(default = "default_folder_mode")]
    pub folder_mode: u32,

    /// DEBUG or TRACE enables debug output
    #[serde(default)]
    pub log_level: Option<String>,
}

fn default_file_mode() -> u32 {
    FILE_MODE
}

fn default_folder_mode() -> u32 {
    FOLDER_MODE
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            server_root: None,
            runtime_dir: None,
            extension_dir: None,
            workspace_dir: None,
            pointer_dir: None,
            actions_dir: None,
            recognizers_dir: None,
            file_mode: FILE_MODE,
            folder_mode: FOLDER_MODE,
            log_level: None,
        }
    }
}

impl InitConfig {
    /// Load config from base directory
    pub fn load(base_dir: &Path) -> Result<Self> {
        Self::load_file(&base_dir.join(CONFIG_FILE))
    }

    /// Load config from an explicit file; a missing file yields the defaults
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: InitConfig =
            toml::from_str(&content).map_err(|e| PluginInitError::ConfigParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        Ok(config)
    }

    /// Save config to base directory
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Get config file path
    pub fn path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE)
    }

    /// Initialize config with default template (rich comments)
    pub fn init(base_dir: &Path) -> Result<PathBuf> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        if !path.exists() {
            fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        }

        Ok(path)
    }

    /// Overlay values from the environment. Set, non-empty variables win over
    /// values loaded from file.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(dir) = get(ENV_RUNTIME_DIR) {
            self.runtime_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = get(ENV_EXTENSION_DIR) {
            self.extension_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = get(ENV_WORKSPACE_DIR) {
            self.workspace_dir = Some(PathBuf::from(dir));
        }
        if let Some(level) = get(ENV_LOG_LEVEL) {
            self.log_level = Some(level);
        }
    }

    /// Overlay values from the process environment
    pub fn apply_process_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    pub fn server_root(&self) -> Result<&Path> {
        self.server_root
            .as_deref()
            .ok_or_else(|| missing("server_root"))
    }

    pub fn runtime_dir(&self) -> Result<&Path> {
        self.runtime_dir
            .as_deref()
            .ok_or_else(|| missing("runtime_dir"))
    }

    /// Directory of descriptors shipped with the install
    pub fn bundled_plugins_dir(&self) -> Result<PathBuf> {
        Ok(join_all(self.server_root()?, BUNDLED_PLUGINS_SUBDIR))
    }

    /// Base for legacy descriptor locations: the parent of the server root
    pub fn install_root(&self) -> Result<PathBuf> {
        let root = self.server_root()?;
        Ok(root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf()))
    }

    pub fn pointer_dir(&self) -> Result<PathBuf> {
        self.workspace_subdir(&self.pointer_dir, POINTER_SUBDIR, "pointer_dir")
    }

    pub fn actions_dir(&self) -> Result<PathBuf> {
        self.workspace_subdir(&self.actions_dir, ACTIONS_SUBDIR, "actions_dir")
    }

    pub fn recognizers_dir(&self) -> Result<PathBuf> {
        self.workspace_subdir(&self.recognizers_dir, RECOGNIZERS_SUBDIR, "recognizers_dir")
    }

    fn workspace_subdir(
        &self,
        explicit: &Option<PathBuf>,
        parts: &[&str],
        key: &str,
    ) -> Result<PathBuf> {
        if let Some(dir) = explicit {
            return Ok(dir.clone());
        }
        self.workspace_dir
            .as_deref()
            .map(|ws| join_all(ws, parts))
            .ok_or_else(|| missing(key))
    }

    /// True when the log level asks for debug output
    pub fn debug_enabled(&self) -> bool {
        self.log_level
            .as_deref()
            .map(|level| {
                level.eq_ignore_ascii_case("DEBUG") || level.eq_ignore_ascii_case("TRACE")
            })
            .unwrap_or(false)
    }

    /// `tracing` filter directive matching the configured level
    pub fn log_filter(&self) -> &'static str {
        if self.debug_enabled() {
            "plugins_init_core=debug,plugins_init=debug"
        } else {
            "plugins_init_core=info,plugins_init=info"
        }
    }

    /// Get a config value by key
    pub fn get(&self, key: &str) -> Option<String> {
        self.list()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Set a config value by key
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = || {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(PathBuf::from(trimmed))
            }
        };

        match key {
            "server_root" => self.server_root = path(),
            "runtime_dir" => self.runtime_dir = path(),
            "extension_dir" => self.extension_dir = path(),
            "workspace_dir" => self.workspace_dir = path(),
            "pointer_dir" => self.pointer_dir = path(),
            "actions_dir" => self.actions_dir = path(),
            "recognizers_dir" => self.recognizers_dir = path(),
            "file_mode" => self.file_mode = parse_mode(value)?,
            "folder_mode" => self.folder_mode = parse_mode(value)?,
            "log_level" => {
                let trimmed = value.trim();
                self.log_level = (!trimmed.is_empty()).then(|| trimmed.to_string());
            }
            _ => {
                return Err(PluginInitError::ConfigKeyNotFound {
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    /// List all config keys with their current values
    pub fn list(&self) -> Vec<(String, String)> {
        let show = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        };

        vec![
            ("server_root".to_string(), show(&self.server_root)),
            ("runtime_dir".to_string(), show(&self.runtime_dir)),
            ("extension_dir".to_string(), show(&self.extension_dir)),
            ("workspace_dir".to_string(), show(&self.workspace_dir)),
            ("pointer_dir".to_string(), show(&self.pointer_dir)),
            ("actions_dir".to_string(), show(&self.actions_dir)),
            ("recognizers_dir".to_string(), show(&self.recognizers_dir)),
            ("file_mode".to_string(), format!("{:o}", self.file_mode)),
            ("folder_mode".to_string(), format!("{:o}", self.folder_mode)),
            (
                "log_level".to_string(),
                self.log_level.clone().unwrap_or_default(),
            ),
        ]
    }
}

fn missing(key: &str) -> PluginInitError {
    PluginInitError::MissingSetting {
        key: key.to_string(),
    }
}

fn join_all(base: &Path, parts: &[&str]) -> PathBuf {
    parts.iter().fold(base.to_path_buf(), |acc, p| acc.join(p))
}

/// Parse octal mode bits such as `770`, `0770` or `0o770`
pub fn parse_mode(value: &str) -> Result<u32> {
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix("0o").unwrap_or(trimmed);

    match u32::from_str_radix(digits, 8) {
        Ok(mode) if !digits.is_empty() && mode <= 0o7777 => Ok(mode),
        _ => Err(PluginInitError::InvalidMode {
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("770").unwrap(), 0o770);
        assert_eq!(parse_mode("0770").unwrap(), 0o770);
        assert_eq!(parse_mode("0o640").unwrap(), 0o640);
        assert!(parse_mode("998").is_err());
        assert!(parse_mode("").is_err());
        assert!(parse_mode("77777").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = InitConfig::default();
        assert_eq!(config.file_mode, 0o770);
        assert_eq!(config.folder_mode, 0o770);
        assert!(!config.debug_enabled());
        assert!(config.server_root().is_err());
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let tmp = TempDir::new().unwrap();
        let config = InitConfig::load(tmp.path()).unwrap();
        assert_eq!(config, InitConfig::default());
    }

    #[test]
    fn test_init_template_parses() {
        let tmp = TempDir::new().unwrap();
        let path = InitConfig::init(tmp.path()).unwrap();
        assert!(path.exists());

        let config = InitConfig::load(tmp.path()).unwrap();
        assert_eq!(config.file_mode, 0o770);
        assert!(config.server_root.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = InitConfig::default();
        config.set("server_root", "/opt/app/zlux-app-server").unwrap();
        config.set("file_mode", "640").unwrap();
        config.save(tmp.path()).unwrap();

        let loaded = InitConfig::load(tmp.path()).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.file_mode, 0o640);
    }

    #[test]
    fn test_load_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(InitConfig::path(tmp.path()), "file_mode = [").unwrap();

        let err = InitConfig::load(tmp.path()).unwrap_err();
        assert!(matches!(err, PluginInitError::ConfigParse { .. }));
    }

    #[test]
    fn test_apply_env() {
        let env: HashMap<&str, &str> = [
            (ENV_RUNTIME_DIR, "/opt/zowe"),
            (ENV_WORKSPACE_DIR, "/ws"),
            (ENV_EXTENSION_DIR, ""),
            (ENV_LOG_LEVEL, "trace"),
        ]
        .into_iter()
        .collect();

        let mut config = InitConfig {
            extension_dir: Some(PathBuf::from("/from/file")),
            ..InitConfig::default()
        };
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.runtime_dir, Some(PathBuf::from("/opt/zowe")));
        assert_eq!(config.extension_dir, Some(PathBuf::from("/from/file")));
        assert!(config.debug_enabled());
        assert_eq!(
            config.pointer_dir().unwrap(),
            PathBuf::from("/ws/app-server/plugins")
        );
    }

    #[test]
    fn test_derived_directories() {
        let mut config = InitConfig::default();
        config.set("server_root", "/opt/zowe/zlux-app-server").unwrap();
        config.set("actions_dir", "/custom/actions").unwrap();

        assert_eq!(
            config.bundled_plugins_dir().unwrap(),
            PathBuf::from("/opt/zowe/zlux-app-server/defaults/plugins")
        );
        assert_eq!(config.install_root().unwrap(), PathBuf::from("/opt/zowe"));
        assert_eq!(
            config.actions_dir().unwrap(),
            PathBuf::from("/custom/actions")
        );
        assert!(matches!(
            config.recognizers_dir(),
            Err(PluginInitError::MissingSetting { .. })
        ));
    }

    #[test]
    fn test_get_set_list() {
        let mut config = InitConfig::default();
        config.set("log_level", "DEBUG").unwrap();
        assert_eq!(config.get("log_level").unwrap(), "DEBUG");
        assert_eq!(config.get("folder_mode").unwrap(), "770");
        assert!(config.get("nope").is_none());
        assert!(config.set("nope", "x").is_err());
        assert_eq!(config.list().len(), 10);
    }
}
