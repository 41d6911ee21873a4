use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginInitError {
    #[error("Required setting is missing: {key}")]
    MissingSetting { key: String },

    #[error("Unknown config key: {key}")]
    ConfigKeyNotFound { key: String },

    #[error("Failed to parse config {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Invalid file mode '{value}' - expected an octal value such as 770")]
    InvalidMode { value: String },

    #[error("Plugin descriptor not found: {path}")]
    DescriptorNotFound { path: PathBuf },

    #[error("Component not found: {id}")]
    ComponentNotFound { id: String },

    #[error("{count} operation(s) failed, see log for details")]
    OperationsFailed { count: usize },

    #[error("Invalid JSON in {path}: {message}")]
    Json { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PluginInitError>;

impl PluginInitError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingSetting { .. } | Self::ConfigKeyNotFound { .. } => 2,
            Self::ConfigParse { .. } | Self::InvalidMode { .. } => 3,
            Self::DescriptorNotFound { .. } | Self::ComponentNotFound { .. } => 4,
            Self::OperationsFailed { .. } => 5,
            _ => 1,
        }
    }
}
