use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "plugins-init")]
#[command(about = "Registers bundled and installed plugins into an app-server workspace")]
#[command(version)]
pub struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Exit non-zero when any plugin file failed to write or parse
    #[arg(long, global = true)]
    pub strict: bool,

    /// Directory holding plugins-init.toml (default: current directory)
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    /// App server root holding defaults/plugins
    #[arg(long, global = true)]
    pub server_root: Option<PathBuf>,

    /// Runtime root (overrides ZWE_zowe_runtimeDirectory)
    #[arg(long, global = true)]
    pub runtime_dir: Option<PathBuf>,

    /// Extension root (overrides ZWE_zowe_extensionDirectory)
    #[arg(long, global = true)]
    pub extension_dir: Option<PathBuf>,

    /// Workspace root (overrides ZWE_zowe_workspaceDirectory)
    #[arg(long, global = true)]
    pub workspace_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write pointer files for every bundled plugin
    Bundled {
        /// Pointer directory to write into (default: configured pointer_dir)
        #[arg(long)]
        destination: Option<PathBuf>,

        /// Also write default terminal sessions under this directory
        #[arg(long)]
        config_destination: Option<PathBuf>,
    },

    /// Register the plugin installed at a directory
    Register {
        /// Plugin directory containing pluginDefinition.json
        plugin_dir: PathBuf,
    },

    /// Register a component found under the runtime or extension root
    RegisterComponent {
        /// Component identifier (directory name)
        component_id: String,
    },

    /// Remove a plugin's pointer file (or its action file)
    Deregister {
        /// Plugin identifier
        identifier: String,
    },

    /// Show where a component is installed and its manifest
    Locate {
        /// Component identifier (directory name)
        component_id: String,
    },

    /// List registered plugin pointers
    List,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g., workspace_dir)
        key: String,
    },

    /// Set a config value
    Set {
        /// Config key (e.g., file_mode)
        key: String,

        /// Value to set (e.g., "/global/zowe/workspace" or "770")
        value: String,
    },

    /// List all config values
    List,

    /// Show config file path
    Path,

    /// Initialize config file with default template
    Init,
}
