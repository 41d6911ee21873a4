pub mod app2app;
pub mod bundled;
pub mod component;
pub mod config;
pub mod error;
pub mod fs_util;
pub mod outcome;
pub mod plugin;
pub mod pointer;
pub mod terminal;

pub use app2app::{
    copy_actions, merge_recognizer_file, merge_recognizers, App2AppPropagator, PropagationReport,
    RecognizerKey,
};
pub use bundled::{previously_seen, BundledDescriptor, BundledPluginReconciler, ReconcileReport};
pub use component::{find_component_directory, manifest_path};
pub use config::InitConfig;
pub use error::{PluginInitError, Result};
pub use fs_util::{directory_exists, file_exists, mkdirp, FILE_MODE, FOLDER_MODE};
pub use outcome::{Outcome, OutcomeCounts};
pub use plugin::PluginDescriptor;
pub use pointer::{PluginPointer, PointerRegistry, RegistrationReport, RUNTIME_ROOT_VARIABLE};
pub use terminal::{write_terminal_defaults, TerminalEnv};
