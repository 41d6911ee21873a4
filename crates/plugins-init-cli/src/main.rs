use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use colored::{ColoredString, Colorize};

use plugins_init_core::plugin::PLUGIN_DEFINITION_FILE;
use plugins_init_core::{
    find_component_directory, manifest_path, mkdirp, previously_seen, write_terminal_defaults,
    BundledPluginReconciler, InitConfig, Outcome, OutcomeCounts, PluginDescriptor,
    PluginInitError, PointerRegistry, Result, TerminalEnv,
};

mod args;
use args::{Cli, Commands, ConfigAction};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let base_dir = resolve_base_dir(cli.base_dir.clone());

    let result = match &cli.command {
        None => {
            Cli::command().print_help().ok();
            Ok(())
        }
        Some(Commands::Config { action }) => handle_config(action, &base_dir),
        Some(command) => load_config(&cli, &base_dir).and_then(|config| {
            init_logging(&cli, &config);
            tracing::debug!(?config, "Effective configuration");
            run(command, &config, &base_dir, cli.strict)
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn resolve_base_dir(cli_base: Option<PathBuf>) -> PathBuf {
    if let Some(base) = cli_base {
        return base;
    }

    if let Ok(base) = std::env::var("PLUGINS_INIT_BASE") {
        return PathBuf::from(base);
    }

    PathBuf::from(".")
}

/// File config, then environment, then command-line flags
fn load_config(cli: &Cli, base_dir: &Path) -> Result<InitConfig> {
    let mut config = InitConfig::load(base_dir)?;
    config.apply_process_env();

    if let Some(dir) = &cli.server_root {
        config.server_root = Some(dir.clone());
    }
    if let Some(dir) = &cli.runtime_dir {
        config.runtime_dir = Some(dir.clone());
    }
    if let Some(dir) = &cli.extension_dir {
        config.extension_dir = Some(dir.clone());
    }
    if let Some(dir) = &cli.workspace_dir {
        config.workspace_dir = Some(dir.clone());
    }

    Ok(config)
}

// Logs go to stderr; stdout carries the report
fn init_logging(cli: &Cli, config: &InitConfig) {
    let filter = if cli.quiet {
        "plugins_init_core=error,plugins_init=error"
    } else if cli.verbose {
        "plugins_init_core=debug,plugins_init=debug"
    } else {
        config.log_filter()
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(command: &Commands, config: &InitConfig, base_dir: &Path, strict: bool) -> Result<()> {
    match command {
        Commands::Bundled {
            destination,
            config_destination,
        } => handle_bundled(
            config,
            destination.as_deref(),
            config_destination.as_deref(),
            strict,
        ),
        Commands::Register { plugin_dir } => handle_register(config, plugin_dir, strict),
        Commands::RegisterComponent { component_id } => {
            let dir = locate_component(config, component_id)?;
            handle_register(config, &dir, strict)
        }
        Commands::Deregister { identifier } => handle_deregister(config, identifier, strict),
        Commands::Locate { component_id } => handle_locate(config, component_id),
        Commands::List => handle_list(config),
        Commands::Config { action } => handle_config(action, base_dir),
    }
}

fn handle_config(action: &ConfigAction, base_dir: &Path) -> Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = InitConfig::load(base_dir)?;
            match config.get(key) {
                Some(value) => {
                    println!("{}", value);
                }
                None => {
                    return Err(PluginInitError::ConfigKeyNotFound { key: key.clone() });
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = InitConfig::load(base_dir)?;
            config.set(key, value)?;
            config.save(base_dir)?;
            println!("{} {} = {}", "Set:".green(), key, value);
        }
        ConfigAction::List => {
            let config = InitConfig::load(base_dir)?;
            println!();
            for (key, value) in config.list() {
                println!("{} = {}", key.cyan(), value);
            }
            println!();
        }
        ConfigAction::Path => {
            println!("{}", InitConfig::path(base_dir).display());
        }
        ConfigAction::Init => {
            let path = InitConfig::init(base_dir)?;
            println!("{} {}", "Initialized:".green(), path.display());
        }
    }

    Ok(())
}

fn handle_bundled(
    config: &InitConfig,
    destination: Option<&Path>,
    config_destination: Option<&Path>,
    strict: bool,
) -> Result<()> {
    let destination = match destination {
        Some(dir) => dir.to_path_buf(),
        None => config.pointer_dir()?,
    };
    mkdirp(&destination, config.folder_mode)?;

    let reconciler = BundledPluginReconciler::from_config(config)?;
    let seen = previously_seen(&destination);
    let report = reconciler.reconcile_all(&destination, &seen, config.file_mode);

    println!();
    for (name, outcome) in &report.results {
        println!("  {:<10} {}", label(outcome), name);
    }
    let mut counts = report.counts();

    if let Some(config_dest) = config_destination {
        let items: Vec<String> = previously_seen(&destination).into_iter().collect();
        let results = write_terminal_defaults(
            config_dest,
            &items,
            &TerminalEnv::from_process_env(),
            config.folder_mode,
            config.file_mode,
        );
        for (path, outcome) in &results {
            println!("  {:<10} {}", label(outcome), path.display());
            counts.record(outcome);
        }
    }

    print_summary(&counts);
    fail_on(&counts, strict)
}

fn handle_register(config: &InitConfig, plugin_dir: &Path, strict: bool) -> Result<()> {
    let plugin_dir = if plugin_dir.is_relative() {
        std::env::current_dir()?.join(plugin_dir)
    } else {
        plugin_dir.to_path_buf()
    };

    let descriptor =
        PluginDescriptor::load(&plugin_dir)?.ok_or_else(|| PluginInitError::DescriptorNotFound {
            path: plugin_dir.join(PLUGIN_DEFINITION_FILE),
        })?;

    let registry = PointerRegistry::from_config(config)?;
    bootstrap_dirs(config)?;

    let report = registry.register(&plugin_dir, &descriptor);

    println!();
    println!(
        "  {:<10} {} ({})",
        label(&report.pointer),
        descriptor.identifier,
        registry.pointer_path(&descriptor.identifier).display()
    );
    for (path, outcome) in &report.app2app.recognizers {
        println!("  {:<10} {}", label(outcome), path.display());
    }
    if let Some(outcome) = &report.app2app.actions {
        println!("  {:<10} actions for {}", label(outcome), descriptor.identifier);
    }

    let mut counts = report.app2app.counts();
    counts.record(&report.pointer);
    print_summary(&counts);
    fail_on(&counts, strict)
}

fn handle_deregister(config: &InitConfig, identifier: &str, strict: bool) -> Result<()> {
    let registry = PointerRegistry::from_config(config)?;
    let descriptor = PluginDescriptor::new(identifier, "", PathBuf::new());

    match registry.deregister(&descriptor) {
        Outcome::Success => {
            println!("{} {}", "Deregistered:".green(), identifier);
            Ok(())
        }
        Outcome::NotFound | Outcome::Skipped => {
            println!("{} {} is not registered", "Note:".yellow(), identifier);
            Ok(())
        }
        Outcome::Failed(reason) => {
            println!("{} {}: {}", "Failed:".red().bold(), identifier, reason);
            let mut counts = OutcomeCounts::default();
            counts.record(&Outcome::Failed(reason));
            fail_on(&counts, strict)
        }
    }
}

fn handle_locate(config: &InitConfig, component_id: &str) -> Result<()> {
    let dir = locate_component(config, component_id)?;
    println!("{} {}", "Component:".cyan(), dir.display());
    match manifest_path(&dir) {
        Some(manifest) => println!("{} {}", "Manifest:".cyan(), manifest.display()),
        None => println!("{} none", "Manifest:".cyan()),
    }
    Ok(())
}

fn handle_list(config: &InitConfig) -> Result<()> {
    let registry = PointerRegistry::from_config(config)?;
    let pointers = registry.list();

    if pointers.is_empty() {
        println!("No plugins registered in {}", registry.pointer_dir().display());
        return Ok(());
    }

    println!();
    for pointer in pointers {
        match &pointer.relative_to {
            Some(root) => println!(
                "  {} -> {}/{}",
                pointer.identifier.cyan(),
                root,
                pointer.plugin_location
            ),
            None => println!("  {} -> {}", pointer.identifier.cyan(), pointer.plugin_location),
        }
    }
    println!();
    Ok(())
}

fn locate_component(config: &InitConfig, component_id: &str) -> Result<PathBuf> {
    find_component_directory(
        config.runtime_dir()?,
        config.extension_dir.as_deref(),
        component_id,
    )
    .ok_or_else(|| PluginInitError::ComponentNotFound {
        id: component_id.to_string(),
    })
}

fn bootstrap_dirs(config: &InitConfig) -> Result<()> {
    for dir in [
        config.pointer_dir()?,
        config.actions_dir()?,
        config.recognizers_dir()?,
    ] {
        mkdirp(&dir, config.folder_mode)?;
    }
    Ok(())
}

fn label(outcome: &Outcome) -> ColoredString {
    match outcome {
        Outcome::Success => "written".green(),
        Outcome::Skipped => "unchanged".dimmed(),
        Outcome::NotFound => "missing".yellow(),
        Outcome::Failed(_) => "failed".red().bold(),
    }
}

fn print_summary(counts: &OutcomeCounts) {
    println!();
    println!(
        "{} {} written, {} unchanged, {} missing, {} failed",
        "Summary:".bold(),
        counts.written,
        counts.skipped,
        counts.not_found,
        counts.failed
    );
}

/// Failed items are reported in the summary; they only fail the run in
/// strict mode.
fn fail_on(counts: &OutcomeCounts, strict: bool) -> Result<()> {
    if strict && counts.has_failures() {
        return Err(PluginInitError::OperationsFailed {
            count: counts.failed,
        });
    }
    Ok(())
}
