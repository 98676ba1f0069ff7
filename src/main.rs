//! stagescript - Main entry point
//!
//! Wires configuration, the instance store and the stage driver together for
//! one pipeline step.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use stagescript::cli::{Cli, Commands};
use stagescript::{
    check_instance, Config, FsScriptWriter, JsonFileStore, Stage, StageDriver, StageScriptError,
};

/// Initialize the logger; `RUST_LOG` overrides the default filter
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "stagescript=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Config::load_from_file(path)
        }
        None => {
            debug!("No configuration file given, using defaults");
            Ok(Config::default())
        }
    }
}

fn main() {
    init_tracing();

    let cli = Cli::parse_args();
    if let Err(e) = run(cli) {
        error!("{:#}", e);
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let env: HashMap<String, String> = std::env::vars().collect();
    let config = load_config(cli.config.as_deref())?.with_env_overrides(&env);

    match cli.command {
        Commands::Generate {
            stage,
            store,
            uuid,
            build_dir,
        } => {
            let mut config = config;
            if let Some(dir) = build_dir {
                config.build_dir = dir;
            }
            config.validate().context("Invalid configuration")?;

            let uuid = match uuid {
                Some(uuid) => uuid,
                None => env.get(&config.instance_uuid_var).cloned().with_context(|| {
                    format!(
                        "No instance uuid given and {} is not set",
                        config.instance_uuid_var
                    )
                })?,
            };

            info!("Generating {} script for instance {}", stage, uuid);
            let store = JsonFileStore::new(&store);
            let writer = FsScriptWriter;
            let outcome = StageDriver::new(&config, &store, &writer)
                .run(stage, &uuid, &env)
                .with_context(|| format!("Stage {} failed for instance {}", stage, uuid))?;

            println!("✓ {}", outcome.script_path.display());
            if outcome.restart_needed {
                println!("  (ends with an instance restart)");
            }
        }
        Commands::Validate { store } => {
            let store = JsonFileStore::new(&store);
            let entries = store
                .load_all()
                .with_context(|| format!("Failed to load instance store {:?}", store.path()))?;

            let mut failures = 0;
            for (index, entry) in entries.iter().enumerate() {
                let label = if entry.uuid.is_empty() {
                    format!("entry #{}", index)
                } else {
                    entry.uuid.clone()
                };
                let checked = match &entry.definition {
                    Ok(definition) => check_instance(definition),
                    Err(e) => Err(StageScriptError::invalid_argument(e.to_string())),
                };
                match checked {
                    Ok(()) => println!("✓ {}", label),
                    Err(e) => {
                        failures += 1;
                        eprintln!("✗ {}: {}", label, e);
                    }
                }
            }
            if failures > 0 {
                anyhow::bail!("{} of {} instances are invalid", failures, entries.len());
            }
            info!("All {} instances are valid", entries.len());
        }
        Commands::Stages => {
            for stage in Stage::all_stages() {
                println!(
                    "{}. {:<20} {}",
                    stage.order() + 1,
                    stage.code(),
                    config.script_names.get(*stage)
                );
            }
        }
        Commands::Config { output } => {
            config.validate().context("Invalid configuration")?;
            match output {
                Some(path) => {
                    config.save_to_file(&path)?;
                    println!("✓ {}", path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&config)?),
            }
        }
    }

    Ok(())
}
