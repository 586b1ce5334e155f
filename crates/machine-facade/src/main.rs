use clap::{Arg, ArgAction, Command};
use machine_engine::{Config, NoopPackageSyncer, ReconfigurationEngine};
use machine_facade::{default_cache_path, LocalMachine};
use machine_modules::PluginModuleManager;
use machine_process::ProcessSupervisor;
use machine_registry::Registry;
use machine_resources::ResourceManager;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Command::new("machine-runtime")
        .version(machine_facade::VERSION)
        .about("Resource graph manager and reconfiguration engine for a machine-control runtime")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("run")
                .about("Apply a config file and run until interrupted")
                .arg(Arg::new("config").long("config").required(true).help("Path to a machine config file (YAML or JSON)"))
                .arg(
                    Arg::new("debug")
                        .long("debug")
                        .action(ArgAction::SetTrue)
                        .help("Enable debug-level logging"),
                ),
        )
        .subcommand(
            Command::new("export-dot")
                .about("Apply a config file and print the resulting resource graph as Graphviz")
                .arg(Arg::new("config").long("config").required(true)),
        )
        .subcommand(Command::new("version").about("Print the runtime version"));

    let matches = cli.get_matches();

    match matches.subcommand() {
        Some(("run", args)) => {
            init_tracing(args.get_flag("debug"));
            let config_path = args.get_one::<String>("config").expect("required");
            let config = load_config_file(config_path)?;
            let machine = build_machine().await?;
            machine.reconfigure(config).await?;
            tracing::info!("machine running, press ctrl-c to stop");
            tokio::signal::ctrl_c().await?;
            machine.close().await?;
        }
        Some(("export-dot", args)) => {
            init_tracing(false);
            let config_path = args.get_one::<String>("config").expect("required");
            let config = load_config_file(config_path)?;
            let machine = build_machine().await?;
            machine.reconfigure(config).await?;
            println!("{}", machine.export_resources_as_dot());
        }
        Some(("version", _)) => {
            println!("machine-runtime {}", machine_facade::VERSION);
        }
        _ => {}
    }

    Ok(())
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .init();
}

fn load_config_file(path: &str) -> anyhow::Result<Config> {
    let bytes = std::fs::read_to_string(path)?;
    if path.ends_with(".json") {
        Ok(serde_json::from_str(&bytes)?)
    } else if path.ends_with(".toml") {
        Ok(toml::from_str(&bytes)?)
    } else {
        Ok(serde_yaml::from_str(&bytes)?)
    }
}

async fn build_machine() -> anyhow::Result<LocalMachine> {
    let registry = Arc::new(Registry::new());
    let modules = Arc::new(PluginModuleManager::new());
    let processes = Arc::new(ProcessSupervisor::new());
    let resources = Arc::new(ResourceManager::new(
        Arc::new(machine_graph::ResourceGraph::new()),
        registry.clone(),
        processes.clone(),
        modules.clone(),
    ));
    let engine = ReconfigurationEngine::new(resources, modules, processes, Arc::new(NoopPackageSyncer::default()), None);
    let cache_path: PathBuf = default_cache_path().unwrap_or_else(|_| PathBuf::from("machine-runtime-config-cache.yaml"));
    Ok(LocalMachine::new(engine, registry, cache_path))
}
