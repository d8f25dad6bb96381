//! CLI command handlers.

use std::path::Path;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use color_eyre::eyre::{bail, eyre, WrapErr};
use color_eyre::Result;
use colored::Colorize;

use super::args::{Args, Commands, Setting};
use crate::app::{dispatch, App, ConsolePresenter};
use crate::config::{self, Config};
use crate::constants;
use crate::core::collector::installed_clients;
use crate::core::engine::{ControlOutcome, Engine, EngineState};
use crate::core::executor::{CommandExecutor, SystemExecutor};
use crate::core::probes::Platform;
use crate::core::store::{JsonFileStore, PersistenceStore, Preferences, StoreKey, StoreValue};
use crate::state::VpnStatus;
use crate::theme::{self, IconTheme, SOUNDS};

/// Runs the command named by `args`.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or the command fails.
pub fn execute(args: Args) -> Result<()> {
    let config_path = match args.config {
        Some(path) => path,
        None => config::default_config_path()?,
    };
    let command = args.command.unwrap_or(Commands::Run);

    if let Commands::Config { init, force, path } = command {
        return handle_config(&config_path, init, force, path);
    }

    let config = Config::load(&config_path)
        .wrap_err_with(|| format!("Failed to load {}", config_path.display()))?;

    match command {
        Commands::Run => handle_run(&config),
        Commands::Status => handle_status(&config),
        Commands::Probe => handle_probe(&config),
        Commands::Clients { all } => {
            handle_clients(&config, all);
            Ok(())
        }
        Commands::Connect { name } => {
            control(&config, |engine, state, now| engine.connect(state, &name, now))?;
            println!("Connect requested for {name}");
            Ok(())
        }
        Commands::Disconnect { name } => {
            control(&config, |engine, state, now| engine.disconnect(state, &name, now))?;
            println!("Disconnect requested for {name}");
            Ok(())
        }
        Commands::Launch { name } => {
            control(&config, |engine, state, now| engine.launch(state, &name, now))
        }
        Commands::Set { setting, value } => {
            let mut store = JsonFileStore::open_default()?;
            apply_setting(&mut store, setting, &value)?;
            println!("{setting:?} set to {value}");
            Ok(())
        }
        Commands::Icons {
            connected,
            connecting,
            disconnected,
            reset,
        } => {
            let mut store = JsonFileStore::open_default()?;
            apply_icons(&mut store, [connected, connecting, disconnected], reset)?;
            let prefs = Preferences::load(&store);
            for status in [VpnStatus::Connected, VpnStatus::Connecting, VpnStatus::Disconnected] {
                println!("{:<13} {}", status.to_string(), theme::status_icon(&prefs, status));
            }
            Ok(())
        }
        Commands::Config { .. } => Ok(()),
    }
}

fn executor(config: &Config) -> Rc<dyn CommandExecutor> {
    Rc::new(SystemExecutor::new(config.probe_timeout()))
}

fn engine(config: &Config) -> Engine {
    Engine::new(config, executor(config), Platform::current())
}

/// Runs one control request and shows its notifications. The state is
/// restored from disk so the notification debounce carries over.
fn control(
    config: &Config,
    request: impl FnOnce(&Engine, &mut EngineState, DateTime<Utc>) -> ControlOutcome,
) -> Result<()> {
    let mut store = JsonFileStore::open_default()?;
    let mut state = EngineState::restore(&store);
    let outcome = request(&engine(config), &mut state, Utc::now());
    dispatch(outcome.effects, &mut store, &mut ConsolePresenter);
    Ok(outcome.result?)
}

fn handle_run(config: &Config) -> Result<()> {
    log::info!("{} {}", constants::APP_NAME, constants::APP_VERSION);
    let store = JsonFileStore::open_default()?;
    log::debug!("State file: {}", store.path().display());
    let mut app = App::new(engine(config), Box::new(store), Box::new(ConsolePresenter));
    app.run(config)
}

fn handle_status(config: &Config) -> Result<()> {
    let store = JsonFileStore::open_default()?;
    let prefs = Preferences::load(&store);
    let persisted = EngineState::restore(&store);

    let engine = engine(config);
    let snapshot = engine.collector().collect();
    let status = engine.resolver().resolve(&snapshot);

    // Persisted session figures only mean something if still connected.
    let (session, usage) = if status.is_connected() && persisted.status.is_connected() {
        (persisted.session, persisted.usage)
    } else {
        Default::default()
    };
    let address = if status.is_connected() {
        engine.collector().tunnel_address()
    } else {
        None
    };
    println!(
        "{}",
        theme::status_line(
            &prefs,
            status,
            &session,
            (&usage.counters, usage.is_estimated()),
            address,
            Utc::now()
        )
    );
    Ok(())
}

fn handle_probe(config: &Config) -> Result<()> {
    let engine = engine(config);
    let (snapshot, report) = engine.collector().collect_with_report();

    println!("{}", "Probes".bold());
    for outcome in &report {
        match &outcome.result {
            Ok(value) => println!("  {:<16} {} -> {value}", outcome.name, outcome.command),
            Err(e) => println!(
                "  {:<16} {} -> {}",
                outcome.name,
                outcome.command,
                e.as_str().red()
            ),
        }
    }

    println!("\n{}", "Signals".bold());
    println!("  service state      {:?}", snapshot.system_service_state);
    let processes = if snapshot.known_processes.is_empty() {
        constants::MSG_NO_DATA.to_string()
    } else {
        snapshot
            .known_processes
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!("  known clients      {processes}");
    println!("  tunnel interface   {}", snapshot.active_tunnel_interface);
    println!("  proxy enabled      {}", snapshot.proxy_enabled);
    println!("  corporate marker   {}", snapshot.corporate_marker_present);

    let rule = engine
        .resolver()
        .matching_rule(&snapshot)
        .map_or("none", |r| r.name);
    println!(
        "\n{} {} (rule: {rule})",
        "Status".bold(),
        engine.resolver().resolve(&snapshot)
    );
    Ok(())
}

fn handle_clients(config: &Config, all: bool) {
    if all {
        for client in &config.clients {
            let mark = if client.is_installed() {
                "installed".green()
            } else {
                "missing".dimmed()
            };
            println!("{:<18} {mark}", client.name);
        }
        return;
    }

    let installed = installed_clients(config);
    if installed.is_empty() {
        println!("{}", constants::MSG_NO_CLIENTS);
    }
    for client in installed {
        println!("{:<18} {}", client.name, client.app_path.display());
    }
}

fn handle_config(path: &Path, init: bool, force: bool, only_path: bool) -> Result<()> {
    if only_path {
        println!("{}", path.display());
        return Ok(());
    }
    if init {
        if path.exists() && !force {
            bail!("{} already exists (use --force to overwrite)", path.display());
        }
        Config::default().save(path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }
    let config = Config::load(path)?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn parse_switch(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(eyre!("expected on or off, got {value:?}")),
    }
}

/// Validates and stores one preference.
///
/// # Errors
///
/// Fails on an unknown theme or sound, a bad switch value, or a store error.
pub fn apply_setting(
    store: &mut dyn PersistenceStore,
    setting: Setting,
    value: &str,
) -> Result<()> {
    let (key, value) = match setting {
        Setting::Theme => {
            let theme = IconTheme::find(value).ok_or_else(|| {
                let names: Vec<_> = theme::THEMES.iter().map(|t| t.name).collect();
                eyre!("unknown theme {value:?}; choose one of {}", names.join(", "))
            })?;
            (StoreKey::IconTheme, StoreValue::Text(theme.name.to_string()))
        }
        Setting::Sound => {
            let sound = SOUNDS
                .iter()
                .find(|s| s.eq_ignore_ascii_case(value))
                .ok_or_else(|| {
                    eyre!("unknown sound {value:?}; choose one of {}", SOUNDS.join(", "))
                })?;
            (StoreKey::DisconnectSound, StoreValue::Text((*sound).to_string()))
        }
        Setting::Notifications => (
            StoreKey::NotificationsEnabled,
            StoreValue::Bool(parse_switch(value)?),
        ),
        Setting::AutoStart => (StoreKey::AutoStart, StoreValue::Bool(parse_switch(value)?)),
    };
    store
        .set(key, value)
        .wrap_err_with(|| format!("Failed to save {key}"))
}

/// Stores custom icons; `None` leaves a slot unchanged, `reset` clears all.
///
/// # Errors
///
/// Fails if nothing was given or the store cannot be written.
pub fn apply_icons(
    store: &mut dyn PersistenceStore,
    icons: [Option<String>; 3],
    reset: bool,
) -> Result<()> {
    let keys = [
        StoreKey::CustomConnectedIcon,
        StoreKey::CustomConnectingIcon,
        StoreKey::CustomDisconnectedIcon,
    ];
    if reset {
        for key in keys {
            store.remove(key)?;
        }
        return Ok(());
    }
    if icons.iter().all(Option::is_none) {
        bail!("give at least one icon, or --reset");
    }
    for (key, icon) in keys.into_iter().zip(icons) {
        if let Some(icon) = icon.filter(|i| !i.trim().is_empty()) {
            store.set(key, StoreValue::Text(icon))?;
        }
    }
    Ok(())
}
