//! Command-line argument definitions.

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;

/// vpnwatch - infers VPN connectivity from OS signals
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to config.toml (defaults to the user config directory)
    #[arg(long, global = true, env = "VPNWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log verbosity
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = LogLevel::Warn,
        env = "VPNWATCH_LOG"
    )]
    pub log_level: LogLevel,

    /// Subcommand to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Watch continuously, printing notifications (reads commands from stdin)
    Run,
    /// Print the current status once
    Status,
    /// Print every raw signal and how it resolved
    Probe,
    /// List installed VPN clients
    Clients {
        /// Include clients that are not installed
        #[arg(long)]
        all: bool,
    },
    /// Ask a VPN client to connect
    ///
    /// Connect attempts only count toward the connection-issues warning when
    /// issued as a `connect` command to a running `vpnwatch run`.
    Connect { name: String },
    /// Ask a VPN client or system VPN service to disconnect
    Disconnect { name: String },
    /// Open a VPN client's application
    Launch { name: String },
    /// Change a preference
    Set { setting: Setting, value: String },
    /// Set custom status icons, or reset to the theme
    Icons {
        connected: Option<String>,
        connecting: Option<String>,
        disconnected: Option<String>,
        /// Remove all custom icons
        #[arg(long, conflicts_with_all = ["connected", "connecting", "disconnected"])]
        reset: bool,
    },
    /// Show or create the config file
    Config {
        /// Write a config file with default values
        #[arg(long)]
        init: bool,
        /// Overwrite an existing file with --init
        #[arg(long, requires = "init")]
        force: bool,
        /// Only print the config file location
        #[arg(long, conflicts_with = "init")]
        path: bool,
    },
}

/// Preferences settable from the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    /// Icon theme name
    Theme,
    /// Disconnect sound name, or None
    Sound,
    /// on/off
    Notifications,
    /// on/off
    AutoStart,
}
