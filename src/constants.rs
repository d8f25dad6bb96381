//! Application-wide constants and default configuration values.
//!
//! Every tunable here has a matching field in [`crate::config::Config`]; these
//! are the defaults used when no config file overrides them.

use std::time::Duration;

// === Application Metadata ===

/// Application name (from Cargo.toml).
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
/// Current application version (from Cargo.toml).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// === Timing Configuration ===

/// Interval between status ticks.
pub const DEFAULT_TICK_SECS: u64 = 2;
/// Advisory evaluation period, aligned to epoch seconds.
pub const DEFAULT_ADVISORY_SECS: u64 = 300;
/// Upper bound on a single external probe.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 1000;
/// How often a running probe is polled for completion.
pub const PROBE_POLL_INTERVAL: Duration = Duration::from_millis(10);

// === Notification Thresholds ===

/// Minimum gap between any two notifications.
pub const DEFAULT_DEBOUNCE_SECS: u64 = 30;
/// Long-session reminders fire at multiples of this many hours.
pub const DEFAULT_LONG_SESSION_HOURS: u64 = 8;
/// Minimum gap between two long-session reminders.
pub const DEFAULT_LONG_SESSION_COOLDOWN_SECS: u64 = 3600;
/// Session traffic above which a high-usage advisory fires (1 GiB).
pub const DEFAULT_HIGH_DATA_BYTES: u64 = 1024 * 1024 * 1024;
/// Minimum gap between two high-usage advisories.
pub const DEFAULT_HIGH_DATA_COOLDOWN_SECS: u64 = 3600;
/// Connect attempts tolerated before an instability advisory.
pub const DEFAULT_MAX_CONNECT_ATTEMPTS: u32 = 3;

// === Traffic Estimation ===

/// Bytes uploaded per tick before variation and multipliers.
pub const DEFAULT_BASE_RATE: u64 = 1024;
pub const DEFAULT_MIN_VARIATION: f64 = 0.5;
pub const DEFAULT_MAX_VARIATION: f64 = 2.0;
/// First local hour of the busier window (inclusive).
pub const DEFAULT_BUSINESS_START: u32 = 9;
/// Last local hour of the busier window (inclusive).
pub const DEFAULT_BUSINESS_END: u32 = 18;
pub const DEFAULT_BUSINESS_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_MIN_DOWNLOAD_RATIO: u64 = 2;
pub const DEFAULT_MAX_DOWNLOAD_RATIO: u64 = 5;

// === Corporate Tunnel Markers ===

pub const DEFAULT_CORPORATE_PROCESS: &str = "openconnect";
pub const DEFAULT_CORPORATE_PID_FILE: &str = "/var/run/openconnect-bcs.pid";
pub const DEFAULT_CORPORATE_MARKERS: [&str; 4] =
    ["corporate-vpn", "company-vpn", "10.0.0.0", "192.168.0.0"];
/// Internal address whose route reveals a corporate tunnel.
pub const DEFAULT_CORPORATE_ROUTE_PROBE: &str = "10.0.0.1";

// === Interface Classification ===

/// Interface name prefixes treated as tunnels.
pub const TUNNEL_PREFIXES: [&str; 6] = ["utun", "ppp", "ipsec", "tun", "tap", "wg"];
/// Interfaces asked for their address on macOS, in order.
pub const MACOS_ADDRESS_INTERFACES: [&str; 5] = ["utun0", "utun1", "utun2", "ppp0", "ipsec0"];

// === Path Configuration ===

/// Name of the application config subdirectory.
pub const CONFIG_DIR_NAME: &str = "vpnwatch";
/// Name of the config file.
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// Name of the persisted state file.
pub const STATE_FILE_NAME: &str = "state.json";

// === Preference Defaults ===

pub const DEFAULT_ICON_THEME: &str = "circles";
pub const DEFAULT_DISCONNECT_SOUND: &str = "Basso";
/// Sound name meaning "play nothing".
pub const SOUND_NONE: &str = "None";

// === Notification Texts ===

pub const TITLE_CONNECTED: &str = "VPN Connected";
pub const MSG_CONNECTED: &str = "Secure connection established";
pub const TITLE_DISCONNECTED: &str = "VPN Disconnected";
pub const MSG_DISCONNECTED: &str = "Connection lost";
pub const TITLE_LONG_SESSION: &str = "Long VPN Session";
pub const TITLE_HIGH_DATA: &str = "High Data Usage";
pub const TITLE_CONNECTION_ISSUES: &str = "Connection Issues";
pub const MSG_CONNECTION_ISSUES: &str =
    "Multiple connection attempts detected. Check your VPN settings.";

pub const TITLE_LAUNCHED: &str = "VPN Client Launched";
pub const TITLE_LAUNCH_FAILED: &str = "Launch Failed";
pub const TITLE_CONNECTION: &str = "VPN Connection";
pub const MSG_SYSTEM_DISCONNECTED: &str = "System VPN has been disconnected";

// === CLI Messages ===

pub const MSG_CONNECT_UNSUPPORTED: &str = "Please use your VPN client to connect";
pub const MSG_NO_CLIENTS: &str = "No known VPN clients found";
pub const MSG_NO_DATA: &str = "---";
