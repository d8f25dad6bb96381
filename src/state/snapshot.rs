//! Raw signal snapshot collected once per tick.

use std::collections::BTreeSet;

/// State of the OS's own VPN service registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceState {
    Connected,
    Connecting,
    Disconnected,
    /// The registry could not be queried.
    #[default]
    Unknown,
}

/// One atomic collection of all raw signals.
///
/// Built in a single expression by the collector after every probe has
/// returned; nothing updates it afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalSnapshot {
    pub system_service_state: ServiceState,
    /// Catalogue client names whose process is running.
    pub known_processes: BTreeSet<String>,
    /// A utun/ppp/ipsec-class interface exists.
    pub active_tunnel_interface: bool,
    /// A system SOCKS/HTTP proxy is enabled.
    pub proxy_enabled: bool,
    /// A corporate tunnel process argument, pid file or route was found.
    pub corporate_marker_present: bool,
}
