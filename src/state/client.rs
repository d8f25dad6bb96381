//! Known VPN client catalogue.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A third-party VPN client the engine knows how to recognise.
///
/// Commands are opaque argv lists; the engine runs them but never interprets
/// the client's own UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpnClient {
    /// Display name, also the key used by `connect`/`disconnect`.
    pub name: String,
    /// Application bundle or binary whose presence means "installed".
    pub app_path: PathBuf,
    /// Lowercase substrings matched against running process command lines.
    #[serde(default)]
    pub process_patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disconnect: Option<Vec<String>>,
}

impl VpnClient {
    fn app(name: &str, bundle: &str, patterns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            app_path: Path::new("/Applications").join(format!("{bundle}.app")),
            process_patterns: patterns.iter().map(|p| (*p).to_string()).collect(),
            launch: None,
            connect: None,
            disconnect: None,
        }
    }

    /// True if any pattern occurs in the (lowercased) process line.
    #[must_use]
    pub fn matches_process(&self, line_lower: &str) -> bool {
        self.process_patterns
            .iter()
            .any(|p| !p.is_empty() && line_lower.contains(&p.to_lowercase()))
    }

    /// Argv that brings the client to the foreground.
    ///
    /// Falls back to `open -a <app>` on macOS when none is configured.
    #[must_use]
    pub fn launch_command(&self) -> Option<Vec<String>> {
        if let Some(cmd) = &self.launch {
            return Some(cmd.clone());
        }
        if cfg!(target_os = "macos") {
            return Some(vec![
                "open".to_string(),
                "-a".to_string(),
                self.app_path.display().to_string(),
            ]);
        }
        None
    }

    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.app_path.exists()
    }
}

/// Clients recognised out of the box.
#[must_use]
pub fn default_catalogue() -> Vec<VpnClient> {
    vec![
        VpnClient::app("V2Box", "V2Box", &["v2box"]),
        VpnClient::app("V2RayU", "V2RayU", &["v2rayu", "v2ray"]),
        VpnClient::app("ClashX", "ClashX", &["clashx", "clash"]),
        VpnClient::app("ClashX Pro", "ClashX Pro", &["clashx pro"]),
        VpnClient::app("Surge", "Surge", &["surge.app"]),
        VpnClient::app("ShadowsocksX-NG", "ShadowsocksX-NG", &["shadowsocksx-ng"]),
        VpnClient::app("ShadowsocksX", "ShadowsocksX", &["shadowsocksx.app"]),
        VpnClient::app("ProtonVPN", "ProtonVPN", &["protonvpn"]),
        VpnClient::app("ExpressVPN", "ExpressVPN", &["expressvpn"]),
        VpnClient::app("NordVPN", "NordVPN", &["nordvpn"]),
        VpnClient::app("Tunnelblick", "Tunnelblick", &["tunnelblick"]),
        VpnClient::app("Viscosity", "Viscosity", &["viscosity"]),
    ]
}
