//! Status icon themes and display formatting.
//!
//! Presentation only: nothing here feeds back into status decisions.

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};

use crate::constants;
use crate::core::store::{CustomIcons, Preferences};
use crate::state::{ConnectionSession, UsageCounters, VpnStatus};

/// One glyph per status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IconTheme {
    pub name: &'static str,
    pub connected: &'static str,
    pub connecting: &'static str,
    pub disconnected: &'static str,
}

const fn theme(
    name: &'static str,
    connected: &'static str,
    connecting: &'static str,
    disconnected: &'static str,
) -> IconTheme {
    IconTheme {
        name,
        connected,
        connecting,
        disconnected,
    }
}

// === Built-in Themes ===

pub static THEMES: [IconTheme; 10] = [
    theme("circles", "🟢", "🟡", "🔴"),
    theme("locks", "🔒", "⏳", "🔓"),
    theme("shields", "🛡️", "⏳", "❌"),
    theme("power", "⚡", "⏳", "💤"),
    theme("wifi", "📶", "⏳", "❌"),
    theme("checkmarks", "✅", "⏳", "❌"),
    theme("hearts", "💚", "💛", "💔"),
    theme("stars", "⭐", "⏳", "❌"),
    theme("gray", "⚫", "⚪", "🔘"),
    theme("minimal", "●", "○", "○"),
];

/// Disconnect sounds offered to the user. `None` disables the sound.
pub const SOUNDS: [&str; 6] = ["Basso", "Funk", "Ping", "Purr", "Tink", constants::SOUND_NONE];

impl IconTheme {
    /// Looks a theme up by name, ignoring case.
    #[must_use]
    pub fn find(name: &str) -> Option<&'static IconTheme> {
        THEMES.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Named theme, or the default one if the name is unknown.
    #[must_use]
    pub fn named(name: &str) -> &'static IconTheme {
        Self::find(name).unwrap_or(&THEMES[0])
    }

    #[must_use]
    pub fn icon(&self, status: VpnStatus) -> &'static str {
        match status {
            VpnStatus::Connected => self.connected,
            VpnStatus::Connecting => self.connecting,
            VpnStatus::Disconnected => self.disconnected,
        }
    }
}

/// Icon for `status`, custom icons first.
#[must_use]
pub fn status_icon(prefs: &Preferences, status: VpnStatus) -> String {
    let custom = custom_icon(&prefs.custom_icons, status);
    custom.map_or_else(
        || IconTheme::named(&prefs.icon_theme).icon(status).to_string(),
        str::to_string,
    )
}

fn custom_icon(icons: &CustomIcons, status: VpnStatus) -> Option<&str> {
    match status {
        VpnStatus::Connected => icons.connected.as_deref(),
        VpnStatus::Connecting => icons.connecting.as_deref(),
        VpnStatus::Disconnected => icons.disconnected.as_deref(),
    }
}

/// Decimal megabytes below 1 GB, gigabytes above.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const MB: f64 = 1_000_000.0;
    const GB: f64 = 1_000_000_000.0;
    let value = bytes as f64;
    if value < GB {
        format!("{:.1} MB", value / MB)
    } else {
        format!("{:.2} GB", value / GB)
    }
}

/// `Xh Ym`.
#[must_use]
pub fn format_duration(secs: u64) -> String {
    format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
}

/// One-line summary: icon, status and, while connected, tunnel address,
/// duration and usage.
#[must_use]
pub fn status_line(
    prefs: &Preferences,
    status: VpnStatus,
    session: &ConnectionSession,
    usage: (&UsageCounters, bool),
    address: Option<Ipv4Addr>,
    now: DateTime<Utc>,
) -> String {
    let icon = status_icon(prefs, status);
    if !status.is_connected() {
        return format!("{icon} VPN {status}");
    }

    let duration = session
        .elapsed_secs(now)
        .map_or_else(|| constants::MSG_NO_DATA.to_string(), format_duration);
    let (counters, estimated) = usage;
    let tag = if estimated { " (estimated)" } else { "" };
    let address = address.map(|ip| format!("{ip} | ")).unwrap_or_default();
    format!(
        "{icon} VPN {status} | {address}{duration} | ↑ {} ↓ {}{tag}",
        format_bytes(counters.uploaded),
        format_bytes(counters.downloaded),
    )
}
