//! VPN connection state types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single externally observable connectivity fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VpnStatus {
    /// No tunnel detected.
    #[default]
    Disconnected,
    /// The system VPN service reports a connection in progress.
    Connecting,
    /// A tunnel is up.
    Connected,
}

impl VpnStatus {
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for VpnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VpnStatus::Disconnected => write!(f, "Disconnected"),
            VpnStatus::Connecting => write!(f, "Connecting"),
            VpnStatus::Connected => write!(f, "Connected"),
        }
    }
}

/// Bookkeeping for the current connection.
///
/// Owned by the engine state and only mutated by the tick pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSession {
    /// When the current connection was first observed.
    pub start_time: Option<DateTime<Utc>>,
    /// Connect attempts initiated through the engine since the last
    /// instability advisory.
    pub attempt_count: u32,
}

impl ConnectionSession {
    /// Opens a session starting at `now`.
    pub fn open(&mut self, now: DateTime<Utc>) {
        self.start_time = Some(now);
    }

    /// Clears the start time. Attempts survive so flapping connections
    /// still count towards the instability advisory.
    pub fn close(&mut self) {
        self.start_time = None;
    }

    /// Whole seconds connected at `now`, if a session is open.
    #[must_use]
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> Option<u64> {
        self.start_time
            .map(|start| u64::try_from((now - start).num_seconds()).unwrap_or(0))
    }
}

/// Bytes moved through the tunnel during the current session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    pub uploaded: u64,
    pub downloaded: u64,
}

impl UsageCounters {
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.uploaded.saturating_add(self.downloaded)
    }

    /// Adds a delta without wrapping.
    pub fn add(&mut self, delta: UsageCounters) {
        self.uploaded = self.uploaded.saturating_add(delta.uploaded);
        self.downloaded = self.downloaded.saturating_add(delta.downloaded);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
