//! Signal fusion.
//!
//! The OS-reported service state is authoritative when it says connected or
//! connecting. Heuristics only fill the gap for clients that bypass the
//! system VPN registry. Anything ambiguous falls through to `Disconnected`:
//! a missed tunnel is preferred over a false "secure" indication.

use crate::state::{ServiceState, SignalSnapshot, VpnStatus};

/// One predicate → status row of the priority table.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub matches: fn(&SignalSnapshot) -> bool,
    pub status: VpnStatus,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Priority order, first match wins.
pub const DEFAULT_RULES: [Rule; 4] = [
    Rule {
        name: "system-connected",
        matches: |s| s.system_service_state == ServiceState::Connected,
        status: VpnStatus::Connected,
    },
    Rule {
        name: "system-connecting",
        matches: |s| s.system_service_state == ServiceState::Connecting,
        status: VpnStatus::Connecting,
    },
    Rule {
        name: "client-tunnel",
        matches: |s| !s.known_processes.is_empty() && s.active_tunnel_interface,
        status: VpnStatus::Connected,
    },
    Rule {
        name: "corporate-marker",
        matches: |s| s.corporate_marker_present,
        status: VpnStatus::Connected,
    },
];

/// Evaluates a rule table top-down.
#[derive(Debug, Clone)]
pub struct StatusResolver {
    rules: Vec<Rule>,
}

impl Default for StatusResolver {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.to_vec())
    }
}

impl StatusResolver {
    #[must_use]
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Status for `snapshot`; `Disconnected` when no rule matches.
    #[must_use]
    pub fn resolve(&self, snapshot: &SignalSnapshot) -> VpnStatus {
        self.matching_rule(snapshot)
            .map_or(VpnStatus::Disconnected, |rule| rule.status)
    }

    /// The rule that decided `snapshot`, if any.
    #[must_use]
    pub fn matching_rule(&self, snapshot: &SignalSnapshot) -> Option<&Rule> {
        self.rules.iter().find(|rule| (rule.matches)(snapshot))
    }
}

/// Resolves with the default table.
#[must_use]
pub fn resolve(snapshot: &SignalSnapshot) -> VpnStatus {
    StatusResolver::default().resolve(snapshot)
}
