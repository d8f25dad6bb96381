//! Signal collection.
//!
//! Runs every probe once, degrading any failed or timed-out probe to a
//! neutral value, then assembles the [`SignalSnapshot`] in one step.

use std::fmt::Debug;
use std::net::Ipv4Addr;
use std::path::Path;
use std::rc::Rc;

use super::executor::CommandExecutor;
use super::probes::{self, Invocation, Platform};
use crate::config::{Config, CorporateConfig};
use crate::error::{Error, Result};
use crate::state::{ServiceState, SignalSnapshot, VpnClient};

/// What one probe produced, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub name: &'static str,
    pub command: String,
    /// Parsed value on success, error text on failure.
    pub result: std::result::Result<String, String>,
}

/// Produces one snapshot per tick from OS diagnostic commands.
pub struct SignalCollector {
    executor: Rc<dyn CommandExecutor>,
    platform: Platform,
    clients: Vec<VpnClient>,
    corporate: CorporateConfig,
}

impl SignalCollector {
    #[must_use]
    pub fn new(executor: Rc<dyn CommandExecutor>, platform: Platform, config: &Config) -> Self {
        Self {
            executor,
            platform,
            clients: config.clients.clone(),
            corporate: config.corporate.clone(),
        }
    }

    /// Collects a snapshot. Never fails.
    #[must_use]
    pub fn collect(&self) -> SignalSnapshot {
        self.collect_with_report().0
    }

    /// Collects a snapshot along with the outcome of each probe.
    #[must_use]
    pub fn collect_with_report(&self) -> (SignalSnapshot, Vec<ProbeOutcome>) {
        let mut report = Vec::new();
        let platform = self.platform;

        let system_service_state = self.probe(
            "service",
            &platform.service_state_command(),
            |out| platform.parse_service_state(out),
            ServiceState::Unknown,
            &mut report,
        );

        let process_list = self.probe(
            "processes",
            &platform.process_list_command(),
            |out| Some(out.to_string()),
            None,
            &mut report,
        );
        let known_processes = process_list
            .as_deref()
            .map(|ps| probes::match_known_processes(ps, &self.clients))
            .unwrap_or_default();

        let active_tunnel_interface = self.probe(
            "interfaces",
            &platform.interface_list_command(),
            probes::has_tunnel_interface,
            false,
            &mut report,
        );

        let proxy_enabled = self.probe(
            "proxy",
            &platform.proxy_command(),
            |out| platform.parse_proxy_enabled(out),
            false,
            &mut report,
        );

        let corporate_marker_present =
            self.corporate_marker(process_list.as_deref(), &mut report);

        let snapshot = SignalSnapshot {
            system_service_state,
            known_processes,
            active_tunnel_interface,
            proxy_enabled,
            corporate_marker_present,
        };
        (snapshot, report)
    }

    /// IPv4 address of the first tunnel interface that reports one.
    ///
    /// Display only; it plays no part in status resolution.
    #[must_use]
    pub fn tunnel_address(&self) -> Option<Ipv4Addr> {
        self.platform
            .address_commands()
            .iter()
            .find_map(|invocation| match run_checked(self.executor.as_ref(), invocation) {
                Ok(out) => self.platform.parse_address(&out),
                Err(e) => {
                    log::trace!("No address from {}: {e}", render(invocation));
                    None
                }
            })
    }

    fn corporate_marker(&self, process_list: Option<&str>, report: &mut Vec<ProbeOutcome>) -> bool {
        if self.corporate_pid_alive(report) {
            return true;
        }

        if let Some(ps) = process_list {
            if probes::has_corporate_process(
                ps,
                &self.corporate.process,
                &self.corporate.argument_markers,
            ) {
                log::debug!("Corporate tunnel process found");
                return true;
            }
        }

        if self.corporate.route_probe.is_empty() {
            return false;
        }
        self.probe(
            "corporate-route",
            &self.platform.route_command(&self.corporate.route_probe),
            probes::route_uses_tunnel,
            false,
            report,
        )
    }

    fn corporate_pid_alive(&self, report: &mut Vec<ProbeOutcome>) -> bool {
        let Some(pid) = read_pid_file(&self.corporate.pid_file) else {
            return false;
        };
        let process = self.corporate.process.to_lowercase();
        self.probe(
            "corporate-pid",
            &self.platform.process_name_command(pid),
            |out| !process.is_empty() && out.to_lowercase().contains(&process),
            false,
            report,
        )
    }

    fn probe<T: Debug>(
        &self,
        name: &'static str,
        invocation: &Invocation,
        parse: impl FnOnce(&str) -> T,
        fallback: T,
        report: &mut Vec<ProbeOutcome>,
    ) -> T {
        let command = render(invocation);
        match run_checked(self.executor.as_ref(), invocation) {
            Ok(stdout) => {
                let value = parse(&stdout);
                report.push(ProbeOutcome {
                    name,
                    command,
                    result: Ok(summarize(&value)),
                });
                value
            }
            Err(e) => {
                log::debug!("Probe {name} failed: {e}");
                report.push(ProbeOutcome {
                    name,
                    command,
                    result: Err(e.to_string()),
                });
                fallback
            }
        }
    }
}

/// Runs an invocation and returns stdout, treating a non-zero exit as failure.
///
/// # Errors
///
/// Propagates executor errors and maps a non-zero exit to
/// [`Error::CommandFailed`].
pub fn run_checked(executor: &dyn CommandExecutor, invocation: &Invocation) -> Result<String> {
    let (program, args) = invocation;
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let output = executor.run(program, &args)?;
    if !output.success() {
        return Err(Error::CommandFailed {
            program: (*program).to_string(),
            code: output.exit_code,
        });
    }
    Ok(output.stdout_lossy())
}

pub(crate) fn render(invocation: &Invocation) -> String {
    let (program, args) = invocation;
    std::iter::once(*program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

fn summarize<T: Debug>(value: &T) -> String {
    let text = format!("{value:?}");
    if text.chars().count() > 60 {
        let head: String = text.chars().take(57).collect();
        format!("{head}... ({} bytes)", text.len())
    } else {
        text
    }
}

fn read_pid_file(path: &Path) -> Option<u32> {
    if path.as_os_str().is_empty() {
        return None;
    }
    match std::fs::read_to_string(path) {
        Ok(text) => probes::parse_pid(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            log::debug!("Cannot read pid file {}: {e}", path.display());
            None
        }
    }
}

/// Catalogue clients whose application is present on disk.
#[must_use]
pub fn installed_clients(config: &Config) -> Vec<&VpnClient> {
    config.clients.iter().filter(|c| c.is_installed()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::executor::fake::FakeExecutor;

    fn collector(exec: FakeExecutor, platform: Platform) -> SignalCollector {
        let mut config = Config::default();
        config.corporate.pid_file = std::path::PathBuf::from("/nonexistent/vpnwatch-test.pid");
        SignalCollector::new(Rc::new(exec), platform, &config)
    }

    #[test]
    fn test_all_probes_failing_yields_neutral_snapshot() {
        let (snapshot, report) =
            collector(FakeExecutor::new(), Platform::MacOs).collect_with_report();
        assert_eq!(snapshot, SignalSnapshot::default());
        assert_eq!(snapshot.system_service_state, ServiceState::Unknown);
        assert!(report.iter().all(|o| o.result.is_err()));
    }

    #[test]
    fn test_macos_client_tunnel_snapshot() {
        let exec = FakeExecutor::new()
            .with("scutil --nc list", "* (Disconnected)   ABC VPN \"Work\"")
            .with("ps", "/Applications/ClashX.app/Contents/MacOS/ClashX\n/sbin/launchd\n")
            .with("ifconfig", "lo0: flags=8049<UP>\nutun3: flags=8051<UP,POINTOPOINT>\n")
            .with("scutil --proxy", "<dictionary> {\n  HTTPEnable : 1\n}")
            .with_exit("route", "route: writing to routing socket: not in table", 1);

        let snapshot = collector(exec, Platform::MacOs).collect();
        assert_eq!(snapshot.system_service_state, ServiceState::Disconnected);
        assert!(snapshot.known_processes.contains("ClashX"));
        assert!(snapshot.active_tunnel_interface);
        assert!(snapshot.proxy_enabled);
        assert!(!snapshot.corporate_marker_present);
    }

    #[test]
    fn test_timed_out_probe_does_not_affect_others() {
        let exec = FakeExecutor::new()
            .with_timeout("scutil --nc list")
            .with("ps", "")
            .with("ifconfig", "utun0: flags=8051<UP>\n")
            .with_missing("scutil --proxy")
            .with("route", "  interface: en0\n");

        let snapshot = collector(exec, Platform::MacOs).collect();
        assert_eq!(snapshot.system_service_state, ServiceState::Unknown);
        assert!(snapshot.active_tunnel_interface);
        assert!(!snapshot.proxy_enabled);
        assert!(!snapshot.corporate_marker_present);
    }

    #[test]
    fn test_corporate_marker_from_process_arguments() {
        let exec = FakeExecutor::new()
            .with("ps", "/usr/local/bin/openconnect --protocol=gp company-vpn.example.com\n");
        let snapshot = collector(exec, Platform::MacOs).collect();
        assert!(snapshot.corporate_marker_present);
    }

    #[test]
    fn test_corporate_marker_from_route_linux() {
        let exec = FakeExecutor::new()
            .with("nmcli", "802-3-ethernet:activated\n")
            .with("ps", "")
            .with("ip -o link show", "1: lo: <LOOPBACK>\n5: tun0: <POINTOPOINT>\n")
            .with("gsettings", "'none'\n")
            .with("ip route get 10.0.0.1", "10.0.0.1 dev tun0 src 10.8.0.2 uid 1000\n");

        let snapshot = collector(exec, Platform::Linux).collect();
        assert_eq!(snapshot.system_service_state, ServiceState::Disconnected);
        assert!(snapshot.active_tunnel_interface);
        assert!(!snapshot.proxy_enabled);
        assert!(snapshot.corporate_marker_present);
    }

    #[test]
    fn test_corporate_marker_from_pid_file() {
        let pid_file =
            std::env::temp_dir().join(format!("vpnwatch-pid-{}.pid", std::process::id()));
        std::fs::write(&pid_file, "4242\n").unwrap();

        let mut config = Config::default();
        config.corporate.pid_file = pid_file.clone();
        let exec = FakeExecutor::new().with("ps -p 4242 -o comm=", "/usr/local/bin/openconnect\n");
        let collector = SignalCollector::new(Rc::new(exec), Platform::MacOs, &config);

        assert!(collector.collect().corporate_marker_present);
        let _ = std::fs::remove_file(pid_file);
    }

    #[test]
    fn test_tunnel_address_tries_interfaces_in_order() {
        let exec = FakeExecutor::new()
            .with_exit("ipconfig getifaddr utun0", "", 1)
            .with("ipconfig getifaddr utun1", "10.8.0.6\n")
            .with("ipconfig getifaddr utun2", "10.9.0.1\n");
        let exec = Rc::new(exec);
        let config = Config::default();
        let collector = SignalCollector::new(exec.clone(), Platform::MacOs, &config);

        assert_eq!(collector.tunnel_address(), Some(Ipv4Addr::new(10, 8, 0, 6)));
        assert!(!exec.called("ipconfig getifaddr utun2"));
    }

    #[test]
    fn test_tunnel_address_linux_and_absent() {
        let out = "2: eth0    inet 192.168.1.4/24 scope global eth0
6: tun0    inet 10.4.0.9/32 scope global tun0
";
        let exec = FakeExecutor::new().with("ip -o -4 addr show", out);
        assert_eq!(
            collector(exec, Platform::Linux).tunnel_address(),
            Some(Ipv4Addr::new(10, 4, 0, 9))
        );
        assert_eq!(collector(FakeExecutor::new(), Platform::MacOs).tunnel_address(), None);
    }

    #[test]
    fn test_summarize_truncates_on_char_boundary() {
        let long = "é".repeat(80);
        let text = summarize(&long);
        assert!(text.contains("..."));
    }
}
