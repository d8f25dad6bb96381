//! Platform probe commands and the pure parsers for their output.
//!
//! Parsers for every platform are compiled everywhere so they can be tested
//! on any host; [`Platform::current`] only picks which commands to run.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use crate::constants;
use crate::state::{ServiceState, UsageCounters, VpnClient};

/// Which family of diagnostic tools to shell out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
}

/// A command line: program plus arguments.
pub type Invocation = (&'static str, Vec<String>);

fn inv(program: &'static str, args: &[&str]) -> Invocation {
    (program, args.iter().map(|a| (*a).to_string()).collect())
}

impl Platform {
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_os = "linux") {
            Self::Linux
        } else {
            Self::MacOs
        }
    }

    #[must_use]
    pub fn service_state_command(self) -> Invocation {
        match self {
            Self::MacOs => inv("scutil", &["--nc", "list"]),
            Self::Linux => inv(
                "nmcli",
                &["-t", "-f", "TYPE,STATE", "connection", "show", "--active"],
            ),
        }
    }

    #[must_use]
    pub fn process_list_command(self) -> Invocation {
        inv("ps", &["-eo", "args="])
    }

    #[must_use]
    pub fn process_name_command(self, pid: u32) -> Invocation {
        ("ps", vec!["-p".to_string(), pid.to_string(), "-o".to_string(), "comm=".to_string()])
    }

    #[must_use]
    pub fn interface_list_command(self) -> Invocation {
        match self {
            Self::MacOs => inv("ifconfig", &[]),
            Self::Linux => inv("ip", &["-o", "link", "show"]),
        }
    }

    #[must_use]
    pub fn proxy_command(self) -> Invocation {
        match self {
            Self::MacOs => inv("scutil", &["--proxy"]),
            Self::Linux => inv("gsettings", &["get", "org.gnome.system.proxy", "mode"]),
        }
    }

    #[must_use]
    pub fn route_command(self, target: &str) -> Invocation {
        match self {
            Self::MacOs => ("route", vec!["-n".into(), "get".into(), target.to_string()]),
            Self::Linux => ("ip", vec!["route".into(), "get".into(), target.to_string()]),
        }
    }

    #[must_use]
    pub fn interface_stats_command(self) -> Invocation {
        match self {
            Self::MacOs => inv("netstat", &["-ib"]),
            Self::Linux => inv("cat", &["/proc/net/dev"]),
        }
    }

    /// Commands that report the tunnel's IPv4 address, tried in order.
    #[must_use]
    pub fn address_commands(self) -> Vec<Invocation> {
        match self {
            Self::MacOs => constants::MACOS_ADDRESS_INTERFACES
                .iter()
                .map(|iface| inv("ipconfig", &["getifaddr", iface]))
                .collect(),
            Self::Linux => vec![inv("ip", &["-o", "-4", "addr", "show"])],
        }
    }

    /// Command that stops a system-managed VPN service by name.
    #[must_use]
    pub fn stop_service_command(self, name: &str) -> Invocation {
        match self {
            Self::MacOs => ("scutil", vec!["--nc".into(), "stop".into(), name.to_string()]),
            Self::Linux => ("nmcli", vec!["connection".into(), "down".into(), name.to_string()]),
        }
    }

    #[must_use]
    pub fn parse_service_state(self, output: &str) -> ServiceState {
        match self {
            Self::MacOs => parse_scutil_nc_list(output),
            Self::Linux => parse_nmcli_active(output),
        }
    }

    #[must_use]
    pub fn parse_proxy_enabled(self, output: &str) -> bool {
        match self {
            Self::MacOs => parse_scutil_proxy(output),
            Self::Linux => parse_gsettings_proxy_mode(output),
        }
    }

    #[must_use]
    pub fn parse_address(self, output: &str) -> Option<Ipv4Addr> {
        match self {
            Self::MacOs => parse_getifaddr(output),
            Self::Linux => parse_ip_addr_show(output),
        }
    }

    #[must_use]
    pub fn parse_interface_stats(self, output: &str) -> Option<UsageCounters> {
        match self {
            Self::MacOs => parse_netstat_ib(output),
            Self::Linux => parse_proc_net_dev(output),
        }
    }
}

/// True for utun/ppp/ipsec-class interface names.
///
/// The prefix must be followed by a unit number or separator, so `tun0` and
/// `wg-home` match but Linux's `tunl0` IPIP device does not.
#[must_use]
pub fn is_tunnel_interface(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    constants::TUNNEL_PREFIXES.iter().any(|prefix| {
        name.strip_prefix(prefix)
            .is_some_and(|rest| !rest.starts_with(|c: char| c.is_ascii_alphabetic()))
    })
}

/// `scutil --nc list`: a service marked `*` is enabled; its state follows.
#[must_use]
pub fn parse_scutil_nc_list(output: &str) -> ServiceState {
    if output.contains("* (Connected)") {
        ServiceState::Connected
    } else if output.contains("* (Connecting)") {
        ServiceState::Connecting
    } else {
        ServiceState::Disconnected
    }
}

/// `nmcli -t -f TYPE,STATE connection show --active`, e.g. `vpn:activated`.
#[must_use]
pub fn parse_nmcli_active(output: &str) -> ServiceState {
    let mut state = ServiceState::Disconnected;
    for line in output.lines() {
        let Some((kind, conn_state)) = line.trim().split_once(':') else {
            continue;
        };
        if !matches!(kind, "vpn" | "wireguard") {
            continue;
        }
        match conn_state {
            "activated" => return ServiceState::Connected,
            "activating" => state = ServiceState::Connecting,
            _ => {}
        }
    }
    state
}

/// Catalogue names whose patterns occur in any process command line.
#[must_use]
pub fn match_known_processes(output: &str, clients: &[VpnClient]) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    for line in output.lines() {
        let lower = line.to_lowercase();
        for client in clients {
            if client.matches_process(&lower) {
                found.insert(client.name.clone());
            }
        }
    }
    found
}

/// A single process line naming `process` together with one of `markers`.
#[must_use]
pub fn has_corporate_process(output: &str, process: &str, markers: &[String]) -> bool {
    let process = process.to_lowercase();
    if process.is_empty() {
        return false;
    }
    output.lines().any(|line| {
        let lower = line.to_lowercase();
        lower.contains(&process)
            && markers
                .iter()
                .any(|m| !m.is_empty() && lower.contains(&m.to_lowercase()))
    })
}

/// Interface names from `ifconfig` (`utun0: flags=...`) or `ip -o link show`
/// (`3: wg0: <...>`).
#[must_use]
pub fn parse_interface_names(output: &str) -> Vec<String> {
    let mut names = Vec::new();
    for line in output.lines() {
        if line.starts_with(char::is_whitespace) || line.is_empty() {
            continue;
        }
        let mut parts = line.split(':');
        let Some(first) = parts.next() else { continue };
        let name = if first.trim().chars().all(|c| c.is_ascii_digit()) {
            match parts.next() {
                Some(second) => second.trim(),
                None => continue,
            }
        } else {
            first.trim()
        };
        // `ip` appends `@parent` for stacked links.
        let name = name.split('@').next().unwrap_or(name);
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

#[must_use]
pub fn has_tunnel_interface(output: &str) -> bool {
    parse_interface_names(output)
        .iter()
        .any(|n| is_tunnel_interface(n))
}

/// `scutil --proxy`: any of the HTTP/HTTPS/SOCKS `...Enable : 1` keys.
#[must_use]
pub fn parse_scutil_proxy(output: &str) -> bool {
    output.lines().any(|line| {
        let Some((key, value)) = line.split_once(':') else {
            return false;
        };
        matches!(key.trim(), "HTTPEnable" | "HTTPSEnable" | "SOCKSEnable") && value.trim() == "1"
    })
}

/// `gsettings get org.gnome.system.proxy mode` prints `'none'`, `'manual'`
/// or `'auto'`.
#[must_use]
pub fn parse_gsettings_proxy_mode(output: &str) -> bool {
    matches!(output.trim().trim_matches('\''), "manual" | "auto")
}

/// Outgoing interface from `route -n get` (`interface: utun3`) or
/// `ip route get` (`10.0.0.1 dev tun0 src ...`).
#[must_use]
pub fn parse_route_interface(output: &str) -> Option<String> {
    for line in output.lines() {
        let trimmed = line.trim();
        if let Some(value) = trimmed.strip_prefix("interface:") {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
        let mut tokens = trimmed.split_whitespace();
        while let Some(token) = tokens.next() {
            if token == "dev" {
                if let Some(dev) = tokens.next() {
                    return Some(dev.to_string());
                }
            }
        }
    }
    None
}

#[must_use]
pub fn route_uses_tunnel(output: &str) -> bool {
    parse_route_interface(output).is_some_and(|iface| is_tunnel_interface(&iface))
}

/// `ipconfig getifaddr utun0` prints a bare address, or nothing.
#[must_use]
pub fn parse_getifaddr(output: &str) -> Option<Ipv4Addr> {
    output.trim().parse().ok()
}

/// First tunnel address in `ip -o -4 addr show`, e.g.
/// `5: wg0    inet 10.8.0.2/24 scope global wg0`.
#[must_use]
pub fn parse_ip_addr_show(output: &str) -> Option<Ipv4Addr> {
    output.lines().find_map(|line| {
        let mut tokens = line.split_whitespace();
        let _index = tokens.next()?;
        let iface = tokens.next()?;
        if !is_tunnel_interface(iface) || tokens.next()? != "inet" {
            return None;
        }
        let cidr = tokens.next()?;
        cidr.split('/').next()?.parse().ok()
    })
}

/// Pid file contents.
#[must_use]
pub fn parse_pid(text: &str) -> Option<u32> {
    text.trim().parse().ok().filter(|pid| *pid > 0)
}

/// Sums tunnel interface byte counters from macOS `netstat -ib`.
///
/// Columns: Name Mtu Network Address Ipkts Ierrs Ibytes Opkts Oerrs Obytes
/// Coll. The Address column is blank for point-to-point links, so byte
/// columns are read from the right. Only `<Link#n>` rows are counted since
/// each address of an interface repeats the same totals.
#[must_use]
pub fn parse_netstat_ib(output: &str) -> Option<UsageCounters> {
    let mut totals = UsageCounters::default();
    let mut seen = false;

    for line in output.lines().skip(1) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 9 || !is_tunnel_interface(parts[0]) {
            continue;
        }
        if !parts[2].starts_with("<Link#") {
            continue;
        }
        let n = parts.len();
        if let (Ok(ibytes), Ok(obytes)) = (parts[n - 5].parse::<u64>(), parts[n - 2].parse::<u64>())
        {
            totals.add(UsageCounters {
                uploaded: obytes,
                downloaded: ibytes,
            });
            seen = true;
        }
    }

    seen.then_some(totals)
}

/// Sums tunnel interface byte counters from Linux `/proc/net/dev`.
#[must_use]
pub fn parse_proc_net_dev(output: &str) -> Option<UsageCounters> {
    let mut totals = UsageCounters::default();
    let mut seen = false;

    for line in output.lines() {
        let Some((name, rest)) = line.split_once(':') else {
            continue;
        };
        if !is_tunnel_interface(name.trim()) {
            continue;
        }
        let fields: Vec<&str> = rest.split_whitespace().collect();
        if fields.len() < 9 {
            continue;
        }
        if let (Ok(rx), Ok(tx)) = (fields[0].parse::<u64>(), fields[8].parse::<u64>()) {
            totals.add(UsageCounters {
                uploaded: tx,
                downloaded: rx,
            });
            seen = true;
        }
    }

    seen.then_some(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::default_catalogue;

    const SCUTIL_NC_CONNECTED: &str = "Available network connection services in the current set (*=enabled):
* (Connected)      5E0C8A53-0D2B-4B5E-9F4A-1D7B5B7F6E2A PPP --> L2TP       \"Office\"                       [PPP/L2TP]
* (Disconnected)   0B2E2C5F-7C1E-4C44-A0E2-2A1E3C2B4D11 VPN (com.v2box)     \"V2BOX\"                        [VPN/V2Box]
";

    #[test]
    fn test_scutil_nc_states() {
        assert_eq!(
            parse_scutil_nc_list(SCUTIL_NC_CONNECTED),
            ServiceState::Connected
        );
        assert_eq!(
            parse_scutil_nc_list("* (Connecting)   ABC VPN \"Work\""),
            ServiceState::Connecting
        );
        assert_eq!(
            parse_scutil_nc_list("* (Disconnected)   ABC VPN \"Work\""),
            ServiceState::Disconnected
        );
    }

    #[test]
    fn test_nmcli_states() {
        assert_eq!(
            parse_nmcli_active("802-11-wireless:activated\nvpn:activated\n"),
            ServiceState::Connected
        );
        assert_eq!(
            parse_nmcli_active("wireguard:activating\n"),
            ServiceState::Connecting
        );
        assert_eq!(
            parse_nmcli_active("802-3-ethernet:activated\n"),
            ServiceState::Disconnected
        );
        // Connected wins regardless of line order.
        assert_eq!(
            parse_nmcli_active("vpn:activating\nwireguard:activated\n"),
            ServiceState::Connected
        );
    }

    #[test]
    fn test_match_known_processes() {
        let ps = "/sbin/launchd
/Applications/ClashX.app/Contents/MacOS/ClashX
/usr/libexec/trustd
/Applications/Tunnelblick.app/Contents/Resources/openvpn --config x
";
        let found = match_known_processes(ps, &default_catalogue());
        assert!(found.contains("ClashX"));
        assert!(found.contains("Tunnelblick"));
        assert!(!found.contains("NordVPN"));
    }

    #[test]
    fn test_corporate_process_needs_marker_on_same_line() {
        let markers = vec!["corporate-vpn".to_string(), "10.0.0.0".to_string()];
        assert!(has_corporate_process(
            "root 1 /usr/local/bin/openconnect --user bob corporate-vpn.example.com",
            "openconnect",
            &markers
        ));
        assert!(!has_corporate_process(
            "/usr/local/bin/openconnect vpn.example.com\n/bin/echo corporate-vpn",
            "openconnect",
            &markers
        ));
        assert!(!has_corporate_process("anything", "", &markers));
    }

    #[test]
    fn test_parse_ifconfig_names() {
        let ifconfig = "lo0: flags=8049<UP,LOOPBACK,RUNNING,MULTICAST> mtu 16384
\tinet 127.0.0.1 netmask 0xff000000
en0: flags=8863<UP,BROADCAST,SMART,RUNNING,SIMPLEX,MULTICAST> mtu 1500
utun2: flags=8051<UP,POINTOPOINT,RUNNING,MULTICAST> mtu 1380
";
        assert_eq!(parse_interface_names(ifconfig), vec!["lo0", "en0", "utun2"]);
        assert!(has_tunnel_interface(ifconfig));
    }

    #[test]
    fn test_parse_ip_link_names() {
        let ip = "1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536 qdisc noqueue state UNKNOWN
2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc fq_codel state UP
3: veth1@if2: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500
";
        assert_eq!(parse_interface_names(ip), vec!["lo", "eth0", "veth1"]);
        assert!(!has_tunnel_interface(ip));
        assert!(has_tunnel_interface("4: wg0: <POINTOPOINT,NOARP,UP,LOWER_UP> mtu 1420"));
    }

    #[test]
    fn test_tunnel_names_need_unit_or_separator() {
        assert!(is_tunnel_interface("tun0"));
        assert!(is_tunnel_interface("utun12"));
        assert!(is_tunnel_interface("wg-home"));
        assert!(is_tunnel_interface("PPP0"));
        assert!(!is_tunnel_interface("tunl0"));
        assert!(!is_tunnel_interface("eth0"));

        let ip = "1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536
2: tunl0@NONE: <NOARP> mtu 1480 qdisc noop state DOWN
3: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500
";
        assert_eq!(parse_interface_names(ip), vec!["lo", "tunl0", "eth0"]);
        assert!(!has_tunnel_interface(ip));
    }

    #[test]
    fn test_getifaddr() {
        assert_eq!(parse_getifaddr("10.8.0.6\n"), Some(Ipv4Addr::new(10, 8, 0, 6)));
        assert_eq!(parse_getifaddr(""), None);
        assert_eq!(parse_getifaddr("not an address"), None);
    }

    #[test]
    fn test_ip_addr_show_picks_tunnel() {
        let out = "1: lo    inet 127.0.0.1/8 scope host lo\\       valid_lft forever
2: eth0    inet 192.168.1.20/24 brd 192.168.1.255 scope global eth0\\       valid_lft 86000sec
5: wg0    inet 10.8.0.2/24 scope global wg0\\       valid_lft forever preferred_lft forever
";
        assert_eq!(parse_ip_addr_show(out), Some(Ipv4Addr::new(10, 8, 0, 2)));
        assert_eq!(
            Platform::Linux.parse_address("2: eth0    inet 192.168.1.20/24 scope global eth0"),
            None
        );
        assert_eq!(
            Platform::MacOs.parse_address("172.16.4.9\n"),
            Some(Ipv4Addr::new(172, 16, 4, 9))
        );
    }

    #[test]
    fn test_address_commands() {
        let mac = Platform::MacOs.address_commands();
        assert_eq!(mac.len(), 5);
        assert_eq!(mac[0], ("ipconfig", vec!["getifaddr".to_string(), "utun0".to_string()]));
        assert_eq!(Platform::Linux.address_commands().len(), 1);
    }

    #[test]
    fn test_scutil_proxy() {
        let on = "<dictionary> {\n  HTTPEnable : 0\n  SOCKSEnable : 1\n  SOCKSPort : 7890\n}";
        let off = "<dictionary> {\n  HTTPEnable : 0\n  ExceptionsList : <array> {\n  }\n}";
        assert!(parse_scutil_proxy(on));
        assert!(!parse_scutil_proxy(off));
    }

    #[test]
    fn test_gsettings_proxy_mode() {
        assert!(parse_gsettings_proxy_mode("'manual'\n"));
        assert!(parse_gsettings_proxy_mode("'auto'"));
        assert!(!parse_gsettings_proxy_mode("'none'\n"));
    }

    #[test]
    fn test_route_interface() {
        let mac = "   route to: 10.0.0.1
destination: 10.0.0.0
       mask: 255.0.0.0
  interface: utun4
      flags: <UP,DONE,CLONING,STATIC>
";
        assert_eq!(parse_route_interface(mac).as_deref(), Some("utun4"));
        assert!(route_uses_tunnel(mac));

        let linux = "10.0.0.1 via 192.168.1.1 dev wlan0 src 192.168.1.20 uid 1000\n    cache";
        assert_eq!(parse_route_interface(linux).as_deref(), Some("wlan0"));
        assert!(!route_uses_tunnel(linux));
        assert!(route_uses_tunnel("10.0.0.1 dev tun0 src 10.8.0.2 uid 0"));
    }

    #[test]
    fn test_parse_pid() {
        assert_eq!(parse_pid("4242\n"), Some(4242));
        assert_eq!(parse_pid("0"), None);
        assert_eq!(parse_pid("garbage"), None);
    }

    #[test]
    fn test_netstat_ib_sums_link_rows_only() {
        let netstat = "Name       Mtu   Network       Address            Ipkts Ierrs     Ibytes    Opkts Oerrs     Obytes  Coll
lo0        16384 <Link#1>                        123456     0   98765432   123456     0   98765432     0
en0        1500  <Link#6>    a4:83:e7:00:00:01  5678901     0 6543210987  2345678     0  345678901     0
utun3      1380  <Link#17>                          120     0      12000      130     0      15000     0
utun3      1380  fe80::abcd:e fe80:11::abcd:ef        120     -      12000      130     -      15000     -
ppp0       1280  <Link#20>                           10     0       1000       20     0       2000     0
";
        let totals = parse_netstat_ib(netstat).unwrap();
        assert_eq!(totals.downloaded, 13000);
        assert_eq!(totals.uploaded, 17000);
    }

    #[test]
    fn test_netstat_ib_without_tunnels() {
        let netstat = "Name  Mtu   Network  Address  Ipkts Ierrs Ibytes Opkts Oerrs Obytes Coll
en0   1500  <Link#6> a4:83:e7:00:00:01 1 0 100 1 0 100 0
";
        assert_eq!(parse_netstat_ib(netstat), None);
    }

    #[test]
    fn test_proc_net_dev() {
        let dev = "Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:  1000      10    0    0    0     0          0         0     1000      10    0    0    0     0       0          0
   wg0:  5000      40    0    0    0     0          0         0     7000      50    0    0    0     0       0          0
";
        let totals = parse_proc_net_dev(dev).unwrap();
        assert_eq!(totals.downloaded, 5000);
        assert_eq!(totals.uploaded, 7000);
        assert_eq!(parse_proc_net_dev("    lo: 1 1 0 0 0 0 0 0 1 1 0 0 0 0 0 0"), None);
    }
}
