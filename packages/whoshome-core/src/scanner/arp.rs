//! Neighbour (ARP) table reading using system commands

use super::run_command;
use crate::error::ScanError;
use std::net::Ipv4Addr;

/// Kernel view of a neighbour entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborState {
    Reachable,
    Delay,
    Probe,
    Stale,
    Permanent,
    /// The platform does not report entry states
    Unknown,
}

impl NeighborState {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "REACHABLE" => Some(NeighborState::Reachable),
            "DELAY" => Some(NeighborState::Delay),
            "PROBE" => Some(NeighborState::Probe),
            "STALE" => Some(NeighborState::Stale),
            "PERMANENT" => Some(NeighborState::Permanent),
            _ => None,
        }
    }

    /// Whether the kernel has a fresh reply from this neighbour.
    pub fn is_confirmed(self) -> bool {
        self == NeighborState::Reachable
    }

    /// Whether the kernel is still waiting for this neighbour to answer.
    pub fn is_pending(self) -> bool {
        matches!(self, NeighborState::Delay | NeighborState::Probe)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborEntry {
    pub ip: Ipv4Addr,
    /// Lowercase colon-hex, two digits per octet
    pub mac: String,
    pub state: NeighborState,
}

/// Read the neighbour table, optionally restricted to one interface.
pub async fn read_neighbor_table(interface: Option<&str>) -> Result<Vec<NeighborEntry>, ScanError> {
    #[cfg(target_os = "linux")]
    {
        let mut args = vec!["neigh", "show"];
        if let Some(name) = interface {
            args.extend(["dev", name]);
        }
        let output = run_command("ip", &args).await?;
        Ok(parse_ip_neigh(&String::from_utf8_lossy(&output.stdout)))
    }

    #[cfg(target_os = "macos")]
    {
        let mut args = vec!["-a", "-n"];
        if let Some(name) = interface {
            args.extend(["-i", name]);
        }
        let output = run_command("arp", &args).await?;
        Ok(parse_arp_an(&String::from_utf8_lossy(&output.stdout)))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        let _ = interface;
        Err(ScanError::UnsupportedPlatform)
    }
}

/// Parse `ip neigh show` output.
///
/// Lines look like `192.168.1.7 dev wlan0 lladdr aa:bb:cc:dd:ee:ff REACHABLE`
/// (the `dev` pair is absent when filtered by device). IPv6 entries and
/// entries without a link-layer address are skipped.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn parse_ip_neigh(output: &str) -> Vec<NeighborEntry> {
    let mut entries = Vec::new();

    for line in output.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(ip) = parts.first().and_then(|s| s.parse::<Ipv4Addr>().ok()) else {
            continue;
        };
        let Some(mac) = parts
            .iter()
            .position(|&p| p == "lladdr")
            .and_then(|i| parts.get(i + 1))
            .and_then(|m| canonical_mac(m))
        else {
            continue;
        };
        let Some(state) = parts.last().and_then(|s| NeighborState::from_token(s)) else {
            continue;
        };

        entries.push(NeighborEntry { ip, mac, state });
    }

    entries
}

/// Parse BSD `arp -a -n` output.
///
/// Lines look like `? (192.168.1.1) at 0:1a:2b:3:4:5 on en0 ifscope [ethernet]`.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub(crate) fn parse_arp_an(output: &str) -> Vec<NeighborEntry> {
    let mut entries = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        let (Some(ip_start), Some(ip_end)) = (line.find('('), line.find(')')) else {
            continue;
        };
        if ip_end <= ip_start {
            continue;
        }
        let Ok(ip) = line[ip_start + 1..ip_end].parse::<Ipv4Addr>() else {
            continue;
        };
        let Some(at_pos) = line.find(" at ") else {
            continue;
        };
        let Some(mac) = line[at_pos + 4..]
            .split_whitespace()
            .next()
            .and_then(canonical_mac)
        else {
            continue;
        };

        entries.push(NeighborEntry {
            ip,
            mac,
            state: NeighborState::Unknown,
        });
    }

    entries
}

/// Pad octets to two digits and lowercase. Rejects incomplete, zero and
/// broadcast addresses.
fn canonical_mac(raw: &str) -> Option<String> {
    let octets: Vec<&str> = raw.split(':').collect();
    if octets.len() != 6
        || octets
            .iter()
            .any(|o| o.is_empty() || o.len() > 2 || !o.chars().all(|c| c.is_ascii_hexdigit()))
    {
        return None;
    }

    let mac = octets
        .iter()
        .map(|o| format!("{:0>2}", o.to_ascii_lowercase()))
        .collect::<Vec<_>>()
        .join(":");

    if mac == "00:00:00:00:00:00" || mac == "ff:ff:ff:ff:ff:ff" {
        return None;
    }
    Some(mac)
}
