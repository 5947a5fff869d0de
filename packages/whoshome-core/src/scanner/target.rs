//! Scan target resolution: interface names and CIDR ranges.

use super::run_command;
use crate::error::ScanError;
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// What to sweep each cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScanTarget {
    /// A local interface; its IPv4 network is swept
    Interface(String),
    /// An explicit IPv4 range
    Network(Ipv4Network),
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanTarget::Interface(name) => write!(f, "{}", name),
            ScanTarget::Network(network) => write!(f, "{}", network),
        }
    }
}

impl FromStr for ScanTarget {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.starts_with(|c: char| c.is_ascii_digit()) {
            return s
                .parse::<Ipv4Network>()
                .map(ScanTarget::Network)
                .map_err(|e| ScanError::InvalidTarget {
                    target: s.to_string(),
                    reason: e.to_string(),
                });
        }

        if s.is_empty() || s.contains(|c: char| c.is_whitespace() || c == '/') {
            return Err(ScanError::InvalidTarget {
                target: s.to_string(),
                reason: "not an interface name or IPv4 CIDR range".to_string(),
            });
        }

        Ok(ScanTarget::Interface(s.to_string()))
    }
}

impl TryFrom<String> for ScanTarget {
    type Error = ScanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScanTarget> for String {
    fn from(target: ScanTarget) -> Self {
        target.to_string()
    }
}

/// A target turned into something sweepable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub interface: Option<String>,
    /// Network address and prefix, host bits cleared
    pub network: Ipv4Network,
    pub local_ip: Option<Ipv4Addr>,
}

/// Resolve a target to its network. An interface without an IPv4 address is an error.
pub async fn resolve(target: &ScanTarget) -> Result<ResolvedTarget, ScanError> {
    match target {
        ScanTarget::Network(network) => Ok(ResolvedTarget {
            interface: None,
            network: clear_host_bits(*network),
            local_ip: None,
        }),
        ScanTarget::Interface(name) => resolve_interface(name).await,
    }
}

/// Interface carrying the default route.
pub async fn default_interface() -> Result<String, ScanError> {
    #[cfg(target_os = "linux")]
    {
        let output = run_command("ip", &["route", "show", "default"]).await?;
        parse_default_route_linux(&String::from_utf8_lossy(&output.stdout))
            .ok_or(ScanError::NoDefaultInterface)
    }

    #[cfg(target_os = "macos")]
    {
        let output = run_command("route", &["-n", "get", "default"]).await?;
        parse_default_route_macos(&String::from_utf8_lossy(&output.stdout))
            .ok_or(ScanError::NoDefaultInterface)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        Err(ScanError::UnsupportedPlatform)
    }
}

#[cfg(target_os = "linux")]
async fn resolve_interface(name: &str) -> Result<ResolvedTarget, ScanError> {
    let output = run_command("ip", &["-4", "-o", "addr", "show", "dev", name]).await?;
    if !output.status.success() {
        return Err(ScanError::InterfaceNotFound(name.to_string()));
    }

    let (local_ip, network) = parse_ip_addr_linux(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| ScanError::InterfaceNotFound(name.to_string()))?;

    Ok(ResolvedTarget {
        interface: Some(name.to_string()),
        network,
        local_ip: Some(local_ip),
    })
}

#[cfg(target_os = "macos")]
async fn resolve_interface(name: &str) -> Result<ResolvedTarget, ScanError> {
    let output = run_command("ifconfig", &[name]).await?;
    if !output.status.success() {
        return Err(ScanError::InterfaceNotFound(name.to_string()));
    }

    let (local_ip, network) = parse_ifconfig_macos(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| ScanError::InterfaceNotFound(name.to_string()))?;

    Ok(ResolvedTarget {
        interface: Some(name.to_string()),
        network,
        local_ip: Some(local_ip),
    })
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
async fn resolve_interface(_name: &str) -> Result<ResolvedTarget, ScanError> {
    Err(ScanError::UnsupportedPlatform)
}

fn clear_host_bits(network: Ipv4Network) -> Ipv4Network {
    Ipv4Network::new(network.network(), network.prefix()).unwrap_or(network)
}

/// First `inet a.b.c.d/nn` of `ip -4 -o addr show` output.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_ip_addr_linux(output: &str) -> Option<(Ipv4Addr, Ipv4Network)> {
    output.lines().find_map(|line| {
        let cidr = line
            .split_whitespace()
            .skip_while(|&s| s != "inet")
            .nth(1)?;
        let network: Ipv4Network = cidr.parse().ok()?;
        if network.ip().is_loopback() {
            return None;
        }
        Some((network.ip(), clear_host_bits(network)))
    })
}

/// `inet 192.168.1.5 netmask 0xffffff00 ...` from ifconfig.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn parse_ifconfig_macos(output: &str) -> Option<(Ipv4Addr, Ipv4Network)> {
    output.lines().find_map(|line| {
        let trimmed = line.trim();
        if !trimmed.starts_with("inet ") {
            return None;
        }
        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        let ip: Ipv4Addr = parts.get(1)?.parse().ok()?;
        if ip.is_loopback() {
            return None;
        }
        let mask = parts
            .iter()
            .position(|&p| p == "netmask")
            .and_then(|i| parts.get(i + 1))?;
        let mask = u32::from_str_radix(mask.trim_start_matches("0x"), 16).ok()?;
        let network = Ipv4Network::new(ip, mask.count_ones() as u8).ok()?;
        Some((ip, clear_host_bits(network)))
    })
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_default_route_linux(output: &str) -> Option<String> {
    output
        .split_whitespace()
        .skip_while(|&s| s != "dev")
        .nth(1)
        .map(|s| s.to_string())
}

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn parse_default_route_macos(output: &str) -> Option<String> {
    output
        .lines()
        .find(|line| line.trim_start().starts_with("interface:"))
        .and_then(|line| line.split(':').nth(1))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target() {
        assert_eq!(
            "wlan0".parse::<ScanTarget>().unwrap(),
            ScanTarget::Interface("wlan0".into())
        );
        assert_eq!(
            "192.168.1.0/24".parse::<ScanTarget>().unwrap(),
            ScanTarget::Network("192.168.1.0/24".parse().unwrap())
        );
        assert!("192.168.1.0/40".parse::<ScanTarget>().is_err());
        assert!("".parse::<ScanTarget>().is_err());
        assert!("eth 0".parse::<ScanTarget>().is_err());
    }

    #[tokio::test]
    async fn test_network_target_clears_host_bits() {
        let target: ScanTarget = "10.1.2.77/16".parse().unwrap();
        let resolved = resolve(&target).await.unwrap();
        assert_eq!(resolved.network.to_string(), "10.1.0.0/16");
        assert_eq!(resolved.interface, None);
    }

    #[test]
    fn test_parse_ip_addr_linux() {
        let output = "3: wlp2s0    inet 192.168.1.23/24 brd 192.168.1.255 scope global dynamic noprefixroute wlp2s0\\       valid_lft 85413sec preferred_lft 85413sec\n";
        let (ip, network) = parse_ip_addr_linux(output).unwrap();
        assert_eq!(ip, Ipv4Addr::new(192, 168, 1, 23));
        assert_eq!(network.to_string(), "192.168.1.0/24");

        assert!(parse_ip_addr_linux("").is_none());
        assert!(parse_ip_addr_linux("1: lo    inet 127.0.0.1/8 scope host lo").is_none());
    }

    #[test]
    fn test_parse_ifconfig_macos() {
        let output = "en0: flags=8863<UP,BROADCAST,SMART,RUNNING,SIMPLEX,MULTICAST> mtu 1500\n\
                      \tether 3c:22:fb:11:22:33\n\
                      \tinet 10.0.1.14 netmask 0xfffffc00 broadcast 10.0.3.255\n";
        let (ip, network) = parse_ifconfig_macos(output).unwrap();
        assert_eq!(ip, Ipv4Addr::new(10, 0, 1, 14));
        assert_eq!(network.to_string(), "10.0.0.0/22");
    }

    #[test]
    fn test_parse_default_route() {
        assert_eq!(
            parse_default_route_linux("default via 192.168.1.1 dev eth0 proto dhcp metric 100\n"),
            Some("eth0".to_string())
        );
        assert_eq!(parse_default_route_linux(""), None);
        let route_get = "   route to: default\ndestination: default\n  gateway: 10.0.0.1\n  interface: en0\n";
        assert_eq!(parse_default_route_macos(route_get), Some("en0".to_string()));
    }
}
