//! Network scanning module.
//!
//! A [`Scanner`] performs one discovery pass over a segment and reports which
//! hardware addresses answered. [`NeighborScanner`] does this with the system
//! tools:
//! - ICMP ping sweep to make every live host resolve over ARP
//! - neighbour (ARP) table reading to collect the hardware addresses
//! - privilege detection to decide whether the sweep can run

mod arp;
mod ping;
pub mod oui;
pub mod privileges;
pub mod target;

pub use arp::{NeighborEntry, NeighborState};
pub use privileges::ScanCapabilities;
pub use target::{ResolvedTarget, ScanTarget};

use crate::error::ScanError;
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::net::Ipv4Addr;
use std::process::{Command, Output};
use std::time::{Duration, Instant};

/// Time for the kernel to finish DELAY/PROBE on entries the sweep touched.
pub const NEIGHBOR_SETTLE: Duration = Duration::from_secs(6);

/// A device that answered during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Responder {
    /// Address the answer was solicited for
    pub ip: Ipv4Addr,
    /// Hardware address that answered, colon-hex
    pub mac: String,
}

/// One active discovery pass over a network segment.
pub trait Scanner {
    fn scan(
        &self,
        target: &ScanTarget,
    ) -> impl Future<Output = Result<Vec<Responder>, ScanError>> + Send;
}

/// Run a system command off the async runtime.
pub(crate) async fn run_command(program: &str, args: &[&str]) -> Result<Output, ScanError> {
    let program_owned = program.to_string();
    let args_owned: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let describe = || format!("{} {}", program, args.join(" "));

    tokio::task::spawn_blocking(move || Command::new(&program_owned).args(&args_owned).output())
        .await
        .map_err(|e| ScanError::Command {
            command: describe(),
            source: std::io::Error::other(e),
        })?
        .map_err(|source| ScanError::Command {
            command: describe(),
            source,
        })
}

/// Scanner backed by the system `ping` and the kernel neighbour table.
#[derive(Debug, Clone)]
pub struct NeighborScanner {
    capabilities: ScanCapabilities,
}

impl NeighborScanner {
    /// Probe the local privileges once and build a scanner for them.
    pub async fn detect() -> Self {
        let capabilities = privileges::detect_capabilities().await;

        if capabilities.mode == privileges::ScanMode::Limited {
            tracing::warn!(
                "Running with limited scan capabilities: {}",
                capabilities
                    .warning
                    .as_deref()
                    .unwrap_or("some features unavailable")
            );
        } else {
            tracing::info!("Running with full scan capabilities");
        }

        Self { capabilities }
    }

    pub fn capabilities(&self) -> &ScanCapabilities {
        &self.capabilities
    }
}

impl Scanner for NeighborScanner {
    async fn scan(&self, target: &ScanTarget) -> Result<Vec<Responder>, ScanError> {
        let scan_start = Instant::now();
        let resolved = target::resolve(target).await?;

        tracing::debug!(
            "Scanning {} on {}",
            resolved.network,
            resolved.interface.as_deref().unwrap_or("any interface")
        );

        let answered = if self.capabilities.can_ping {
            let hosts = ping::sweep_hosts(&resolved.network, resolved.local_ip);
            ping::ping_sweep(&hosts).await
        } else {
            tracing::debug!("Ping sweep skipped: insufficient privileges");
            HashSet::new()
        };

        let mut entries = arp::read_neighbor_table(resolved.interface.as_deref()).await?;
        if awaiting_confirmation(&entries, &resolved.network, &answered) {
            // Hosts that ignore ICMP only reach REACHABLE once the kernel's ARP probe completes.
            tracing::debug!(
                "Waiting {}s for pending neighbour entries",
                NEIGHBOR_SETTLE.as_secs()
            );
            tokio::time::sleep(NEIGHBOR_SETTLE).await;
            entries = arp::read_neighbor_table(resolved.interface.as_deref()).await?;
        }
        let responders = select_responders(entries, &resolved.network, &answered);

        tracing::info!(
            "Scan complete: {} responders ({} answered ping) in {:.1}s",
            responders.len(),
            answered.len(),
            scan_start.elapsed().as_secs_f64()
        );

        Ok(responders)
    }
}

/// Whether any in-network entry without a ping answer is still mid-probe.
pub fn awaiting_confirmation(
    entries: &[NeighborEntry],
    network: &Ipv4Network,
    answered: &HashSet<Ipv4Addr>,
) -> bool {
    entries
        .iter()
        .any(|e| network.contains(e.ip) && e.state.is_pending() && !answered.contains(&e.ip))
}

/// Keep the neighbour entries that prove a device answered during this pass.
///
/// An entry counts when it lies inside the scanned network and either the
/// kernel holds a fresh reply (REACHABLE) or its host answered the sweep.
/// STALE, DELAY and PROBE entries are not evidence of presence.
pub fn select_responders(
    entries: Vec<NeighborEntry>,
    network: &Ipv4Network,
    answered: &HashSet<Ipv4Addr>,
) -> Vec<Responder> {
    let mut seen = HashSet::new();

    entries
        .into_iter()
        .filter(|e| network.contains(e.ip))
        .filter(|e| e.state.is_confirmed() || answered.contains(&e.ip))
        .filter(|e| seen.insert((e.ip, e.mac.clone())))
        .map(|e| Responder { ip: e.ip, mac: e.mac })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ip: &str, mac: &str, state: NeighborState) -> NeighborEntry {
        NeighborEntry {
            ip: ip.parse().unwrap(),
            mac: mac.to_string(),
            state,
        }
    }

    #[test]
    fn test_select_responders_filters_network_and_state() {
        let network: Ipv4Network = "192.168.1.0/24".parse().unwrap();
        let answered: HashSet<Ipv4Addr> = ["192.168.1.20".parse().unwrap()].into_iter().collect();

        let entries = vec![
            entry("192.168.1.10", "aa:aa:aa:00:00:01", NeighborState::Reachable),
            entry("192.168.1.11", "aa:aa:aa:00:00:02", NeighborState::Stale),
            entry("192.168.1.20", "aa:aa:aa:00:00:03", NeighborState::Stale),
            entry("10.0.0.5", "aa:aa:aa:00:00:04", NeighborState::Reachable),
            entry("192.168.1.12", "aa:aa:aa:00:00:05", NeighborState::Delay),
            entry("192.168.1.10", "aa:aa:aa:00:00:01", NeighborState::Reachable),
        ];

        let responders = select_responders(entries, &network, &answered);
        let macs: Vec<&str> = responders.iter().map(|r| r.mac.as_str()).collect();
        assert_eq!(macs, vec!["aa:aa:aa:00:00:01", "aa:aa:aa:00:00:03"]);
    }

    #[test]
    fn test_unanswered_pending_entry_is_not_a_responder() {
        let network: Ipv4Network = "192.168.1.0/24".parse().unwrap();
        let entries = vec![
            entry("192.168.1.40", "aa:aa:aa:0a:1b:2c", NeighborState::Delay),
            entry("192.168.1.41", "aa:aa:aa:0a:1b:2d", NeighborState::Probe),
        ];

        assert!(select_responders(entries.clone(), &network, &HashSet::new()).is_empty());

        let answered = ["192.168.1.41".parse().unwrap()].into_iter().collect();
        let responders = select_responders(entries, &network, &answered);
        assert_eq!(responders.len(), 1);
        assert_eq!(responders[0].mac, "aa:aa:aa:0a:1b:2d");
    }

    #[test]
    fn test_awaiting_confirmation() {
        let network: Ipv4Network = "192.168.1.0/24".parse().unwrap();
        let pending = vec![
            entry("192.168.1.40", "aa:aa:aa:0a:1b:2c", NeighborState::Delay),
            entry("192.168.1.10", "aa:aa:aa:00:00:01", NeighborState::Reachable),
        ];
        assert!(awaiting_confirmation(&pending, &network, &HashSet::new()));

        let answered = ["192.168.1.40".parse().unwrap()].into_iter().collect();
        assert!(!awaiting_confirmation(&pending, &network, &answered));

        let outside = vec![entry("10.0.0.4", "de:ad:be:ef:00:01", NeighborState::Probe)];
        assert!(!awaiting_confirmation(&outside, &network, &HashSet::new()));

        let settled = vec![entry("192.168.1.11", "aa:aa:aa:00:00:02", NeighborState::Stale)];
        assert!(!awaiting_confirmation(&settled, &network, &HashSet::new()));
    }

    #[test]
    fn test_unknown_state_needs_ping_answer() {
        let network: Ipv4Network = "10.0.0.0/24".parse().unwrap();
        let entries = vec![entry("10.0.0.2", "00:11:22:33:44:55", NeighborState::Unknown)];

        assert!(select_responders(entries.clone(), &network, &HashSet::new()).is_empty());

        let answered = ["10.0.0.2".parse().unwrap()].into_iter().collect();
        assert_eq!(select_responders(entries, &network, &answered).len(), 1);
    }
}
