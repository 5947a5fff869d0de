//! Ping sweep using system ping command

use ipnetwork::Ipv4Network;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::process::Command;

/// Upper bound on hosts swept per cycle.
const MAX_SWEEP_HOSTS: usize = 1024;

/// Concurrent pings per batch.
const BATCH_SIZE: usize = 64;

/// Host addresses of `network`, minus the local address.
///
/// Network and broadcast addresses are skipped for prefixes shorter than /31.
pub(crate) fn sweep_hosts(network: &Ipv4Network, local_ip: Option<Ipv4Addr>) -> Vec<Ipv4Addr> {
    let first = u32::from(network.network());
    let last = u32::from(network.broadcast());
    let (start, end) = if network.prefix() >= 31 {
        (first, last)
    } else {
        (first + 1, last - 1)
    };

    let total = (end - start) as usize + 1;
    if total > MAX_SWEEP_HOSTS {
        tracing::warn!(
            "{} has {} hosts; sweeping only the first {}",
            network,
            total,
            MAX_SWEEP_HOSTS
        );
    }

    (start..=end)
        .map(Ipv4Addr::from)
        .filter(|ip| Some(*ip) != local_ip)
        .take(MAX_SWEEP_HOSTS)
        .collect()
}

/// Ping every host once, in concurrent batches. Returns the hosts that answered.
///
/// Hosts that ignore ICMP still resolve over ARP while being pinged, which is
/// what the neighbour table read relies on.
pub(crate) async fn ping_sweep(hosts: &[Ipv4Addr]) -> HashSet<Ipv4Addr> {
    let mut answered = HashSet::new();
    let mut completed = 0;

    tracing::debug!("Pinging {} hosts", hosts.len());

    for batch in hosts.chunks(BATCH_SIZE) {
        let pings = batch.iter().map(|&ip| async move { (ip, ping_host(ip).await) });
        for (ip, alive) in futures::future::join_all(pings).await {
            if alive {
                answered.insert(ip);
            }
        }

        completed += batch.len();
        tracing::trace!(
            "Ping progress: {}/{} hosts checked, {} responding",
            completed,
            hosts.len(),
            answered.len()
        );
    }

    answered
}

/// Ping a single host using the system ping command.
async fn ping_host(ip: Ipv4Addr) -> bool {
    let ip_str = ip.to_string();

    let result = tokio::task::spawn_blocking(move || {
        #[cfg(target_os = "linux")]
        let output = Command::new("ping")
            .args(["-c", "1", "-W", "1", &ip_str])
            .output();

        #[cfg(target_os = "macos")]
        let output = Command::new("ping")
            .args(["-c", "1", "-t", "1", &ip_str])
            .output();

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        let output: std::io::Result<std::process::Output> = {
            let _ = &ip_str;
            Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "Unsupported platform",
            ))
        };

        output.map(|o| o.status.success()).unwrap_or(false)
    })
    .await;

    result.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_hosts_skips_network_broadcast_and_self() {
        let network: Ipv4Network = "192.168.1.0/24".parse().unwrap();
        let hosts = sweep_hosts(&network, Some(Ipv4Addr::new(192, 168, 1, 10)));
        assert_eq!(hosts.len(), 253);
        assert_eq!(hosts.first(), Some(&Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(hosts.last(), Some(&Ipv4Addr::new(192, 168, 1, 254)));
        assert!(!hosts.contains(&Ipv4Addr::new(192, 168, 1, 10)));
    }

    #[test]
    fn test_sweep_hosts_small_and_large_networks() {
        let single: Ipv4Network = "10.0.0.7/32".parse().unwrap();
        assert_eq!(sweep_hosts(&single, None), vec![Ipv4Addr::new(10, 0, 0, 7)]);

        let pair: Ipv4Network = "10.0.0.6/31".parse().unwrap();
        assert_eq!(sweep_hosts(&pair, None).len(), 2);

        let large: Ipv4Network = "10.0.0.0/16".parse().unwrap();
        assert_eq!(sweep_hosts(&large, None).len(), MAX_SWEEP_HOSTS);
    }
}
