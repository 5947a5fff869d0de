//! The probe loop: scan, update, render, sleep.
//!
//! Cycles never overlap. Cancellation is cooperative: it is checked before
//! each scan and raced against the sleep, so a cycle that has started always
//! finishes rendering first.

use crate::address::{self, AddressKey};
use crate::error::ScanError;
use crate::scanner::{Responder, ScanTarget, Scanner};
use crate::sink::OutputSink;
use crate::tracker::{CycleResult, PresenceTracker};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Pause between cycles.
pub const CYCLE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scanning,
    Rendering,
    Sleeping,
    Stopped,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerState::Idle => write!(f, "idle"),
            SchedulerState::Scanning => write!(f, "scanning"),
            SchedulerState::Rendering => write!(f, "rendering"),
            SchedulerState::Sleeping => write!(f, "sleeping"),
            SchedulerState::Stopped => write!(f, "stopped"),
        }
    }
}

pub struct ProbeScheduler<S> {
    scanner: S,
    target: ScanTarget,
    tracker: PresenceTracker,
    sink: OutputSink,
    interval: Duration,
    state: SchedulerState,
}

impl<S: Scanner> ProbeScheduler<S> {
    pub fn new(scanner: S, target: ScanTarget, tracker: PresenceTracker, sink: OutputSink) -> Self {
        Self {
            scanner,
            target,
            tracker,
            sink,
            interval: CYCLE_INTERVAL,
            state: SchedulerState::Idle,
        }
    }

    /// Override the pause between cycles.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn tracker(&self) -> &PresenceTracker {
        &self.tracker
    }

    fn transition(&mut self, next: SchedulerState) {
        tracing::trace!("scheduler {} -> {}", self.state, next);
        self.state = next;
    }

    /// Run one scan, update and render. Scan failures are returned untouched.
    pub async fn run_cycle(&mut self) -> Result<CycleResult, ScanError> {
        self.transition(SchedulerState::Scanning);
        let responders = self.scanner.scan(&self.target).await?;
        let keys = responder_keys(&responders);

        let result = self.tracker.apply_cycle(&keys);

        self.transition(SchedulerState::Rendering);
        let failures = self.sink.render(&result);

        tracing::info!(
            "Cycle {}: {}/{} home, {} responders{}",
            result.cycle,
            result.home_count(),
            result.statuses.len(),
            responders.len(),
            if failures.is_empty() {
                String::new()
            } else {
                format!(", {} output file(s) skipped", failures.len())
            }
        );

        Ok(result)
    }

    /// Loop until `shutdown` is cancelled or a scan fails.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), ScanError> {
        tracing::info!(
            "Watching {} devices on {} (away after {} missed cycles, every {}s)",
            self.tracker.devices().len(),
            self.target,
            self.tracker.max_cycles(),
            self.interval.as_secs()
        );

        let outcome = loop {
            if shutdown.is_cancelled() {
                break Ok(());
            }

            if let Err(e) = self.run_cycle().await {
                break Err(e);
            }

            self.transition(SchedulerState::Sleeping);
            let interrupted = tokio::select! {
                _ = tokio::time::sleep(self.interval) => false,
                _ = shutdown.cancelled() => true,
            };
            if interrupted {
                break Ok(());
            }
        };

        self.transition(SchedulerState::Stopped);
        tracing::info!("Stopped after {} cycles", self.tracker.cycle());
        outcome
    }
}

/// Normalize responder addresses, dropping any that cannot be keyed.
pub fn responder_keys(responders: &[Responder]) -> HashSet<AddressKey> {
    responders
        .iter()
        .filter_map(|r| match address::normalize(&r.mac) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::debug!("Ignoring responder {}: {}", r.ip, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::normalize;
    use crate::sink::OutputMode;
    use crate::tracker::WatchedDevice;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::Mutex;

    /// Replays scripted scan outcomes; cancels the token once they run out.
    struct ScriptedScanner {
        script: Mutex<VecDeque<Result<Vec<Responder>, ScanError>>>,
        shutdown: CancellationToken,
    }

    impl Scanner for ScriptedScanner {
        fn scan(
            &self,
            _target: &ScanTarget,
        ) -> impl Future<Output = Result<Vec<Responder>, ScanError>> + Send {
            let next = self.script.lock().unwrap().pop_front();
            if self.script.lock().unwrap().is_empty() {
                self.shutdown.cancel();
            }
            async move { next.unwrap_or_else(|| Ok(Vec::new())) }
        }
    }

    fn responder(mac: &str) -> Responder {
        Responder {
            ip: "192.168.1.50".parse().unwrap(),
            mac: mac.to_string(),
        }
    }

    fn scheduler(
        script: Vec<Result<Vec<Responder>, ScanError>>,
        shutdown: &CancellationToken,
    ) -> ProbeScheduler<ScriptedScanner> {
        let scanner = ScriptedScanner {
            script: Mutex::new(script.into()),
            shutdown: shutdown.clone(),
        };
        let tracker = PresenceTracker::new(
            vec![WatchedDevice::new("phone", normalize("11:22:33:aa:bb:cc").unwrap())],
            2,
        )
        .unwrap();
        let sink = OutputSink::new(OutputMode::None, None).unwrap();

        ProbeScheduler::new(scanner, "wlan0".parse().unwrap(), tracker, sink)
            .with_interval(Duration::from_millis(1))
    }

    #[test]
    fn test_responder_keys_skip_bad_addresses() {
        let keys = responder_keys(&[
            responder("da:a1:19:aa:bb:cc"),
            responder("not-a-mac"),
            responder("00:00:00:AA:BB:CC"),
        ]);
        assert_eq!(keys.len(), 1);
        assert!(keys.contains(&normalize("aabbcc").unwrap()));
    }

    #[tokio::test]
    async fn test_run_cycle_marks_suffix_match_home() {
        let shutdown = CancellationToken::new();
        let mut scheduler = scheduler(
            vec![Ok(vec![responder("da:a1:19:aa:bb:cc")]), Ok(vec![])],
            &shutdown,
        );

        let result = scheduler.run_cycle().await.unwrap();
        assert!(result.statuses[0].is_home);
        assert_eq!(scheduler.state(), SchedulerState::Rendering);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let shutdown = CancellationToken::new();
        let mut scheduler = scheduler(
            vec![
                Ok(vec![responder("11:22:33:aa:bb:cc")]),
                Ok(vec![]),
                Ok(vec![]),
            ],
            &shutdown,
        );

        scheduler.run(shutdown.clone()).await.unwrap();

        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        // The cycle that triggered the cancel still completed.
        assert_eq!(scheduler.tracker().cycle(), 3);
        assert_eq!(scheduler.tracker().devices()[0].since_missed(), 2);
    }

    #[tokio::test]
    async fn test_run_does_not_scan_when_already_cancelled() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let mut scheduler = scheduler(vec![Ok(vec![])], &shutdown);

        scheduler.run(shutdown.clone()).await.unwrap();
        assert_eq!(scheduler.tracker().cycle(), 0);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[tokio::test]
    async fn test_scan_error_is_fatal() {
        let shutdown = CancellationToken::new();
        let mut scheduler = scheduler(
            vec![
                Ok(vec![]),
                Err(ScanError::InterfaceNotFound("wlan0".into())),
                Ok(vec![]),
            ],
            &shutdown,
        );

        let err = scheduler.run(shutdown.clone()).await.unwrap_err();
        assert!(matches!(err, ScanError::InterfaceNotFound(_)));
        assert_eq!(scheduler.tracker().cycle(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }
}
