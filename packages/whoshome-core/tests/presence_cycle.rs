//! End-to-end presence cycles: scripted scans through the scheduler into
//! real output files.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use whoshome_core::{
    config, OutputMode, OutputSink, PresenceTracker, ProbeScheduler, Responder, ScanError,
    ScanTarget, Scanner, SchedulerState, StatusRecord, WatchEntry,
};

/// Hands out one scripted responder list per scan and cancels when exhausted.
struct ReplayScanner {
    cycles: Mutex<VecDeque<Vec<&'static str>>>,
    shutdown: CancellationToken,
}

impl Scanner for ReplayScanner {
    fn scan(
        &self,
        _target: &ScanTarget,
    ) -> impl Future<Output = Result<Vec<Responder>, ScanError>> + Send {
        let mut cycles = self.cycles.lock().unwrap();
        let macs = cycles.pop_front().unwrap_or_default();
        if cycles.is_empty() {
            self.shutdown.cancel();
        }
        let responders = macs
            .into_iter()
            .enumerate()
            .map(|(i, mac)| Responder {
                ip: format!("192.168.1.{}", i + 2).parse().unwrap(),
                mac: mac.to_string(),
            })
            .collect();
        async move { Ok(responders) }
    }
}

fn entry(name: &str, target: &str) -> WatchEntry {
    WatchEntry {
        name: name.to_string(),
        target: target.to_string(),
    }
}

fn watch_list() -> Vec<WatchEntry> {
    vec![
        entry("Alice", "3C:22:FB:0A:1B:2C"),
        entry("Bob", "dd:ee:ff"),
        entry("Tablet", "00:00:00:dd:ee:ff"),
    ]
}

fn read_records(path: &std::path::Path) -> Vec<StatusRecord> {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_decay_is_reflected_in_both_files() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("status");
    let shutdown = CancellationToken::new();

    // Alice answers with a randomized vendor prefix in cycle 1 only; Bob's
    // suffix (shared with the tablet) answers in every cycle.
    let scanner = ReplayScanner {
        cycles: Mutex::new(VecDeque::from(vec![
            vec!["da:a1:19:0a:1b:2c", "11:22:33:dd:ee:ff", "ff:ee:dd:00:00:01"],
            vec!["11:22:33:dd:ee:ff"],
            vec!["11:22:33:dd:ee:ff"],
            vec!["11:22:33:dd:ee:ff"],
        ])),
        shutdown: shutdown.clone(),
    };

    let devices = config::build_watch_list(&watch_list()).unwrap();
    let tracker = PresenceTracker::new(devices, 3).unwrap();
    let sink = OutputSink::new(OutputMode::Both, Some(&base)).unwrap();

    let target = "192.168.1.0/24".parse().unwrap();
    let mut scheduler = ProbeScheduler::new(scanner, target, tracker, sink)
        .with_interval(Duration::from_millis(1));
    scheduler.run(shutdown).await.unwrap();

    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert_eq!(scheduler.tracker().cycle(), 4);

    let records = read_records(&dir.path().join("status.json"));
    let verdicts: Vec<(&str, &str, bool)> = records
        .iter()
        .map(|r| (r.name.as_str(), r.target.as_str(), r.home))
        .collect();
    assert_eq!(
        verdicts,
        vec![
            ("Alice", "0a1b2c", false),
            ("Bob", "ddeeff", true),
            ("Tablet", "ddeeff", true),
        ]
    );

    let text = std::fs::read_to_string(dir.path().join("status.txt")).unwrap();
    assert_eq!(text, "🌍 Alice is away\n🏡 Bob is home\n🏡 Tablet is home\n");
}

#[tokio::test]
async fn test_unwritable_output_does_not_stop_the_loop() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("no-such-dir").join("status.json");
    let shutdown = CancellationToken::new();

    let scanner = ReplayScanner {
        cycles: Mutex::new(VecDeque::from(vec![vec!["3c:22:fb:0a:1b:2c"], vec![]])),
        shutdown: shutdown.clone(),
    };

    let devices = config::build_watch_list(&watch_list()).unwrap();
    let tracker = PresenceTracker::new(devices, 30).unwrap();
    let sink = OutputSink::new(OutputMode::Structured, Some(&path)).unwrap();

    let mut scheduler = ProbeScheduler::new(scanner, "wlan0".parse().unwrap(), tracker, sink)
        .with_interval(Duration::from_millis(1));
    scheduler.run(shutdown).await.unwrap();

    assert_eq!(scheduler.tracker().cycle(), 2);
    assert!(!path.exists());
    assert_eq!(scheduler.tracker().devices()[0].since_missed(), 1);
}
