//! Watch mode: the long-running presence loop
//!
//! This module wires settings, the watch list and the scanner into a
//! [`ProbeScheduler`] and runs it until SIGTERM/SIGINT.

use anyhow::{Context, Result};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use whoshome_core::config::{self, Settings};
use whoshome_core::scanner::{NeighborScanner, ScanTarget};
use whoshome_core::{OutputMode, OutputSink, PresenceTracker, ProbeScheduler, ScanError};

/// Command-line overrides for watch mode
pub struct WatchOptions {
    pub target: Option<ScanTarget>,
    pub output_mode: Option<OutputMode>,
    pub output_file: Option<PathBuf>,
    pub max_cycles: Option<u32>,
    pub people: Option<PathBuf>,
}

/// Run the presence loop until interrupted.
///
/// Configuration problems fail before the first scan. A scan failure ends
/// the loop with an error; a signal ends it cleanly.
pub async fn run_daemon(options: WatchOptions, settings: Settings) -> Result<()> {
    let watch_list = config::resolve_watch_list(options.people.as_deref(), &settings)
        .context("Failed to load watched devices")?;
    tracing::info!(
        "Loaded {} watched devices from {}",
        watch_list.devices.len(),
        watch_list.origin
    );

    let max_cycles = options.max_cycles.unwrap_or(settings.max_cycles);
    let tracker = PresenceTracker::new(watch_list.devices, max_cycles)?;

    let output_mode = options
        .output_mode
        .or_else(|| options.output_file.as_deref().map(infer_mode))
        .unwrap_or(settings.output_mode);
    let output_path = options.output_file.or(settings.output_path);
    let sink = OutputSink::new(output_mode, output_path.as_deref())
        .context("Invalid output settings")?
        .with_color(std::io::stdout().is_terminal());
    tracing::info!("Output mode: {}", sink.mode());
    for file in sink.files() {
        tracing::info!("Writing status to {}", file.path().display());
    }

    let target = crate::target_or_default(options.target.or(settings.target)).await?;

    let scanner = NeighborScanner::detect().await;
    if !scanner.capabilities().is_elevated {
        tracing::warn!("Not running as root; results may be incomplete. Try: sudo whoshome watch");
    }

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone())?;

    println!("Loading...\n");

    let mut scheduler = ProbeScheduler::new(scanner, target, tracker, sink);
    let outcome = scheduler.run(shutdown.clone()).await;

    finish(outcome, &shutdown, &mut std::io::stdout().lock())
}

/// Turn the loop outcome into the process result.
///
/// A scan failure is an error (non-zero exit). A requested stop prints the
/// acknowledgment and succeeds.
fn finish(
    outcome: Result<(), ScanError>,
    shutdown: &CancellationToken,
    out: &mut impl Write,
) -> Result<()> {
    outcome.context("Scan failed")?;

    if shutdown.is_cancelled() {
        writeln!(out, "\nQuit")?;
        out.flush()?;
    }
    Ok(())
}

/// Output mode implied by an output filename given without `--output-mode`.
fn infer_mode(path: &Path) -> OutputMode {
    match path.extension().and_then(|e| e.to_str()) {
        Some("txt") => OutputMode::Text,
        Some("json") => OutputMode::Structured,
        _ => OutputMode::Both,
    }
}

/// Cancel `shutdown` on SIGTERM or SIGINT.
fn setup_signal_handlers(shutdown: CancellationToken) -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;

        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
                _ = sigint.recv() => tracing::info!("Received SIGINT"),
            }
            shutdown.cancel();
        });
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C");
                shutdown.cancel();
            }
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_mode_from_extension() {
        assert_eq!(infer_mode(Path::new("status.txt")), OutputMode::Text);
        assert_eq!(infer_mode(Path::new("/var/lib/status.json")), OutputMode::Structured);
        assert_eq!(infer_mode(Path::new("status")), OutputMode::Both);
    }

    #[test]
    fn test_interrupt_prints_quit_and_succeeds() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let mut out = Vec::new();

        finish(Ok(()), &shutdown, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "\nQuit\n");
    }

    #[test]
    fn test_scan_failure_is_an_error() {
        let shutdown = CancellationToken::new();
        let mut out = Vec::new();

        let err = finish(
            Err(ScanError::InterfaceNotFound("wlan9".into())),
            &shutdown,
            &mut out,
        )
        .unwrap_err();

        assert!(err.to_string().contains("Scan failed"));
        assert!(matches!(
            err.downcast_ref::<ScanError>(),
            Some(ScanError::InterfaceNotFound(_))
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_scan_failure_wins_over_interrupt() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let mut out = Vec::new();

        assert!(finish(Err(ScanError::NoDefaultInterface), &shutdown, &mut out).is_err());
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_missing_watch_list_fails_before_scanning() {
        let dir = std::env::temp_dir().join(format!("whoshome-test-{}", std::process::id()));
        let options = WatchOptions {
            target: Some("eth0".parse().unwrap()),
            output_mode: None,
            output_file: None,
            max_cycles: None,
            people: Some(dir.join("missing.json")),
        };

        let err = run_daemon(options, Settings::default()).await.unwrap_err();
        assert!(err.to_string().contains("watched devices"));
    }
}
