//! whoshome Core Library
//!
//! This crate provides the presence-tracking engine behind the `whoshome`
//! daemon:
//! - Hardware address normalization with suffix matching
//! - Missed-cycle hysteresis turning noisy sightings into home/away status
//! - Console, text and JSON status sinks
//! - The probe loop with cooperative cancellation
//! - Neighbour scanning (ping sweep + ARP table) behind the [`Scanner`] trait
//!
//! # Example
//!
//! ```no_run
//! use whoshome_core::{config, scanner, OutputMode, OutputSink, PresenceTracker, ProbeScheduler};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let devices = config::load_people_file("people.json".as_ref())?;
//!     let tracker = PresenceTracker::new(devices, 30)?;
//!     let sink = OutputSink::new(OutputMode::None, None)?;
//!     let scanner = scanner::NeighborScanner::detect().await;
//!
//!     let mut scheduler = ProbeScheduler::new(scanner, "wlan0".parse()?, tracker, sink);
//!     scheduler.run(CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

pub mod address;
pub mod config;
pub mod error;
pub mod scanner;
pub mod scheduler;
pub mod sink;
pub mod tracker;

// Re-export commonly used types
pub use address::{normalize, AddressKey};
pub use config::{Settings, WatchEntry};
pub use error::{AddressError, ConfigError, OutputError, ScanError};
pub use scanner::{NeighborScanner, Responder, ScanTarget, Scanner};
pub use scheduler::{ProbeScheduler, SchedulerState, CYCLE_INTERVAL};
pub use sink::{OutputMode, OutputSink, StatusRecord};
pub use tracker::{
    CycleResult, DeviceStatus, PresenceTracker, Transition, WatchedDevice, DEFAULT_MAX_CYCLES,
};
