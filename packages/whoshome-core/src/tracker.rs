//! Presence tracking with missed-cycle hysteresis.
//!
//! Every watched device carries a counter of cycles since it last answered.
//! A device is home while that counter is below `max_cycles` and away once it
//! reaches it, so a single dropped probe never flips a status.

use crate::address::AddressKey;
use crate::error::ConfigError;
use serde::Serialize;
use std::collections::HashSet;

/// Missed cycles tolerated before a device is declared away.
pub const DEFAULT_MAX_CYCLES: u32 = 30;

/// A device on the watch list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedDevice {
    pub name: String,
    pub address_key: AddressKey,
    since_missed: u32,
}

impl WatchedDevice {
    /// New devices start away under the default window; a tracker resets the
    /// counter to its own window when it adopts the device.
    pub fn new(name: impl Into<String>, address_key: AddressKey) -> Self {
        Self {
            name: name.into(),
            address_key,
            since_missed: DEFAULT_MAX_CYCLES,
        }
    }

    /// Cycles since this device last answered, held at the window size.
    pub fn since_missed(&self) -> u32 {
        self.since_missed
    }

    pub fn is_home(&self, max_cycles: u32) -> bool {
        self.since_missed < max_cycles
    }

    fn advance(&mut self, seen: bool, max_cycles: u32) {
        if seen {
            self.since_missed = 0;
        } else if self.since_missed < max_cycles {
            self.since_missed += 1;
        } else {
            self.since_missed = max_cycles;
        }
    }
}

/// Status of one device after a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub name: String,
    pub address_key: AddressKey,
    pub is_home: bool,
    pub since_missed: u32,
}

/// A status flip observed in a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Arrived(String),
    Departed(String),
}

/// Outcome of one probe cycle, in watch-list order.
#[derive(Debug, Clone)]
pub struct CycleResult {
    pub cycle: u64,
    pub statuses: Vec<DeviceStatus>,
    pub transitions: Vec<Transition>,
}

impl CycleResult {
    pub fn home_count(&self) -> usize {
        self.statuses.iter().filter(|s| s.is_home).count()
    }

    /// Status of the first device with this name.
    pub fn status_of(&self, name: &str) -> Option<&DeviceStatus> {
        self.statuses.iter().find(|s| s.name == name)
    }
}

/// Owns the watch list and folds one responder set per cycle into it.
#[derive(Debug)]
pub struct PresenceTracker {
    devices: Vec<WatchedDevice>,
    max_cycles: u32,
    cycle: u64,
}

impl PresenceTracker {
    pub fn new(mut devices: Vec<WatchedDevice>, max_cycles: u32) -> Result<Self, ConfigError> {
        if max_cycles == 0 {
            return Err(ConfigError::InvalidMaxCycles(max_cycles));
        }

        for device in &mut devices {
            device.since_missed = max_cycles;
        }

        Ok(Self {
            devices,
            max_cycles,
            cycle: 0,
        })
    }

    pub fn devices(&self) -> &[WatchedDevice] {
        &self.devices
    }

    pub fn max_cycles(&self) -> u32 {
        self.max_cycles
    }

    /// Number of cycles applied so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Apply one cycle's responders and derive every device's status.
    ///
    /// Devices sharing a key are all marked seen by one responder. Responders
    /// matching no device are ignored.
    pub fn apply_cycle(&mut self, responders: &HashSet<AddressKey>) -> CycleResult {
        self.cycle += 1;

        let mut statuses = Vec::with_capacity(self.devices.len());
        let mut transitions = Vec::new();

        for device in &mut self.devices {
            let was_home = device.is_home(self.max_cycles);
            let seen = responders.contains(&device.address_key);

            device.advance(seen, self.max_cycles);
            let is_home = device.is_home(self.max_cycles);

            if seen {
                tracing::debug!("{} ({}) answered", device.name, device.address_key);
            }

            match (was_home, is_home) {
                (false, true) => {
                    tracing::info!("{} arrived", device.name);
                    transitions.push(Transition::Arrived(device.name.clone()));
                }
                (true, false) => {
                    tracing::info!(
                        "{} left (no answer for {} cycles)",
                        device.name,
                        self.max_cycles
                    );
                    transitions.push(Transition::Departed(device.name.clone()));
                }
                _ => {}
            }

            statuses.push(DeviceStatus {
                name: device.name.clone(),
                address_key: device.address_key.clone(),
                is_home,
                since_missed: device.since_missed,
            });
        }

        CycleResult {
            cycle: self.cycle,
            statuses,
            transitions,
        }
    }
}
