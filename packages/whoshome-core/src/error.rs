//! Error types for the presence engine.
//!
//! Configuration and scan errors are fatal for the daemon; output errors are
//! recovered per cycle by the caller.

use std::path::PathBuf;
use thiserror::Error;

/// A hardware address that cannot be turned into a matching key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid character {character:?} at position {position} in hardware address {address:?}")]
    InvalidCharacter {
        address: String,
        character: char,
        position: usize,
    },

    #[error("hardware address {0:?} is neither a full 6-octet address nor a 3-octet suffix")]
    InvalidLength(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("watched device #{index} has an empty name")]
    EmptyName { index: usize },

    #[error("watched device {name:?}: {source}")]
    InvalidDevice {
        name: String,
        #[source]
        source: AddressError,
    },

    #[error("no watched devices configured (looked in: {searched})")]
    NoDevices { searched: String },

    #[error("max cycles must be a positive integer, got {0}")]
    InvalidMaxCycles(u32),

    #[error("invalid scan target: {0}")]
    InvalidTarget(String),

    #[error("invalid output settings: {0}")]
    InvalidOutput(String),
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid scan target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("interface {0:?} not found or has no IPv4 address")]
    InterfaceNotFound(String),

    #[error("could not determine a default network interface")]
    NoDefaultInterface,

    #[error("failed to run {command}: {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("neighbour scanning is not supported on this platform")]
    UnsupportedPlatform,
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize status for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
