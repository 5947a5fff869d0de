//! Settings and watch-list loading.
//!
//! Settings come from a TOML file; the watch list from the same file's
//! `[[device]]` entries or from a JSON people file. Every target is
//! normalized at load time, so a malformed address stops the daemon before
//! the first scan.

use crate::address;
use crate::error::ConfigError;
use crate::scanner::ScanTarget;
use crate::sink::OutputMode;
use crate::tracker::{WatchedDevice, DEFAULT_MAX_CYCLES};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the settings file
pub const ENV_CONFIG: &str = "WHOSHOME_CONFIG";

/// Environment variable naming the JSON people file
pub const ENV_PEOPLE: &str = "WHOSHOME_PEOPLE";

/// People file looked up in the invoking user's home directory
const PEOPLE_FILE_NAME: &str = ".people.json";

/// Settings file structure
#[derive(Debug, Deserialize, Serialize, Default)]
struct ConfigFile {
    scan: Option<ScanSection>,
    output: Option<OutputSection>,
    #[serde(default, rename = "device")]
    devices: Vec<WatchEntry>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ScanSection {
    /// Interface name or IPv4 CIDR range
    target: Option<String>,
    /// Missed cycles before a device is away
    max_cycles: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct OutputSection {
    mode: Option<OutputMode>,
    path: Option<PathBuf>,
}

/// One `{ name, target }` watch-list record, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WatchEntry {
    pub name: String,
    pub target: String,
}

/// Where a piece of configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Built-in defaults
    Default,
    /// Named by an environment variable
    Environment,
    /// Found at its default location
    ConfigFile,
    /// Given on the command line
    CommandLine,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ConfigFile => write!(f, "config file"),
            ConfigSource::CommandLine => write!(f, "command line"),
        }
    }
}

/// Resolved daemon settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub target: Option<ScanTarget>,
    pub max_cycles: u32,
    pub output_mode: OutputMode,
    pub output_path: Option<PathBuf>,
    pub entries: Vec<WatchEntry>,
    /// Settings file that was read, if any
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target: None,
            max_cycles: DEFAULT_MAX_CYCLES,
            output_mode: OutputMode::None,
            output_path: None,
            entries: Vec::new(),
            path: None,
            source: ConfigSource::Default,
        }
    }
}

/// Default settings file location: `~/.config/whoshome/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|p| p.join("whoshome").join("config.toml"))
}

/// Get the path to the config file for documentation purposes
pub fn config_file_path_string() -> String {
    config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/whoshome/config.toml".to_string())
}

/// Load settings with priority:
/// 1. `explicit` path (from the command line)
/// 2. `WHOSHOME_CONFIG`
/// 3. `~/.config/whoshome/config.toml` if it exists
/// 4. Defaults
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings, ConfigError> {
    if let Some(path) = explicit {
        return read_settings(path, ConfigSource::CommandLine);
    }

    if let Ok(path) = std::env::var(ENV_CONFIG) {
        let path = path.trim();
        if !path.is_empty() {
            return read_settings(Path::new(path), ConfigSource::Environment);
        }
    }

    if let Some(path) = config_file_path().filter(|p| p.exists()) {
        return read_settings(&path, ConfigSource::ConfigFile);
    }

    tracing::debug!("No settings file found, using defaults");
    Ok(Settings::default())
}

fn read_settings(path: &Path, source: ConfigSource) -> Result<Settings, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut settings = parse_settings(&content, path)?;
    settings.path = Some(path.to_path_buf());
    settings.source = source;

    tracing::debug!("Loaded settings from {:?}", path);
    Ok(settings)
}

/// Parse the TOML settings format.
pub fn parse_settings(content: &str, path: &Path) -> Result<Settings, ConfigError> {
    let file: ConfigFile = toml::from_str(content).map_err(|e| ConfigError::Toml {
        path: path.to_path_buf(),
        source: e,
    })?;

    let scan = file.scan.unwrap_or_default();
    let output = file.output.unwrap_or_default();

    let target = scan
        .target
        .map(|t| {
            t.parse::<ScanTarget>()
                .map_err(|e| ConfigError::InvalidTarget(e.to_string()))
        })
        .transpose()?;

    let max_cycles = scan.max_cycles.unwrap_or(DEFAULT_MAX_CYCLES);
    if max_cycles == 0 {
        return Err(ConfigError::InvalidMaxCycles(max_cycles));
    }

    Ok(Settings {
        target,
        max_cycles,
        output_mode: output.mode.unwrap_or_default(),
        output_path: output.path,
        entries: file.devices,
        path: None,
        source: ConfigSource::Default,
    })
}

/// Validate and normalize watch-list records, keeping their order.
///
/// Duplicate targets are allowed; each record becomes its own device.
pub fn build_watch_list(entries: &[WatchEntry]) -> Result<Vec<WatchedDevice>, ConfigError> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let name = entry.name.trim();
            if name.is_empty() {
                return Err(ConfigError::EmptyName { index });
            }
            let key = address::normalize(&entry.target).map_err(|source| {
                ConfigError::InvalidDevice {
                    name: name.to_string(),
                    source,
                }
            })?;
            Ok(WatchedDevice::new(name, key))
        })
        .collect()
}

/// Load a JSON people file: `[{"name": "...", "target": "aa:bb:cc:dd:ee:ff"}, ...]`.
pub fn load_people_file(path: &Path) -> Result<Vec<WatchedDevice>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let entries: Vec<WatchEntry> =
        serde_json::from_str(&content).map_err(|e| ConfigError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;

    tracing::debug!("Loaded {} people from {:?}", entries.len(), path);
    build_watch_list(&entries)
}

/// The watch list and where it came from.
#[derive(Debug)]
pub struct WatchList {
    pub devices: Vec<WatchedDevice>,
    pub origin: String,
}

/// Resolve the watch list with priority:
/// 1. `explicit` people file (from the command line)
/// 2. `WHOSHOME_PEOPLE`
/// 3. `[[device]]` entries in the settings file
/// 4. `~/.people.json` of the invoking user
pub fn resolve_watch_list(
    explicit: Option<&Path>,
    settings: &Settings,
) -> Result<WatchList, ConfigError> {
    let env_people = std::env::var(ENV_PEOPLE)
        .ok()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .map(PathBuf::from);

    let file = explicit.map(Path::to_path_buf).or(env_people);
    if let Some(path) = file {
        return non_empty(load_people_file(&path)?, path.display().to_string());
    }

    if !settings.entries.is_empty() {
        let origin = settings
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "settings".to_string());
        return non_empty(build_watch_list(&settings.entries)?, origin);
    }

    let candidates = people_file_candidates();
    if let Some(path) = candidates.iter().find(|p| p.exists()) {
        return non_empty(load_people_file(path)?, path.display().to_string());
    }

    let mut searched: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
    searched.insert(0, format!("[[device]] entries in {}", config_file_path_string()));
    Err(ConfigError::NoDevices {
        searched: searched.join(", "),
    })
}

fn non_empty(devices: Vec<WatchedDevice>, origin: String) -> Result<WatchList, ConfigError> {
    if devices.is_empty() {
        return Err(ConfigError::NoDevices { searched: origin });
    }
    Ok(WatchList { devices, origin })
}

/// `~/.people.json` for the user behind `sudo`, then for the current user.
fn people_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(user) = std::env::var("SUDO_USER") {
        if let Some(home) = fs::read_to_string("/etc/passwd")
            .ok()
            .and_then(|passwd| passwd_home(&passwd, &user))
        {
            candidates.push(home.join(PEOPLE_FILE_NAME));
        }
    }

    if let Some(home) = dirs::home_dir() {
        let path = home.join(PEOPLE_FILE_NAME);
        if !candidates.contains(&path) {
            candidates.push(path);
        }
    }

    candidates
}

/// Home directory of `user` in passwd(5) content.
fn passwd_home(passwd: &str, user: &str) -> Option<PathBuf> {
    passwd
        .lines()
        .filter(|line| !line.starts_with('#'))
        .map(|line| line.split(':').collect::<Vec<_>>())
        .find(|fields| fields.len() >= 7 && fields[0] == user)
        .map(|fields| PathBuf::from(fields[5]))
        .filter(|home| !home.as_os_str().is_empty())
}

/// Generate example config file content
pub fn generate_example_config() -> String {
    r#"# whoshome configuration
# Place this file at: ~/.config/whoshome/config.toml

[scan]
# Interface to sweep, or an explicit IPv4 range such as "192.168.1.0/24".
# Defaults to the interface carrying the default route.
# target = "wlan0"

# Missed cycles (30s each) before a device is reported away
# max_cycles = 30

[output]
# none | text | structured | both
# mode = "both"
# For "both" this is a base name: status.txt and status.json are written
# path = "/var/lib/whoshome/status"

# Watched devices. Only the last three octets of the address are matched.
[[device]]
name = "Alice"
target = "aa:bb:cc:dd:ee:ff"
"#
    .to_string()
}
