//! Output sinks for cycle results.
//!
//! The console always receives one line per device. File sinks are chosen
//! once from [`OutputMode`] and rewritten from scratch every cycle, so each
//! file only ever holds the latest snapshot.

use crate::address::AddressKey;
use crate::error::{ConfigError, OutputError};
use crate::tracker::CycleResult;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const HOME_GLYPH: &str = "🏡";
const AWAY_GLYPH: &str = "🌍";

const GREEN: &str = "\x1b[92m";
const PURPLE: &str = "\x1b[95m";
const RESET: &str = "\x1b[0m";

/// Which files are written alongside the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Console only
    #[default]
    None,
    /// Human-readable text file
    Text,
    /// JSON file
    Structured,
    /// Text and JSON files side by side
    Both,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::None => write!(f, "none"),
            OutputMode::Text => write!(f, "text"),
            OutputMode::Structured => write!(f, "structured"),
            OutputMode::Both => write!(f, "both"),
        }
    }
}

impl FromStr for OutputMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "no" => Ok(OutputMode::None),
            "text" | "txt" => Ok(OutputMode::Text),
            "structured" | "json" => Ok(OutputMode::Structured),
            "both" => Ok(OutputMode::Both),
            other => Err(ConfigError::InvalidOutput(format!(
                "unknown output mode {other:?} (expected none, text, structured or both)"
            ))),
        }
    }
}

/// One entry of the structured file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub name: String,
    pub target: AddressKey,
    pub home: bool,
}

/// A file rewritten every cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSink {
    Text(PathBuf),
    Structured(PathBuf),
}

impl FileSink {
    pub fn path(&self) -> &Path {
        match self {
            FileSink::Text(path) | FileSink::Structured(path) => path,
        }
    }

    /// Truncate the file and write this cycle's snapshot. The handle is
    /// closed before returning.
    pub fn write(&self, result: &CycleResult) -> Result<(), OutputError> {
        let path = self.path();
        let io_err = |source| OutputError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);

        match self {
            FileSink::Text(_) => {
                writer
                    .write_all(render_text(result).as_bytes())
                    .map_err(io_err)?;
            }
            FileSink::Structured(_) => {
                serde_json::to_writer(&mut writer, &status_records(result)).map_err(|source| {
                    OutputError::Serialize {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
            }
        }

        writer.flush().map_err(io_err)
    }
}

/// Console plus the files selected by the output mode.
#[derive(Debug, Clone)]
pub struct OutputSink {
    mode: OutputMode,
    colored: bool,
    files: Vec<FileSink>,
}

impl OutputSink {
    /// Build the sinks for `mode`.
    ///
    /// `text` needs a `.txt` filename and `structured` a `.json` one. For
    /// `both`, `path` is a base name that receives both extensions.
    pub fn new(mode: OutputMode, path: Option<&Path>) -> Result<Self, ConfigError> {
        let require_path = || {
            path.ok_or_else(|| {
                ConfigError::InvalidOutput(format!("output mode {mode} needs an output filename"))
            })
        };

        let files = match mode {
            OutputMode::None => Vec::new(),
            OutputMode::Text => {
                let path = require_path()?;
                check_extension(path, "txt")?;
                vec![FileSink::Text(path.to_path_buf())]
            }
            OutputMode::Structured => {
                let path = require_path()?;
                check_extension(path, "json")?;
                vec![FileSink::Structured(path.to_path_buf())]
            }
            OutputMode::Both => {
                let base = require_path()?;
                vec![
                    FileSink::Text(with_suffix(base, ".txt")),
                    FileSink::Structured(with_suffix(base, ".json")),
                ]
            }
        };

        Ok(Self {
            mode,
            colored: false,
            files,
        })
    }

    /// Enable ANSI colours on console lines.
    pub fn with_color(mut self, colored: bool) -> Self {
        self.colored = colored;
        self
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn files(&self) -> &[FileSink] {
        &self.files
    }

    /// Render to stdout and every file sink.
    pub fn render(&self, result: &CycleResult) -> Vec<OutputError> {
        let stdout = std::io::stdout();
        let mut console = stdout.lock();
        self.render_to(result, &mut console)
    }

    /// Render the console lines to `console`, then write each file sink.
    ///
    /// A failing file never stops the console or the other file; the
    /// failures are logged and returned.
    pub fn render_to(&self, result: &CycleResult, console: &mut impl Write) -> Vec<OutputError> {
        let lines = render_console(result, self.colored);
        if let Err(e) = console.write_all(lines.as_bytes()).and_then(|_| console.flush()) {
            tracing::warn!("Failed to write status to console: {}", e);
        }

        let mut failures = Vec::new();
        for sink in &self.files {
            match sink.write(result) {
                Ok(()) => tracing::debug!("Wrote status to {}", sink.path().display()),
                Err(e) => {
                    tracing::warn!("Skipping output file this cycle: {}", e);
                    failures.push(e);
                }
            }
        }
        failures
    }
}

fn check_extension(path: &Path, expected: &str) -> Result<(), ConfigError> {
    let matches = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(expected));

    if matches {
        Ok(())
    } else {
        Err(ConfigError::InvalidOutput(format!(
            "{} must have a .{} extension",
            path.display(),
            expected
        )))
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn status_line(name: &str, is_home: bool) -> String {
    if is_home {
        format!("{HOME_GLYPH} {name} is home")
    } else {
        format!("{AWAY_GLYPH} {name} is away")
    }
}

/// Plain per-device lines, as written to the text file.
pub fn render_text(result: &CycleResult) -> String {
    let mut out = String::new();
    for status in &result.statuses {
        out.push_str(&status_line(&status.name, status.is_home));
        out.push('\n');
    }
    out
}

/// Console lines followed by the blank separator line.
pub fn render_console(result: &CycleResult, colored: bool) -> String {
    let mut out = String::new();
    for status in &result.statuses {
        let line = status_line(&status.name, status.is_home);
        if colored {
            let color = if status.is_home { GREEN } else { PURPLE };
            out.push_str(&format!("{color}{line}{RESET}\n"));
        } else {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out.push('\n');
    out
}

pub fn status_records(result: &CycleResult) -> Vec<StatusRecord> {
    result
        .statuses
        .iter()
        .map(|s| StatusRecord {
            name: s.name.clone(),
            target: s.address_key.clone(),
            home: s.is_home,
        })
        .collect()
}
