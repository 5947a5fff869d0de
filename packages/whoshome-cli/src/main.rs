//! whoshome CLI - presence detection for a single LAN segment
//!
//! This binary can:
//! - Watch a list of devices and report who is home (`watch`)
//! - List the devices answering on the segment right now (`scan`)
//! - Show the resolved configuration and watch list (`config`)

mod daemon;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use whoshome_core::scanner::{self, oui, privileges, ScanTarget, Scanner};
use whoshome_core::{address, config, OutputMode, WatchedDevice};

#[derive(Parser)]
#[command(name = "whoshome")]
#[command(version)]
#[command(about = "Presence detection daemon for a single LAN segment")]
#[command(long_about = "
whoshome periodically sweeps the local network and reports, for every
watched device, whether it is home or away. A device is only reported
away after it has missed a whole window of consecutive scans.

Quick start:
  1. Find your devices:   sudo whoshome scan
  2. List them in ~/.config/whoshome/config.toml (see: whoshome config)
  3. Start watching:      sudo whoshome watch wlan0 -o both -f /var/lib/whoshome/status
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file (default: ~/.config/whoshome/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch the configured devices until interrupted
    Watch {
        /// Interface name or IPv4 CIDR range to sweep
        target: Option<ScanTarget>,

        /// Status files to write besides the console: none, text, structured or both
        #[arg(short = 'o', long)]
        output_mode: Option<OutputMode>,

        /// Output filename (.txt for text, .json for structured, a base name for both)
        #[arg(short = 'f', long)]
        output_file: Option<PathBuf>,

        /// Missed cycles before a device is reported away
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
        max_cycles: Option<u32>,

        /// JSON people file with [{"name", "target"}] records
        #[arg(long)]
        people: Option<PathBuf>,
    },

    /// Run one sweep and list every device that answered
    Scan {
        /// Interface name or IPv4 CIDR range to sweep
        target: Option<ScanTarget>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show configuration paths, settings and the watch list
    Config {
        /// JSON people file with [{"name", "target"}] records
        #[arg(long)]
        people: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    format!("whoshome={},whoshome_core={}", log_level, log_level).into()
                }),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings =
        config::load_settings(cli.config.as_deref()).context("Failed to load settings")?;

    match cli.command {
        Commands::Watch {
            target,
            output_mode,
            output_file,
            max_cycles,
            people,
        } => {
            let options = daemon::WatchOptions {
                target,
                output_mode,
                output_file,
                max_cycles,
                people,
            };
            daemon::run_daemon(options, settings).await
        }
        Commands::Scan { target, format } => {
            // The watch list only labels results here, so a missing one is fine.
            let watched = config::resolve_watch_list(None, &settings)
                .map(|list| list.devices)
                .unwrap_or_default();
            cmd_scan(target.or(settings.target), &watched, format).await
        }
        Commands::Config { people, format } => cmd_config(&settings, people, format),
    }
}

/// Use the given target, or the interface carrying the default route.
pub(crate) async fn target_or_default(target: Option<ScanTarget>) -> Result<ScanTarget> {
    match target {
        Some(target) => Ok(target),
        None => {
            let interface = scanner::target::default_interface()
                .await
                .context("No scan target given and no default interface found")?;
            tracing::info!("Using default interface {}", interface);
            Ok(ScanTarget::Interface(interface))
        }
    }
}

/// Name of the first watched device this hardware address matches.
fn watched_name<'a>(mac: &str, watched: &'a [WatchedDevice]) -> Option<&'a str> {
    watched
        .iter()
        .find(|d| address::matches(mac, d.address_key.as_str()))
        .map(|d| d.name.as_str())
}

async fn cmd_scan(
    target: Option<ScanTarget>,
    watched: &[WatchedDevice],
    format: OutputFormat,
) -> Result<()> {
    let target = target_or_default(target).await?;

    match format {
        OutputFormat::Text => println!("Scanning {}...", target),
        OutputFormat::Json => {}
    }

    let scanner = scanner::NeighborScanner::detect().await;
    if scanner.capabilities().mode == privileges::ScanMode::Limited {
        eprintln!("{}", privileges::format_capabilities_message(scanner.capabilities()));
    }

    let mut responders = scanner.scan(&target).await.context("Scan failed")?;
    responders.sort_by_key(|r| r.ip);

    match format {
        OutputFormat::Text => {
            println!();
            println!("Found {} devices:", responders.len());
            println!();
            for responder in &responders {
                let key = whoshome_core::normalize(&responder.mac)
                    .map(|k| k.to_string())
                    .unwrap_or_else(|_| "-".to_string());
                let vendor = if oui::is_locally_administered(&responder.mac) {
                    "(randomized address)".to_string()
                } else {
                    oui::lookup_vendor(&responder.mac).unwrap_or_default()
                };
                let label = watched_name(&responder.mac, watched)
                    .map(|name| format!("  [{}]", name))
                    .unwrap_or_default();
                println!(
                    "  {:15} {}  {}  {}{}",
                    responder.ip, responder.mac, key, vendor, label
                );
            }
        }
        OutputFormat::Json => {
            let devices: Vec<_> = responders
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "ip": r.ip,
                        "mac": r.mac,
                        "target": whoshome_core::normalize(&r.mac).ok(),
                        "vendor": oui::lookup_vendor(&r.mac),
                        "randomized": oui::is_locally_administered(&r.mac),
                        "watched": watched_name(&r.mac, watched),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::json!({
                    "target": target.to_string(),
                    "scanned_at": chrono::Utc::now().to_rfc3339(),
                    "devices": devices,
                })
            );
        }
    }

    Ok(())
}

fn cmd_config(
    settings: &config::Settings,
    people: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let watch_list = config::resolve_watch_list(people.as_deref(), settings);
    let settings_file = settings
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(config::config_file_path_string);
    let target = settings
        .target
        .as_ref()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "(default route interface)".to_string());

    match format {
        OutputFormat::Text => {
            println!("Configuration");
            println!("=============");
            println!();
            println!("Settings file:  {} (from {})", settings_file, settings.source);
            println!("Scan target:    {}", target);
            println!("Max cycles:     {}", settings.max_cycles);
            println!("Output mode:    {}", settings.output_mode);
            if let Some(ref path) = settings.output_path {
                println!("Output file:    {}", path.display());
            }
            println!();
            match &watch_list {
                Ok(list) => {
                    println!("Watched devices (from {}):", list.origin);
                    for device in &list.devices {
                        println!("  {:20} {}", device.name, device.address_key);
                    }
                }
                Err(e) => println!("Watched devices: {}", e),
            }
            println!();
            println!("Environment variables:");
            println!("  {} - Override settings file", config::ENV_CONFIG);
            println!("  {} - JSON people file", config::ENV_PEOPLE);
            println!();
            println!("Example config.toml:");
            println!();
            println!("{}", config::generate_example_config());
        }
        OutputFormat::Json => {
            let (devices, error) = match &watch_list {
                Ok(list) => (
                    list.devices
                        .iter()
                        .map(|d| serde_json::json!({ "name": d.name, "target": d.address_key }))
                        .collect::<Vec<_>>(),
                    None,
                ),
                Err(e) => (Vec::new(), Some(e.to_string())),
            };
            println!(
                "{}",
                serde_json::json!({
                    "settings_file": settings_file,
                    "settings_source": settings.source.to_string(),
                    "target": settings.target.as_ref().map(|t| t.to_string()),
                    "max_cycles": settings.max_cycles,
                    "output_mode": settings.output_mode,
                    "output_file": settings.output_path,
                    "devices": devices,
                    "watch_list_error": error,
                })
            );
        }
    }

    Ok(())
}
