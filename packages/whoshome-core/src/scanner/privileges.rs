//! Privilege detection for network scanning
//!
//! The sweep relies on the system `ping`, which needs either root,
//! CAP_NET_RAW or a setuid binary. Without it the scanner falls back to
//! whatever the kernel neighbour table already knows.

use serde::{Deserialize, Serialize};

/// Scan mode indicating the level of access available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Ping sweep and neighbour table
    Full,
    /// Neighbour table only
    Limited,
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanMode::Full => write!(f, "full"),
            ScanMode::Limited => write!(f, "limited"),
        }
    }
}

/// Information about scan capabilities based on current privileges
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanCapabilities {
    pub mode: ScanMode,
    pub can_ping: bool,
    pub is_elevated: bool,
    pub warning: Option<String>,
    pub elevation_instructions: Option<String>,
}

impl Default for ScanCapabilities {
    fn default() -> Self {
        Self {
            mode: ScanMode::Full,
            can_ping: true,
            is_elevated: false,
            warning: None,
            elevation_instructions: None,
        }
    }
}

/// Check if the current process is running as root
pub fn is_elevated() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::geteuid() == 0 }
    }

    #[cfg(not(unix))]
    {
        false
    }
}

/// Test if ping functionality works
pub async fn test_ping_capability() -> bool {
    let result = tokio::task::spawn_blocking(|| {
        #[cfg(target_os = "linux")]
        let output = std::process::Command::new("ping")
            .args(["-c", "1", "-W", "1", "127.0.0.1"])
            .output();

        #[cfg(target_os = "macos")]
        let output = std::process::Command::new("ping")
            .args(["-c", "1", "-t", "1", "127.0.0.1"])
            .output();

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        let output: std::io::Result<std::process::Output> = Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "Unsupported",
        ));

        match output {
            Ok(o) => o.status.success(),
            Err(_) => false,
        }
    })
    .await;

    result.unwrap_or(false)
}

/// Detect scan capabilities based on current privileges
pub async fn detect_capabilities() -> ScanCapabilities {
    let elevated = is_elevated();
    let can_ping = test_ping_capability().await;

    let mode = if can_ping {
        ScanMode::Full
    } else {
        ScanMode::Limited
    };

    let (warning, elevation_instructions) = if mode == ScanMode::Limited {
        (
            Some(
                "ping sweep unavailable; only devices already in the neighbour table will be seen"
                    .to_string(),
            ),
            Some(get_elevation_instructions()),
        )
    } else {
        (None, None)
    };

    ScanCapabilities {
        mode,
        can_ping,
        is_elevated: elevated,
        warning,
        elevation_instructions,
    }
}

/// Get platform-specific instructions for running with elevated privileges
pub fn get_elevation_instructions() -> String {
    #[cfg(target_os = "linux")]
    {
        "To run with full scan capabilities on Linux:\n\
         \n\
         Option 1 - Run as root:\n\
         $ sudo whoshome watch\n\
         \n\
         Option 2 - Grant CAP_NET_RAW to the system ping:\n\
         $ sudo setcap cap_net_raw+ep /bin/ping"
            .to_string()
    }

    #[cfg(target_os = "macos")]
    {
        "To run with full scan capabilities on macOS:\n\
         \n\
         $ sudo whoshome watch"
            .to_string()
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        "Neighbour scanning is only supported on Linux and macOS.".to_string()
    }
}

/// Format a user-friendly message about current scan capabilities
pub fn format_capabilities_message(caps: &ScanCapabilities) -> String {
    if caps.mode == ScanMode::Full {
        "Scanning with full capabilities".to_string()
    } else {
        let mut msg = String::from("Scanning with limited capabilities:\n");

        if !caps.can_ping {
            msg.push_str("  - Ping sweep unavailable (will use the neighbour table only)\n");
        }

        if let Some(ref instructions) = caps.elevation_instructions {
            msg.push_str("\nTo enable full scanning:\n");
            msg.push_str(instructions);
        }

        msg
    }
}
