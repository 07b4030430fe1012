//! Immutable session configuration.
//!
//! A [`SessionConfig`] is built once (usually by the CLI's resolution chain)
//! and handed to the [`crate::lifecycle::LifecycleController`]. Nothing in
//! the library reads ambient global settings.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The iOS device family the app is built for.
///
/// The numeric value is what Xcode expects in `TARGETED_DEVICE_FAMILY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFamily {
    IPhone,
    IPad,
}

impl DeviceFamily {
    /// Value passed as `TARGETED_DEVICE_FAMILY` to the build tool.
    pub fn targeted_device_family(self) -> u8 {
        match self {
            DeviceFamily::IPhone => 1,
            DeviceFamily::IPad => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceFamily::IPhone => "iphone",
            DeviceFamily::IPad => "ipad",
        }
    }
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "iphone" => Ok(DeviceFamily::IPhone),
            "ipad" => Ok(DeviceFamily::IPad),
            other => Err(format!("unknown device family: {other:?} (expected \"iphone\" or \"ipad\")")),
        }
    }
}

/// Timing for the command/response exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Wall-clock bound for one command's response, measured from dispatch.
    pub response_timeout: Duration,
    /// Pause between two checks for the response file.
    pub poll_interval: Duration,
}

impl ChannelConfig {
    pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(25);
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            response_timeout: Self::DEFAULT_RESPONSE_TIMEOUT,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Everything the lifecycle controller needs to bring a session up and down.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// File name searched for when no project path override is given.
    pub project_file_name: String,
    /// Name of the compiled app bundle to look for after the build.
    pub app_bundle_name: String,
    /// Explicit path to the `.xcodeproj`; skips the filesystem search.
    pub project_path: Option<PathBuf>,
    /// Arguments passed to the build tool before the device family setting.
    pub build_args: Vec<String>,
    /// Instruments trace template copied into the workspace, if any.
    pub trace_template: Option<PathBuf>,
    /// Directory under which per-session workspaces are created.
    pub workspace_root: PathBuf,
    /// How many times to search for the compiled artifact.
    pub artifact_attempts: u32,
    /// Pause between two artifact searches.
    pub artifact_retry_delay: Duration,
    /// How long a graceful stop may take before the host is killed.
    pub shutdown_timeout: Duration,
    /// Leave the workspace directory on disk after the session stops.
    pub keep_workspace: bool,
    pub channel: ChannelConfig,
}

impl SessionConfig {
    pub const DEFAULT_PROJECT_FILE_NAME: &'static str = "TestApp.xcodeproj";
    pub const DEFAULT_APP_BUNDLE_NAME: &'static str = "TestApp.app";
    pub const DEFAULT_ARTIFACT_ATTEMPTS: u32 = 15;
    pub const DEFAULT_ARTIFACT_RETRY_DELAY: Duration = Duration::from_secs(2);
    pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(15);

    /// Default xcodebuild arguments for the sample app.
    pub fn default_build_args() -> Vec<String> {
        ["-sdk", "iphonesimulator", "-target", "TestApp", "-scheme", "TestApp"]
            .iter()
            .map(|s| (*s).to_owned())
            .collect()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            project_file_name: Self::DEFAULT_PROJECT_FILE_NAME.to_owned(),
            app_bundle_name: Self::DEFAULT_APP_BUNDLE_NAME.to_owned(),
            project_path: None,
            build_args: Self::default_build_args(),
            trace_template: None,
            workspace_root: std::env::temp_dir(),
            artifact_attempts: Self::DEFAULT_ARTIFACT_ATTEMPTS,
            artifact_retry_delay: Self::DEFAULT_ARTIFACT_RETRY_DELAY,
            shutdown_timeout: Self::DEFAULT_SHUTDOWN_TIMEOUT,
            keep_workspace: false,
            channel: ChannelConfig::default(),
        }
    }
}
