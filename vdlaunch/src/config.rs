//! Launch-time configuration.
//!
//! A read-only per-instance settings value handed to feature construction.
//! Nothing in the orchestration core mutates it.

use crate::pipeline::ExecutionMode;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use vdlaunch_shared::errors::{VdError, VdResult};

const MAX_DISPLAY_DIMENSION: u32 = 8192;

/// Kind of virtual input device exposed to the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputDeviceKind {
    Touchscreen,
    Keyboard,
    Rotary,
    Mouse,
    Switches,
    Touchpad,
}

impl InputDeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputDeviceKind::Touchscreen => "touchscreen",
            InputDeviceKind::Keyboard => "keyboard",
            InputDeviceKind::Rotary => "rotary",
            InputDeviceKind::Mouse => "mouse",
            InputDeviceKind::Switches => "switches",
            InputDeviceKind::Touchpad => "touchpad",
        }
    }

    /// Touch surfaces may be listed once per display; every other kind once.
    pub fn allows_multiple(&self) -> bool {
        matches!(self, InputDeviceKind::Touchscreen | InputDeviceKind::Touchpad)
    }
}

impl std::fmt::Display for InputDeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputOptions {
    pub enabled: bool,
    pub devices: Vec<InputDeviceKind>,
    /// Create a channel the guest uses to report input device status.
    pub status_channel: bool,
}

impl Default for InputOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            devices: vec![InputDeviceKind::Touchscreen, InputDeviceKind::Keyboard],
            status_channel: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootOptions {
    pub enabled: bool,
    /// Suffix of the kernel image in the build-artifact manifest.
    pub kernel_suffix: String,
    /// Suffix of the initramfs in the build-artifact manifest.
    pub initrd_suffix: Option<String>,
    /// Explicit kernel path; bypasses the manifest lookup.
    pub kernel_path: Option<PathBuf>,
}

impl Default for BootOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            kernel_suffix: "kernel".to_string(),
            initrd_suffix: Some("initramfs.img".to_string()),
            kernel_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    pub enabled: bool,
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
    pub refresh_rate_hz: u32,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 720,
            height: 1280,
            dpi: 320,
            refresh_rate_hz: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleOptions {
    pub enabled: bool,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Per-instance launch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfig {
    pub instance_name: String,
    /// Instance home directory. Must be absolute.
    pub home_dir: PathBuf,
    #[serde(default)]
    pub execution: ExecutionMode,
    #[serde(default)]
    pub input: InputOptions,
    #[serde(default)]
    pub boot: BootOptions,
    #[serde(default)]
    pub display: DisplayOptions,
    #[serde(default)]
    pub console: ConsoleOptions,
}

impl LaunchConfig {
    /// Configuration with every subsystem at its defaults.
    pub fn new(instance_name: impl Into<String>, home_dir: impl Into<PathBuf>) -> Self {
        Self {
            instance_name: instance_name.into(),
            home_dir: home_dir.into(),
            execution: ExecutionMode::default(),
            input: InputOptions::default(),
            boot: BootOptions::default(),
            display: DisplayOptions::default(),
            console: ConsoleOptions::default(),
        }
    }

    /// Read and validate a JSON configuration file.
    pub fn load(path: &Path) -> VdResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VdError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: LaunchConfig = serde_json::from_str(&content)?;
        config.sanitize()?;
        Ok(config)
    }

    /// Validate settings before any feature is constructed.
    pub fn sanitize(&self) -> VdResult<()> {
        if self.instance_name.is_empty()
            || !self
                .instance_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(VdError::Config(format!(
                "instance name must be non-empty and use [A-Za-z0-9_-], got '{}'",
                self.instance_name
            )));
        }

        if !self.home_dir.is_absolute() {
            return Err(VdError::Config(format!(
                "home_dir must be absolute path, got: {}",
                self.home_dir.display()
            )));
        }

        if let ExecutionMode::Parallel { max_parallel } = self.execution
            && max_parallel == 0
        {
            return Err(VdError::Config("max_parallel must be at least 1".into()));
        }

        if self.display.enabled {
            let display = &self.display;
            for (field, value) in [("width", display.width), ("height", display.height)] {
                if value == 0 || value > MAX_DISPLAY_DIMENSION {
                    return Err(VdError::Config(format!(
                        "display {} must be within 1..={}, got {}",
                        field, MAX_DISPLAY_DIMENSION, value
                    )));
                }
            }
            if display.dpi == 0 || display.refresh_rate_hz == 0 {
                return Err(VdError::Config(
                    "display dpi and refresh rate must be positive".into(),
                ));
            }
        }

        if self.input.enabled {
            let mut seen = HashSet::new();
            for device in &self.input.devices {
                if !device.allows_multiple() && !seen.insert(device) {
                    return Err(VdError::Config(format!(
                        "input device '{}' listed more than once",
                        device
                    )));
                }
            }
        }

        if self.boot.enabled && self.boot.kernel_path.is_none() && self.boot.kernel_suffix.is_empty()
        {
            return Err(VdError::Config(
                "boot needs either kernel_path or kernel_suffix".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LaunchConfig {
        LaunchConfig::new("cvd-1", "/var/lib/vdlaunch/cvd-1")
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(config().sanitize().is_ok());
    }

    #[test]
    fn test_relative_home_rejected() {
        let mut config = config();
        config.home_dir = PathBuf::from("relative/home");
        let err = config.sanitize().unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn test_bad_instance_name_rejected() {
        let mut config = config();
        config.instance_name = "cvd 1".into();
        assert!(config.sanitize().is_err());
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        let mut config = config();
        config.execution = ExecutionMode::parallel(0);
        assert!(config.sanitize().is_err());
    }

    #[test]
    fn test_display_geometry_checked_only_when_enabled() {
        let mut config = config();
        config.display.width = 0;
        assert!(config.sanitize().is_err());

        config.display.enabled = false;
        assert!(config.sanitize().is_ok());
    }

    #[test]
    fn test_duplicate_input_device_rejected() {
        let mut config = config();
        config.input.devices = vec![InputDeviceKind::Keyboard, InputDeviceKind::Keyboard];
        let err = config.sanitize().unwrap_err();
        assert!(err.to_string().contains("keyboard"));
    }

    #[test]
    fn test_repeated_touch_surfaces_allowed() {
        let mut config = config();
        config.input.devices = vec![
            InputDeviceKind::Touchscreen,
            InputDeviceKind::Touchscreen,
            InputDeviceKind::Touchpad,
            InputDeviceKind::Touchpad,
            InputDeviceKind::Switches,
        ];
        assert!(config.sanitize().is_ok());

        config.input.devices.push(InputDeviceKind::Switches);
        let err = config.sanitize().unwrap_err();
        assert!(err.to_string().contains("switches"));
    }

    #[test]
    fn test_load_fills_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("launch.json");
        std::fs::write(
            &path,
            r#"{
                "instance_name": "cvd-2",
                "home_dir": "/tmp/cvd-2",
                "execution": {"mode": "parallel", "max_parallel": 2},
                "display": {"enabled": false}
            }"#,
        )
        .unwrap();

        let config = LaunchConfig::load(&path).unwrap();
        assert_eq!(config.execution, ExecutionMode::parallel(2));
        assert!(!config.display.enabled);
        assert_eq!(config.display.width, 720);
        assert_eq!(config.input, InputOptions::default());
    }

    #[test]
    fn test_load_missing_file() {
        let err = LaunchConfig::load(Path::new("/nonexistent/launch.json")).unwrap_err();
        assert!(matches!(err, VdError::Config(_)));
    }
}
