//! Rear-camera selection heuristic.
//!
//! Camera labels are free text reported by the platform, so the choice is
//! best effort: the first device whose label matches a rear-facing pattern,
//! otherwise the first device.

use std::path::Path;

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::error::{Error, Result};

/// Built-in patterns for rear-facing camera labels.
const REAR_PATTERNS: &[&str] = &[
    r"\bback\b",
    r"\brear\b",
    r"\benvironment\b",
    r"\btrasera\b",
    r"\btraseira\b",
];

/// The built-in rear-camera label patterns.
#[must_use]
pub fn default_rear_patterns() -> &'static [&'static str] {
    REAR_PATTERNS
}

/// A video input reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub id: String,
    pub label: String,
}

impl CameraDevice {
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Compiled set of rear-facing label patterns.
#[derive(Debug)]
pub struct CameraSelector {
    patterns: Vec<Regex>,
}

impl Default for CameraSelector {
    fn default() -> Self {
        Self {
            patterns: REAR_PATTERNS
                .iter()
                .filter_map(|p| compile(p).ok())
                .collect(),
        }
    }
}

impl CameraSelector {
    /// Compile `patterns` case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] for a pattern that does not compile.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| compile(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Whether `label` looks like a rear-facing camera.
    #[must_use]
    pub fn is_rear(&self, label: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(label))
    }

    /// Pick the camera to scan with. `None` only when `devices` is empty.
    #[must_use]
    pub fn select<'a>(&self, devices: &'a [CameraDevice]) -> Option<&'a CameraDevice> {
        let chosen = devices
            .iter()
            .find(|d| self.is_rear(&d.label))
            .or_else(|| devices.first());
        if let Some(device) = chosen {
            debug!(id = %device.id, label = %device.label, "Selected camera");
        }
        chosen
    }
}

/// [`CameraSelector::select`] with the built-in patterns.
#[must_use]
pub fn select_camera(devices: &[CameraDevice]) -> Option<&CameraDevice> {
    CameraSelector::default().select(devices)
}

/// Sysfs directory listing V4L2 capture devices on Linux.
pub const V4L_SYSFS: &str = "/sys/class/video4linux";

/// Enumerate cameras under a `video4linux` sysfs directory.
///
/// Each `videoN` entry becomes `/dev/videoN`, labelled with the contents of
/// its `name` file. A missing directory means no cameras.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be read.
pub fn discover(sysfs: &Path) -> Result<Vec<CameraDevice>> {
    let entries = match std::fs::read_dir(sysfs) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut devices = Vec::new();
    for entry in entries {
        let entry = entry?;
        let node = entry.file_name().to_string_lossy().into_owned();
        let label = std::fs::read_to_string(entry.path().join("name"))
            .map(|name| name.trim().to_string())
            .unwrap_or_else(|_| node.clone());
        devices.push(CameraDevice::new(format!("/dev/{node}"), label));
    }
    devices.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(devices)
}

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::ConfigValidation {
            message: format!("invalid camera pattern {pattern}: {e}"),
        })
}
