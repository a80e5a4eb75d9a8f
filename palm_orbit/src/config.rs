//! Application configuration.
//!
//! Every field has a default, so a config file only needs the keys it
//! changes:
//!
//! ```json
//! { "tracking": { "grace_period_ms": 1500 },
//!   "motion":   { "rotation_smoothing": 0.2 } }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::motion::MotionConfig;
use crate::sim::SimulationConfig;
use crate::source::{CameraRequest, Facing, ProviderOptions};

/// Largest accepted camera width or height.  The landmark model works on
/// small frames; anything past this is a typo.
pub const MAX_CAMERA_DIMENSION: u32 = 4096;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// How long a hand may be missing before the pointer takes over.
    pub grace_period_ms: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        TrackingConfig { grace_period_ms: 1000 }
    }
}

impl TrackingConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub width:  u32,
    pub height: u32,
    pub facing: Facing,
    /// The feed is already a selfie mirror (no x flip needed).
    pub feed_mirrored: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let req = CameraRequest::default();
        CameraConfig {
            width:  req.width,
            height: req.height,
            facing: req.facing,
            feed_mirrored: false,
        }
    }
}

impl CameraConfig {
    pub fn request(&self) -> CameraRequest {
        CameraRequest { width: self.width, height: self.height, facing: self.facing }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width:  usize,
    pub height: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig { width: 900, height: 640 }
    }
}

/// Configuration for the full application.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tracking:   TrackingConfig,
    pub motion:     MotionConfig,
    pub camera:     CameraConfig,
    pub provider:   ProviderOptions,
    pub window:     WindowConfig,
    pub simulation: SimulationConfig,
    /// Enable camera tracking as soon as the window opens.
    pub autostart:  bool,
}

impl AppConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.motion;
        for (name, a) in [("rotation_smoothing", m.rotation_smoothing),
                          ("scale_smoothing",    m.scale_smoothing)] {
            if !(a > 0.0 && a <= 1.0) {
                return Err(ConfigError::Invalid(format!("{} must be in (0, 1], got {}", name, a)));
            }
        }
        if m.reference_fps <= 0.0 {
            return Err(ConfigError::Invalid("reference_fps must be positive".into()));
        }
        if self.tracking.grace_period_ms == 0 {
            return Err(ConfigError::Invalid("grace_period_ms must be non-zero".into()));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::Invalid("camera size must be non-zero".into()));
        }
        if self.camera.width > MAX_CAMERA_DIMENSION || self.camera.height > MAX_CAMERA_DIMENSION {
            return Err(ConfigError::Invalid(format!(
                "camera size {}x{} exceeds {} per side",
                self.camera.width, self.camera.height, MAX_CAMERA_DIMENSION
            )));
        }
        if self.provider.max_hands != 1 {
            return Err(ConfigError::Invalid(format!(
                "only single-hand tracking is supported (max_hands = {})",
                self.provider.max_hands
            )));
        }
        for (name, c) in [("min_detection_confidence", self.provider.min_detection_confidence),
                          ("min_tracking_confidence",  self.provider.min_tracking_confidence)] {
            if !(0.0..=1.0).contains(&c) {
                return Err(ConfigError::Invalid(format!("{} must be in [0, 1], got {}", name, c)));
            }
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
