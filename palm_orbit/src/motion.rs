//! Motion integrator: target → smoothed pose, once per render frame.
//!
//! Smoothing is exponential: `current += (target − current)·α`.  The α
//! values are tuned per frame at [`MotionConfig::reference_fps`]; frames of
//! other lengths use `1 − (1 − α)^(dt·fps)` so the feel does not change with
//! the display's refresh rate.
//!
//! On top of the smoothed user orientation sits a slow auto-spin driven by
//! elapsed wall-clock time, so the object never looks frozen.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::gesture::Orientation;

// ════════════════════════════════════════════════════════════════════════════
// MotionConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Per-reference-frame α for orientation.
    pub rotation_smoothing:  f32,
    /// Per-reference-frame α for scale.
    pub scale_smoothing:     f32,
    pub reference_fps:       f32,
    /// Auto-spin, radians per second.
    pub spin_yaw_rate:       f32,
    pub spin_pitch_rate:     f32,
    pub rest_scale:          f32,
    pub expanded_scale:      f32,
    pub explode_duration_ms: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        MotionConfig {
            rotation_smoothing:  0.1,
            scale_smoothing:     0.15,
            reference_fps:       60.0,
            spin_yaw_rate:       0.3,
            spin_pitch_rate:     0.12,
            rest_scale:          1.0,
            expanded_scale:      1.5,
            explode_duration_ms: 500,
        }
    }
}

impl MotionConfig {
    pub fn explode_duration(&self) -> Duration {
        Duration::from_millis(self.explode_duration_ms)
    }
}

/// Effective α for a frame of length `dt`.
///
/// Exactly `alpha` when `dt` is one reference frame; always in `[0, 1]`.
pub fn frame_alpha(alpha: f32, dt: Duration, reference_fps: f32) -> f32 {
    let frames = dt.as_secs_f32() * reference_fps;
    (1.0 - (1.0 - alpha.clamp(0.0, 1.0)).powf(frames)).clamp(0.0, 1.0)
}

fn approach(current: f32, target: f32, alpha: f32) -> f32 {
    current + (target - current) * alpha
}

// ════════════════════════════════════════════════════════════════════════════
// ExplodeEffect
// ════════════════════════════════════════════════════════════════════════════

/// One-shot "burst" on open palm / click.  Not re-armed while active.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExplodeEffect {
    expires_at: Option<Instant>,
}

impl ExplodeEffect {
    pub fn is_active(&self) -> bool {
        self.expires_at.is_some()
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Start the effect.  Returns false (and changes nothing) when it is
    /// already running.
    pub fn trigger(&mut self, now: Instant, duration: Duration) -> bool {
        if self.expires_at.is_some() {
            return false;
        }
        self.expires_at = Some(now + duration);
        true
    }

    /// Clear the effect once its time is up.
    pub fn update(&mut self, now: Instant) {
        if matches!(self.expires_at, Some(t) if now >= t) {
            self.expires_at = None;
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Pose: what the renderer receives
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    /// Rotation about the vertical axis (radians).
    pub yaw:   f32,
    /// Rotation about the horizontal axis (radians).
    pub pitch: f32,
    pub scale: f32,
}

// ════════════════════════════════════════════════════════════════════════════
// MotionIntegrator
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct MotionIntegrator {
    config:     MotionConfig,
    target:     Orientation,
    current:    Orientation,
    scale:      f32,
    explode:    ExplodeEffect,
    started_at: Instant,
    last_step:  Option<Instant>,
}

impl MotionIntegrator {
    pub fn new(config: MotionConfig, now: Instant) -> Self {
        let scale = config.rest_scale;
        MotionIntegrator {
            config,
            target:     Orientation::default(),
            current:    Orientation::default(),
            scale,
            explode:    ExplodeEffect::default(),
            started_at: now,
            last_step:  None,
        }
    }

    pub fn set_target(&mut self, target: Orientation) {
        self.target = target;
    }

    pub fn target(&self) -> Orientation        { self.target }
    pub fn current(&self) -> Orientation       { self.current }
    pub fn scale(&self) -> f32                 { self.scale }
    pub fn explode(&self) -> &ExplodeEffect    { &self.explode }
    pub fn config(&self) -> &MotionConfig      { &self.config }

    /// Fire the explode effect (debounced).
    pub fn trigger_explode(&mut self, now: Instant) -> bool {
        let fired = self.explode.trigger(now, self.config.explode_duration());
        if fired {
            debug!("explode triggered");
        }
        fired
    }

    /// Auto-spin offset at `now`.
    pub fn spin(&self, now: Instant) -> Orientation {
        let t = now.saturating_duration_since(self.started_at).as_secs_f32();
        Orientation::new(t * self.config.spin_yaw_rate, t * self.config.spin_pitch_rate)
    }

    /// Advance one render frame and return the pose to draw.
    pub fn step(&mut self, now: Instant) -> Pose {
        // First frame counts as one reference frame.
        let dt = match self.last_step {
            Some(prev) => now.saturating_duration_since(prev),
            None       => Duration::from_secs_f32(1.0 / self.config.reference_fps.max(1.0)),
        };
        self.last_step = Some(now);

        let fps     = self.config.reference_fps;
        let a_rot   = frame_alpha(self.config.rotation_smoothing, dt, fps);
        let a_scale = frame_alpha(self.config.scale_smoothing, dt, fps);

        self.current.yaw   = approach(self.current.yaw,   self.target.yaw,   a_rot);
        self.current.pitch = approach(self.current.pitch, self.target.pitch, a_rot);

        self.explode.update(now);
        let scale_target = if self.explode.is_active() {
            self.config.expanded_scale
        } else {
            self.config.rest_scale
        };
        self.scale = approach(self.scale, scale_target, a_scale);

        let spin = self.spin(now);
        Pose {
            yaw:   self.current.yaw + spin.yaw,
            pitch: self.current.pitch + spin.pitch,
            scale: self.scale,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
