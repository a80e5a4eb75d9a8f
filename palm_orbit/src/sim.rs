//! Simulation mode: a bundled camera + pose provider that need no hardware.
//!
//! The camera produces blank frames at a fixed rate; the provider ignores
//! the pixels and reports a synthetic hand steered from the keyboard.  The
//! window sends [`SimInput`] events over a channel, the same way a real
//! model would see a hand move in front of the lens.
//!
//! | Key | Effect |
//! |---|---|
//! | arrows | move the wrist |
//! | `O` | toggle open palm / fist |
//! | `H` | show / hide the hand |

use std::sync::mpsc::Receiver;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TrackingError;
use crate::landmarks::{Landmark, LandmarkSet, HAND_LANDMARK_COUNT};
use crate::source::{
    CameraDevice, CameraRequest, CameraSession, PoseProvider, ProviderOptions, VideoFrame,
};

// ════════════════════════════════════════════════════════════════════════════
// Synthetic hand geometry
// ════════════════════════════════════════════════════════════════════════════

/// Pose of the synthetic hand in camera coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandPose {
    pub wrist:    (f32, f32),
    /// Thumb, index, middle, ring, pinky.
    pub extended: [bool; 5],
}

impl Default for HandPose {
    fn default() -> Self {
        HandPose { wrist: (0.5, 0.6), extended: [false; 5] }
    }
}

impl HandPose {
    pub fn open(wrist: (f32, f32)) -> Self {
        HandPose { wrist, extended: [true; 5] }
    }

    pub fn is_open(&self) -> bool {
        self.extended.iter().all(|&e| e)
    }
}

/// Build a plausible 21-point hand (thumb on the +x side, fingers up).
pub fn synthetic_hand(pose: &HandPose) -> LandmarkSet {
    let (wx, wy) = pose.wrist;
    let p = |dx: f32, dy: f32| Landmark::new(wx + dx, wy + dy, 0.0);
    let mut pts = [Landmark::default(); HAND_LANDMARK_COUNT];

    pts[0] = p(0.0, 0.0);

    // Thumb: CMC, MCP, IP, TIP
    pts[1] = p(0.04, -0.03);
    pts[2] = p(0.07, -0.06);
    pts[3] = p(0.09, -0.08);
    pts[4] = if pose.extended[0] { p(0.12, -0.09) } else { p(0.06, -0.09) };

    // Fingers: MCP x-offsets, index → pinky
    let mcp_x = [0.03_f32, 0.0, -0.03, -0.06];
    let mcp_y = -0.12_f32;
    for (f, &dx) in mcp_x.iter().enumerate() {
        let base = 5 + f * 4;
        let dy: [f32; 3] = if pose.extended[f + 1] {
            [-0.05, -0.09, -0.12]
        } else {
            // curled: tip folds back below the PIP
            [-0.04, -0.01, 0.01]
        };
        pts[base] = p(dx, mcp_y);
        for (j, off) in dy.iter().enumerate() {
            pts[base + 1 + j] = p(dx, mcp_y + off);
        }
    }

    LandmarkSet::new(pts)
}

// ════════════════════════════════════════════════════════════════════════════
// Simulated camera
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Refuse camera access, as if the user clicked "Block".
    pub deny_camera:    bool,
    /// False → provider reports "still loading".
    pub provider_ready: bool,
    pub camera_fps:     u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig { deny_camera: false, provider_ready: true, camera_fps: 30 }
    }
}

pub struct SimCamera {
    deny: bool,
    fps:  u32,
}

impl SimCamera {
    pub fn new(cfg: &SimulationConfig) -> Self {
        SimCamera { deny: cfg.deny_camera, fps: cfg.camera_fps.max(1) }
    }
}

impl CameraDevice for SimCamera {
    fn open(&mut self, request: &CameraRequest) -> Result<Box<dyn CameraSession>, TrackingError> {
        if self.deny {
            return Err(TrackingError::PermissionDenied);
        }
        let pixels = frame_len(request.width, request.height)?;
        Ok(Box::new(SimSession {
            width:    request.width,
            height:   request.height,
            pixels,
            interval: Duration::from_secs(1) / self.fps,
            next_at:  Instant::now(),
        }))
    }
}

/// Pixel count of one luma frame, computed without `u32` overflow.
fn frame_len(width: u32, height: u32) -> Result<usize, TrackingError> {
    (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| TrackingError::CameraUnavailable(format!(
            "{}x{} frame is too large", width, height
        )))
}

struct SimSession {
    width:    u32,
    height:   u32,
    pixels:   usize,
    interval: Duration,
    next_at:  Instant,
}

impl CameraSession for SimSession {
    fn next_frame(&mut self) -> Option<VideoFrame> {
        let now = Instant::now();
        if now < self.next_at {
            thread::sleep(self.next_at - now);
        }
        self.next_at += self.interval;
        Some(VideoFrame {
            width:       self.width,
            height:      self.height,
            pixels:      vec![0x80; self.pixels],
            captured_at: Instant::now(),
        })
    }

    fn release(self: Box<Self>) {}
}

// ════════════════════════════════════════════════════════════════════════════
// Simulated provider
// ════════════════════════════════════════════════════════════════════════════

/// Keyboard input forwarded from the window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimInput {
    /// Move the wrist in display space (fractions of the frame).
    Nudge { dx: f32, dy: f32 },
    ToggleOpen,
    ToggleVisible,
}

pub struct SimPoseProvider {
    rx:      Receiver<SimInput>,
    pose:    HandPose,
    visible: bool,
    ready:   bool,
    /// Display → camera: flip x when the feed is not mirrored.
    flip_x:  bool,
}

impl SimPoseProvider {
    pub fn new(rx: Receiver<SimInput>, cfg: &SimulationConfig, feed_mirrored: bool) -> Self {
        SimPoseProvider {
            rx,
            pose:    HandPose::default(),
            visible: true,
            ready:   cfg.provider_ready,
            flip_x:  !feed_mirrored,
        }
    }

    fn apply(&mut self, input: SimInput) {
        match input {
            SimInput::Nudge { dx, dy } => {
                let dx = if self.flip_x { -dx } else { dx };
                self.pose.wrist.0 = (self.pose.wrist.0 + dx).clamp(0.0, 1.0);
                self.pose.wrist.1 = (self.pose.wrist.1 + dy).clamp(0.0, 1.0);
            }
            SimInput::ToggleOpen => {
                self.pose.extended = if self.pose.is_open() { [false; 5] } else { [true; 5] };
            }
            SimInput::ToggleVisible => self.visible = !self.visible,
        }
    }
}

impl PoseProvider for SimPoseProvider {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn configure(&mut self, options: &ProviderOptions) {
        debug!(?options, "sim provider configured");
    }

    fn detect(&mut self, _frame: &VideoFrame) -> Option<LandmarkSet> {
        while let Ok(input) = self.rx.try_recv() {
            self.apply(input);
        }
        self.visible.then(|| synthetic_hand(&self.pose))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
