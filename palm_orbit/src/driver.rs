//! Render loop driver.
//!
//! One [`RenderLoop::frame`] call per display refresh: drain source events,
//! run the controller's update step, copy the pose onto the renderer's
//! mesh, draw.  The mesh handle may be missing for a frame (the window is
//! mid-resize); that frame skips the object update and keeps going.
//!
//! Turning tracking on only posts a request to the landmark source; the
//! frame that receives the source's answer reports `TrackingEnabled` or
//! `TrackingFailed` to the controller.  Drawing never waits on the camera.
//!
//! [`RenderLoop::shutdown`] stops rescheduling and tears down the landmark
//! source (worker stopped, camera released).  Safe to call repeatedly;
//! `Drop` calls it as well.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Instant;

use tracing::{debug, info, trace};

use crate::controller::{ControlEvent, Controller, Status};
use crate::motion::Pose;
use crate::source::{LandmarkSource, SourceEvent};

// ════════════════════════════════════════════════════════════════════════════
// SceneRenderer: the external 3D collaborator
// ════════════════════════════════════════════════════════════════════════════

/// Transform of the controlled object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshTransform {
    pub yaw:   f32,
    pub pitch: f32,
    pub scale: f32,
}

impl Default for MeshTransform {
    fn default() -> Self {
        MeshTransform { yaw: 0.0, pitch: 0.0, scale: 1.0 }
    }
}

impl MeshTransform {
    pub fn apply(&mut self, pose: &Pose) {
        self.yaw   = pose.yaw;
        self.pitch = pose.pitch;
        self.scale = pose.scale;
    }
}

pub trait SceneRenderer {
    /// The controllable object, if it currently exists.
    fn mesh_mut(&mut self) -> Option<&mut MeshTransform>;

    /// Draw scene + status readout.
    fn render(&mut self, status: &Status);

    /// False once the surface has been closed.
    fn is_open(&self) -> bool;
}

// ════════════════════════════════════════════════════════════════════════════
// RenderLoop
// ════════════════════════════════════════════════════════════════════════════

pub struct RenderLoop<R: SceneRenderer> {
    renderer:   R,
    controller: Controller,
    source:     LandmarkSource,
    events:     Receiver<SourceEvent>,
    running:    bool,
    torn_down:  bool,
    frames:     u64,
    skipped:    u64,
}

impl<R: SceneRenderer> RenderLoop<R> {
    pub fn new(
        renderer:   R,
        controller: Controller,
        source:     LandmarkSource,
        events:     Receiver<SourceEvent>,
    ) -> Self {
        RenderLoop {
            renderer,
            controller,
            source,
            events,
            running:   false,
            torn_down: false,
            frames:    0,
            skipped:   0,
        }
    }

    /// Begin scheduling frames.  Only the first call has an effect.
    pub fn start(&mut self) {
        if self.running || self.torn_down {
            return;
        }
        self.running = true;
        info!("render loop started");
    }

    pub fn is_running(&self) -> bool { self.running }

    /// Forward an input event to the controller.
    pub fn push(&mut self, event: ControlEvent, at: Instant) {
        self.controller.push(event, at);
    }

    /// Turn camera tracking on or off.  Returns without waiting for the
    /// camera.  Failures become a pointer fallback plus a status message;
    /// they never escape this call.
    pub fn set_tracking(&mut self, enable: bool, now: Instant) {
        if enable {
            if let Err(err) = self.source.enable() {
                self.controller.push(ControlEvent::TrackingFailed(err), now);
            }
        } else {
            self.source.disable();
            self.controller.push(ControlEvent::TrackingDisabled, now);
        }
    }

    pub fn toggle_tracking(&mut self, now: Instant) {
        let on = self.source.is_enabled();
        self.set_tracking(!on, now);
    }

    /// Run one frame.  Returns false once the loop should stop rescheduling.
    pub fn frame(&mut self, now: Instant) -> bool {
        if !self.running {
            return false;
        }

        loop {
            match self.events.try_recv() {
                Ok(event) => self.accept(event, now),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        if let Some(err) = self.source.check_worker() {
            self.controller.push(ControlEvent::TrackingFailed(err), now);
        }

        let pose = self.controller.update(now);
        match self.renderer.mesh_mut() {
            Some(mesh) => mesh.apply(&pose),
            None => {
                self.skipped += 1;
                trace!("mesh handle unset, skipping object update");
            }
        }
        self.renderer.render(&self.controller.status());
        self.frames += 1;

        if !self.renderer.is_open() {
            self.shutdown();
            return false;
        }
        true
    }

    fn accept(&mut self, event: SourceEvent, now: Instant) {
        match event {
            SourceEvent::Detection(d) => {
                self.controller.push(ControlEvent::Detection(d.hand), d.at);
            }
            SourceEvent::Opened { epoch } if self.source.is_current(epoch) => {
                self.controller.push(ControlEvent::TrackingEnabled, now);
            }
            SourceEvent::Failed { epoch, error } if self.source.is_current(epoch) => {
                self.source.mark_failed();
                self.controller.push(ControlEvent::TrackingFailed(error), now);
            }
            SourceEvent::Opened { epoch } | SourceEvent::Failed { epoch, .. } => {
                debug!(epoch, "dropping answer to a superseded tracking request");
            }
        }
    }

    /// Stop the loop and release the camera.  Idempotent.
    pub fn shutdown(&mut self) {
        if self.torn_down {
            return;
        }
        self.running = false;
        self.source.shutdown();
        self.torn_down = true;
        info!(frames = self.frames, skipped = self.skipped, "render loop stopped");
    }

    pub fn controller(&self) -> &Controller              { &self.controller }
    pub fn controller_mut(&mut self) -> &mut Controller  { &mut self.controller }
    pub fn renderer(&self) -> &R                         { &self.renderer }
    pub fn renderer_mut(&mut self) -> &mut R             { &mut self.renderer }
    pub fn source(&self) -> &LandmarkSource              { &self.source }
    pub fn frames(&self) -> u64                          { self.frames }
    pub fn skipped_frames(&self) -> u64                  { self.skipped }
}

impl<R: SceneRenderer> Drop for RenderLoop<R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
