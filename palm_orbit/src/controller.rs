//! Controller: the single owner of tracking mode, orientation and scale.
//!
//! Adapters never write state.  They hand over [`ControlEvent`]s, which
//! queue up and are applied in arrival order inside [`Controller::update`],
//! the one per-frame step.  Which path may write the orientation target is
//! decided there, from the tracking state, in one place:
//!
//! * `Detected` → only landmarks write the target;
//! * any other state → only the pointer writes it, and a pointer press
//!   fires the explode effect.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::TrackingError;
use crate::gesture::classify;
use crate::landmarks::LandmarkSet;
use crate::motion::{MotionConfig, MotionIntegrator, Pose};
use crate::pointer::{pointer_target, PointerEvent};
use crate::tracking::{TrackingEvent, TrackingMachine, TrackingState};

/// Everything the adapters can report.
#[derive(Clone, Debug)]
pub enum ControlEvent {
    /// One provider callback (zero or one hand).
    Detection(Option<LandmarkSet>),
    Pointer(PointerEvent),
    TrackingEnabled,
    TrackingDisabled,
    TrackingFailed(TrackingError),
}

/// Which adapter wrote the orientation target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetSource {
    Landmarks,
    Pointer,
}

/// Readout for the status bar.
#[derive(Clone, Debug, PartialEq)]
pub struct Status {
    pub state:     TrackingState,
    pub exploding: bool,
    /// Non-blocking error notice; cleared by [`Controller::dismiss_message`].
    pub message:   Option<String>,
}

impl Status {
    pub fn summary(&self) -> String {
        let mut s = format!("mode: {}", self.state);
        if self.exploding {
            s.push_str("  burst!");
        }
        s
    }
}

pub struct Controller {
    machine:       TrackingMachine,
    motion:        MotionIntegrator,
    feed_mirrored: bool,
    queue:         VecDeque<(ControlEvent, Instant)>,
    message:       Option<String>,
    last_writer:   Option<TargetSource>,
    last_pose:     Option<Pose>,
}

impl Controller {
    pub fn new(grace: Duration, motion: MotionConfig, feed_mirrored: bool, now: Instant) -> Self {
        Controller {
            machine:     TrackingMachine::new(grace),
            motion:      MotionIntegrator::new(motion, now),
            feed_mirrored,
            queue:       VecDeque::new(),
            message:     None,
            last_writer: None,
            last_pose:   None,
        }
    }

    /// Queue an event observed at `at`.  Applied on the next `update`.
    pub fn push(&mut self, event: ControlEvent, at: Instant) {
        self.queue.push_back((event, at));
    }

    /// The per-frame step: apply queued events, run the grace check, advance
    /// the integrator.
    pub fn update(&mut self, now: Instant) -> Pose {
        while let Some((event, at)) = self.queue.pop_front() {
            self.apply(event, at);
        }
        self.transition(TrackingEvent::Tick, now);
        let pose = self.motion.step(now);
        self.last_pose = Some(pose);
        pose
    }

    fn apply(&mut self, event: ControlEvent, at: Instant) {
        match event {
            ControlEvent::Detection(Some(hand)) => {
                self.transition(TrackingEvent::Frame { hand: true }, at);
                if self.machine.state() != TrackingState::Detected {
                    return;
                }
                let reading = classify(&hand, self.feed_mirrored);
                self.motion.set_target(reading.orientation());
                self.last_writer = Some(TargetSource::Landmarks);
                if reading.open_palm {
                    self.motion.trigger_explode(at);
                }
            }
            ControlEvent::Detection(None) => {
                self.transition(TrackingEvent::Frame { hand: false }, at);
            }
            ControlEvent::Pointer(PointerEvent::Moved { x, y }) => {
                self.transition(TrackingEvent::PointerMoved, at);
                if self.machine.pointer_owns_target() {
                    self.motion.set_target(pointer_target(x, y));
                    self.last_writer = Some(TargetSource::Pointer);
                }
            }
            ControlEvent::Pointer(PointerEvent::Pressed) => {
                if self.machine.pointer_owns_target() {
                    self.motion.trigger_explode(at);
                }
            }
            ControlEvent::TrackingEnabled => {
                self.message = None;
                self.transition(TrackingEvent::Enabled, at);
            }
            ControlEvent::TrackingDisabled => {
                self.transition(TrackingEvent::Disabled, at);
            }
            ControlEvent::TrackingFailed(err) => {
                warn!(error = %err, "tracking unavailable, using pointer");
                self.message = Some(err.status_text());
                self.transition(TrackingEvent::CameraFailed, at);
            }
        }
    }

    fn transition(&mut self, event: TrackingEvent, at: Instant) {
        if let Some(state) = self.machine.apply(event, at) {
            if state == TrackingState::Mouse && event == TrackingEvent::Tick {
                info!("no hand for {:?}, falling back to pointer", self.machine.grace());
            } else {
                debug!(%state, "tracking state changed");
            }
        }
    }

    pub fn dismiss_message(&mut self) {
        self.message = None;
    }

    pub fn status(&self) -> Status {
        Status {
            state:     self.machine.state(),
            exploding: self.motion.explode().is_active(),
            message:   self.message.clone(),
        }
    }

    pub fn state(&self) -> TrackingState           { self.machine.state() }
    pub fn tracking_enabled(&self) -> bool         { self.machine.is_enabled() }
    pub fn motion(&self) -> &MotionIntegrator      { &self.motion }
    pub fn last_writer(&self) -> Option<TargetSource> { self.last_writer }
    pub fn last_pose(&self) -> Option<Pose>        { self.last_pose }
    pub fn pending(&self) -> usize                 { self.queue.len() }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{synthetic_hand, HandPose};
    use crate::tracking::DEFAULT_GRACE_PERIOD;

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    fn controller(t0: Instant) -> Controller {
        Controller::new(DEFAULT_GRACE_PERIOD, MotionConfig::default(), true, t0)
    }

    fn fist(wrist: (f32, f32)) -> Option<LandmarkSet> {
        Some(synthetic_hand(&HandPose { wrist, extended: [false; 5] }))
    }

    #[test]
    fn events_wait_for_update() {
        let t0 = Instant::now();
        let mut c = controller(t0);
        c.push(ControlEvent::Pointer(PointerEvent::Moved { x: 0.75, y: 0.5 }), t0);
        assert_eq!(c.state(), TrackingState::Idle);
        assert_eq!(c.pending(), 1);
        c.update(t0);
        assert_eq!(c.state(), TrackingState::Mouse);
        assert_eq!(c.pending(), 0);
    }

    #[test]
    fn pointer_ignored_while_hand_detected() {
        let t0 = Instant::now();
        let mut c = controller(t0);
        c.push(ControlEvent::TrackingEnabled, t0);
        c.push(ControlEvent::Detection(fist((0.25, 0.5))), t0);
        c.push(ControlEvent::Pointer(PointerEvent::Moved { x: 0.9, y: 0.9 }), t0);
        c.push(ControlEvent::Pointer(PointerEvent::Pressed), t0);
        c.update(t0);
        assert_eq!(c.state(), TrackingState::Detected);
        assert_eq!(c.last_writer(), Some(TargetSource::Landmarks));
        // target came from the wrist, not the pointer
        let t = c.motion().target();
        assert!((t.yaw - (0.25 - 0.5) * 2.0 * std::f32::consts::PI).abs() < 1e-5);
        assert!(!c.status().exploding);
    }

    #[test]
    fn pointer_press_explodes_when_not_detected() {
        let t0 = Instant::now();
        let mut c = controller(t0);
        c.push(ControlEvent::Pointer(PointerEvent::Pressed), t0);
        c.update(t0);
        assert!(c.status().exploding);
    }

    #[test]
    fn open_palm_triggers_explode() {
        let t0 = Instant::now();
        let mut c = controller(t0);
        c.push(ControlEvent::TrackingEnabled, t0);
        c.push(ControlEvent::Detection(Some(synthetic_hand(&HandPose::open((0.5, 0.5))))), t0);
        c.update(t0);
        assert!(c.status().exploding);
        c.update(t0 + ms(501));
        assert!(!c.status().exploding);
    }

    #[test]
    fn failure_sets_message_until_dismissed() {
        let t0 = Instant::now();
        let mut c = controller(t0);
        c.push(ControlEvent::TrackingFailed(TrackingError::PermissionDenied), t0);
        c.update(t0);
        let s = c.status();
        assert_eq!(s.state, TrackingState::Mouse);
        assert!(s.message.is_some());
        c.dismiss_message();
        assert!(c.status().message.is_none());
    }

    #[test]
    fn lost_hand_returns_target_to_pointer() {
        let t0 = Instant::now();
        let mut c = controller(t0);
        c.push(ControlEvent::TrackingEnabled, t0);
        c.push(ControlEvent::Detection(fist((0.5, 0.5))), t0);
        c.update(t0);
        c.push(ControlEvent::Detection(None), t0 + ms(100));
        c.update(t0 + ms(1200));
        assert_eq!(c.state(), TrackingState::Mouse);
        c.push(ControlEvent::Pointer(PointerEvent::Moved { x: 0.1, y: 0.1 }), t0 + ms(1210));
        c.update(t0 + ms(1216));
        assert_eq!(c.last_writer(), Some(TargetSource::Pointer));
    }

    #[test]
    fn status_summary_reads_mode() {
        let s = Status { state: TrackingState::Searching, exploding: true, message: None };
        assert_eq!(s.summary(), "mode: searching  burst!");
    }
}
