//! Tracking state machine: who owns the orientation target right now.
//!
//! ```text
//!            pointer move (never enabled)
//!   Idle ───────────────────────────────────────► Mouse
//!    │  enable                                     │ ▲
//!    ▼                                             │ │ grace expired /
//!  Searching ◄──── empty frame (within grace) ──── │ │ camera error /
//!    │  hand                                       │ │ disabled
//!    ▼                        enable ──────────────┘ │
//!  Detected ─────────────────────────────────────────┘
//! ```
//!
//! The grace period is measured on the wall clock from the last frame that
//! contained a hand (or from the moment tracking was enabled), so the
//! fallback fires the same way at 5 fps and at 60 fps.  It is checked both
//! on empty frames and on every render tick; a provider that stops calling
//! back entirely still cannot leave the machine stuck in `Searching`.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(1000);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackingState {
    /// Nothing has happened yet.
    Idle,
    /// Camera on, waiting for a hand.
    Searching,
    /// A hand is in view; landmarks own the target.
    Detected,
    /// Pointer owns the target.
    Mouse,
}

impl TrackingState {
    pub fn label(&self) -> &'static str {
        match self {
            TrackingState::Idle      => "idle",
            TrackingState::Searching => "searching",
            TrackingState::Detected  => "detected",
            TrackingState::Mouse     => "mouse",
        }
    }
}

impl fmt::Display for TrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inputs that can move the machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackingEvent {
    PointerMoved,
    /// Camera tracking switched on (session acquired).
    Enabled,
    /// Camera tracking switched off by the user.
    Disabled,
    /// A provider callback; `hand` is false for an empty result.
    Frame { hand: bool },
    /// Camera or provider failure.
    CameraFailed,
    /// Render-frame clock tick.
    Tick,
}

#[derive(Debug)]
pub struct TrackingMachine {
    state:     TrackingState,
    grace:     Duration,
    /// Last time a hand was seen, or when tracking was enabled.
    last_seen: Option<Instant>,
    enabled:   bool,
    ever_enabled: bool,
}

impl Default for TrackingMachine {
    fn default() -> Self {
        TrackingMachine::new(DEFAULT_GRACE_PERIOD)
    }
}

impl TrackingMachine {
    pub fn new(grace: Duration) -> Self {
        TrackingMachine {
            state:        TrackingState::Idle,
            grace,
            last_seen:    None,
            enabled:      false,
            ever_enabled: false,
        }
    }

    pub fn state(&self) -> TrackingState { self.state }
    pub fn is_enabled(&self) -> bool     { self.enabled }
    pub fn grace(&self) -> Duration      { self.grace }

    /// True when the pointer is allowed to write the orientation target.
    pub fn pointer_owns_target(&self) -> bool {
        self.state != TrackingState::Detected
    }

    /// Apply one event.  Returns the new state if it changed.
    pub fn apply(&mut self, event: TrackingEvent, now: Instant) -> Option<TrackingState> {
        use TrackingEvent as E;
        use TrackingState as S;

        let next = match (self.state, event) {
            (S::Idle, E::PointerMoved) if !self.ever_enabled => S::Mouse,
            (s, E::PointerMoved) => s,

            // Already tracking: keep the current hand state.
            (s @ (S::Searching | S::Detected), E::Enabled) => s,
            (_, E::Enabled) => {
                self.enabled      = true;
                self.ever_enabled = true;
                self.last_seen    = Some(now);
                S::Searching
            }

            (S::Idle, E::Disabled) => S::Idle,
            (_, E::Disabled) => {
                self.enabled = false;
                S::Mouse
            }

            (_, E::CameraFailed) => {
                self.enabled = false;
                S::Mouse
            }

            // Frames only matter while the camera is on.
            (s, E::Frame { .. }) if !self.enabled => s,
            (_, E::Frame { hand: true }) => {
                self.last_seen = Some(now);
                S::Detected
            }
            (S::Mouse, E::Frame { hand: false }) => S::Mouse,
            (S::Searching | S::Detected, E::Frame { hand: false }) => {
                if self.grace_expired(now) { S::Mouse } else { S::Searching }
            }
            (S::Idle, E::Frame { hand: false }) => S::Idle,

            (S::Searching | S::Detected, E::Tick) if self.grace_expired(now) => S::Mouse,
            (s, E::Tick) => s,
        };

        if next == self.state {
            return None;
        }
        debug!(from = %self.state, to = %next, ?event, "tracking transition");
        self.state = next;
        Some(next)
    }

    fn grace_expired(&self, now: Instant) -> bool {
        match self.last_seen {
            Some(t) => now.saturating_duration_since(t) > self.grace,
            None    => true,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    const ALL_EVENTS: [TrackingEvent; 7] = [
        TrackingEvent::PointerMoved,
        TrackingEvent::Enabled,
        TrackingEvent::Disabled,
        TrackingEvent::Frame { hand: true },
        TrackingEvent::Frame { hand: false },
        TrackingEvent::CameraFailed,
        TrackingEvent::Tick,
    ];

    #[test]
    fn starts_idle() {
        assert_eq!(TrackingMachine::default().state(), TrackingState::Idle);
    }

    #[test]
    fn first_pointer_move_goes_to_mouse() {
        let t0 = Instant::now();
        let mut m = TrackingMachine::default();
        assert_eq!(m.apply(TrackingEvent::PointerMoved, t0), Some(TrackingState::Mouse));
        assert_eq!(m.apply(TrackingEvent::PointerMoved, t0), None);
    }

    #[test]
    fn enable_then_hand_detects() {
        let t0 = Instant::now();
        let mut m = TrackingMachine::default();
        m.apply(TrackingEvent::Enabled, t0);
        assert_eq!(m.state(), TrackingState::Searching);
        m.apply(TrackingEvent::Frame { hand: true }, t0 + ms(30));
        assert_eq!(m.state(), TrackingState::Detected);
        assert!(!m.pointer_owns_target());
    }

    #[test]
    fn brief_miss_returns_to_searching() {
        let t0 = Instant::now();
        let mut m = TrackingMachine::default();
        m.apply(TrackingEvent::Enabled, t0);
        m.apply(TrackingEvent::Frame { hand: true }, t0);
        m.apply(TrackingEvent::Frame { hand: false }, t0 + ms(300));
        assert_eq!(m.state(), TrackingState::Searching);
        // hand back → detected again
        m.apply(TrackingEvent::Frame { hand: true }, t0 + ms(400));
        assert_eq!(m.state(), TrackingState::Detected);
    }

    #[test]
    fn long_miss_falls_back_to_mouse() {
        let t0 = Instant::now();
        let mut m = TrackingMachine::default();
        m.apply(TrackingEvent::Enabled, t0);
        m.apply(TrackingEvent::Frame { hand: true }, t0);
        m.apply(TrackingEvent::Frame { hand: false }, t0 + ms(500));
        m.apply(TrackingEvent::Frame { hand: false }, t0 + ms(1001));
        assert_eq!(m.state(), TrackingState::Mouse);
        // camera still on
        assert!(m.is_enabled());
    }

    #[test]
    fn tick_alone_escapes_searching() {
        // provider never calls back
        let t0 = Instant::now();
        let mut m = TrackingMachine::default();
        m.apply(TrackingEvent::Enabled, t0);
        m.apply(TrackingEvent::Tick, t0 + ms(999));
        assert_eq!(m.state(), TrackingState::Searching);
        m.apply(TrackingEvent::Tick, t0 + ms(1200));
        assert_eq!(m.state(), TrackingState::Mouse);
    }

    #[test]
    fn grace_is_wall_clock_not_frame_count() {
        // Many empty frames inside the window do not trigger the fallback.
        let t0 = Instant::now();
        let mut m = TrackingMachine::default();
        m.apply(TrackingEvent::Enabled, t0);
        for i in 0..500 {
            m.apply(TrackingEvent::Frame { hand: false }, t0 + ms(i));
        }
        assert_eq!(m.state(), TrackingState::Searching);
        // One slow frame past the window does.
        m.apply(TrackingEvent::Frame { hand: false }, t0 + ms(1500));
        assert_eq!(m.state(), TrackingState::Mouse);
    }

    #[test]
    fn hand_reacquired_from_mouse_while_enabled() {
        let t0 = Instant::now();
        let mut m = TrackingMachine::default();
        m.apply(TrackingEvent::Enabled, t0);
        m.apply(TrackingEvent::Tick, t0 + ms(2000));
        assert_eq!(m.state(), TrackingState::Mouse);
        m.apply(TrackingEvent::Frame { hand: true }, t0 + ms(2100));
        assert_eq!(m.state(), TrackingState::Detected);
    }

    #[test]
    fn camera_failure_forces_mouse_from_any_state() {
        let t0 = Instant::now();
        for setup in [vec![], vec![TrackingEvent::Enabled],
                      vec![TrackingEvent::Enabled, TrackingEvent::Frame { hand: true }]] {
            let mut m = TrackingMachine::default();
            for e in setup { m.apply(e, t0); }
            m.apply(TrackingEvent::CameraFailed, t0);
            assert_eq!(m.state(), TrackingState::Mouse);
            assert!(!m.is_enabled());
        }
    }

    #[test]
    fn re_enable_while_tracking_keeps_state() {
        let t0 = Instant::now();
        let mut m = TrackingMachine::default();
        m.apply(TrackingEvent::Enabled, t0);
        m.apply(TrackingEvent::Frame { hand: true }, t0);
        assert_eq!(m.apply(TrackingEvent::Enabled, t0 + ms(10)), None);
        assert_eq!(m.state(), TrackingState::Detected);
    }

    #[test]
    fn frames_ignored_when_disabled() {
        let t0 = Instant::now();
        let mut m = TrackingMachine::default();
        m.apply(TrackingEvent::PointerMoved, t0);
        assert_eq!(m.apply(TrackingEvent::Frame { hand: true }, t0), None);
        assert_eq!(m.state(), TrackingState::Mouse);
    }

    #[test]
    fn disable_hands_control_to_pointer() {
        let t0 = Instant::now();
        let mut m = TrackingMachine::default();
        m.apply(TrackingEvent::Enabled, t0);
        m.apply(TrackingEvent::Frame { hand: true }, t0);
        m.apply(TrackingEvent::Disabled, t0);
        assert_eq!(m.state(), TrackingState::Mouse);
        assert!(m.pointer_owns_target());
    }

    #[test]
    fn every_state_accepts_every_event() {
        // Totality: drive each reachable state through each event.
        let t0 = Instant::now();
        let setups: Vec<Vec<TrackingEvent>> = vec![
            vec![],
            vec![TrackingEvent::Enabled],
            vec![TrackingEvent::Enabled, TrackingEvent::Frame { hand: true }],
            vec![TrackingEvent::PointerMoved],
        ];
        for setup in &setups {
            for ev in ALL_EVENTS {
                let mut m = TrackingMachine::default();
                for e in setup { m.apply(*e, t0); }
                m.apply(ev, t0 + ms(10));
                // pointer never owns the target while a hand is detected
                assert_eq!(
                    m.pointer_owns_target(),
                    m.state() != TrackingState::Detected
                );
            }
        }
    }

    #[test]
    fn no_detection_always_ends_in_mouse_after_enable() {
        let t0 = Instant::now();
        for setup in [vec![TrackingEvent::PointerMoved], vec![]] {
            let mut m = TrackingMachine::default();
            for e in setup { m.apply(e, t0); }
            m.apply(TrackingEvent::Enabled, t0);
            let mut t = t0;
            while t < t0 + ms(1100) {
                t += ms(33);
                m.apply(TrackingEvent::Frame { hand: false }, t);
            }
            assert_eq!(m.state(), TrackingState::Mouse);
        }
    }
}
