//! Gesture classification: pure functions over a [`LandmarkSet`].
//!
//! Two readings come out of every detected hand:
//!
//! * the **wrist position**, which steers the object's orientation through
//!   [`orientation_from_point`] (the same mapping the pointer uses), and
//! * an **open palm** flag, the trigger for the explode effect.
//!
//! # Open palm rule
//!
//! * Index, middle, ring, pinky: extended when the tip sits above
//!   (numerically smaller `y` than) its PIP joint.
//! * Thumb: it extends sideways, so compare `x` instead.  The tip must lie
//!   further out than the IP joint, "out" meaning away from the pinky side
//!   of the hand.  This keeps the test independent of handedness and of
//!   whether the feed is mirrored.
//! * Open palm = at least [`OPEN_PALM_MIN_EXTENDED`] of 5 digits extended,
//!   which tolerates one occluded finger.

use std::f32::consts::PI;

use crate::landmarks::{LandmarkSet, FINGER_TIP_PIP, PINKY_MCP, THUMB_IP, THUMB_TIP};

pub const OPEN_PALM_MIN_EXTENDED: u8 = 4;

// ════════════════════════════════════════════════════════════════════════════
// Orientation: the shared target representation
// ════════════════════════════════════════════════════════════════════════════

/// Yaw/pitch pair in radians.  Yaw spans [-π, π], pitch [-π/2, π/2] when
/// produced from a normalised point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Orientation {
    pub yaw:   f32,
    pub pitch: f32,
}

impl Orientation {
    pub fn new(yaw: f32, pitch: f32) -> Self {
        Orientation { yaw, pitch }
    }
}

/// Map a normalised (0–1) surface point to an orientation.
///
/// `yaw = (x − 0.5)·2π`, `pitch = (y − 0.5)·π`.  Landmarks and the pointer
/// both go through here so the two control paths feel identical.
pub fn orientation_from_point(x: f32, y: f32) -> Orientation {
    Orientation {
        yaw:   (x - 0.5) * 2.0 * PI,
        pitch: (y - 0.5) * PI,
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HandReading
// ════════════════════════════════════════════════════════════════════════════

/// Result of classifying one hand.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandReading {
    /// Wrist in display space (already mirrored when needed).
    pub wrist:     (f32, f32),
    pub open_palm: bool,
    /// How many of the five digits counted as extended.
    pub extended:  u8,
}

impl HandReading {
    pub fn orientation(&self) -> Orientation {
        orientation_from_point(self.wrist.0, self.wrist.1)
    }
}

/// Classify a hand.
///
/// `feed_mirrored` says whether the camera image is already a selfie
/// mirror; if not, the wrist's `x` is flipped so moving the hand right turns
/// the object right.
pub fn classify(hand: &LandmarkSet, feed_mirrored: bool) -> HandReading {
    let w = hand.wrist();
    let x = if feed_mirrored { w.x } else { 1.0 - w.x };
    let extended = count_extended(hand);
    HandReading {
        wrist: (x, w.y),
        open_palm: extended >= OPEN_PALM_MIN_EXTENDED,
        extended,
    }
}

pub fn is_open_palm(hand: &LandmarkSet) -> bool {
    count_extended(hand) >= OPEN_PALM_MIN_EXTENDED
}

/// Number of extended digits (0–5).
pub fn count_extended(hand: &LandmarkSet) -> u8 {
    let fingers = FINGER_TIP_PIP
        .iter()
        .filter(|&&(tip, pip)| hand.get(tip).y < hand.get(pip).y)
        .count() as u8;
    fingers + thumb_extended(hand) as u8
}

fn thumb_extended(hand: &LandmarkSet) -> bool {
    let tip   = hand.get(THUMB_TIP).x;
    let ip    = hand.get(THUMB_IP).x;
    let pinky = hand.get(PINKY_MCP).x;
    // +1 when the thumb side is to the right of the pinky side
    let outward = if ip >= pinky { 1.0 } else { -1.0 };
    (tip - ip) * outward > 0.0
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{synthetic_hand, HandPose};

    fn hand(extended: [bool; 5]) -> LandmarkSet {
        synthetic_hand(&HandPose { wrist: (0.5, 0.7), extended })
    }

    #[test]
    fn all_five_extended_is_open_palm() {
        let h = hand([true; 5]);
        assert_eq!(count_extended(&h), 5);
        assert!(is_open_palm(&h));
    }

    #[test]
    fn four_of_five_is_open_palm() {
        // any single curled digit still counts as open
        for curled in 0..5 {
            let mut ext = [true; 5];
            ext[curled] = false;
            let h = hand(ext);
            assert_eq!(count_extended(&h), 4, "curled digit {}", curled);
            assert!(is_open_palm(&h), "curled digit {}", curled);
        }
    }

    #[test]
    fn three_or_fewer_is_not_open_palm() {
        for ext in [
            [false, true, true, true, false],
            [true, true, false, false, false],
            [false, false, false, false, false],
        ] {
            let h = hand(ext);
            assert!(count_extended(&h) <= 3);
            assert!(!is_open_palm(&h));
        }
    }

    #[test]
    fn thumb_rule_is_handedness_independent() {
        let right = hand([true, false, false, false, false]);
        // Mirror every point horizontally → a left hand.
        let mirrored: Vec<_> = right.points().iter()
            .map(|p| crate::landmarks::Landmark::new(1.0 - p.x, p.y, p.z))
            .collect();
        let left = LandmarkSet::from_slice(&mirrored).unwrap();
        assert_eq!(count_extended(&right), 1);
        assert_eq!(count_extended(&left), 1);
    }

    #[test]
    fn wrist_is_mirrored_for_unmirrored_feed() {
        let h = synthetic_hand(&HandPose { wrist: (0.2, 0.6), extended: [false; 5] });
        let raw = classify(&h, true);
        let flipped = classify(&h, false);
        assert!((raw.wrist.0 - 0.2).abs() < 1e-6);
        assert!((flipped.wrist.0 - 0.8).abs() < 1e-6);
        assert!((flipped.wrist.1 - 0.6).abs() < 1e-6);
    }

    #[test]
    fn point_mapping_matches_formula() {
        let o = orientation_from_point(0.75, 0.5);
        assert!((o.yaw - 0.5 * PI).abs() < 1e-5);
        assert!(o.pitch.abs() < 1e-6);

        let corner = orientation_from_point(0.0, 1.0);
        assert!((corner.yaw + PI).abs() < 1e-5);
        assert!((corner.pitch - PI / 2.0).abs() < 1e-5);
    }

    #[test]
    fn classify_is_deterministic() {
        let h = hand([true, true, true, false, true]);
        assert_eq!(classify(&h, false), classify(&h, false));
    }
}
