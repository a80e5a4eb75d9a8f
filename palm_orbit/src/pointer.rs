//! Pointer fallback: mouse position over the tracking surface becomes an
//! orientation target, using the same mapping as the wrist.

use crate::gesture::{orientation_from_point, Orientation};

/// Raw pointer input, already normalised to the surface (0–1).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Moved { x: f32, y: f32 },
    Pressed,
}

/// Converts surface pixel coordinates into [`PointerEvent`]s.
#[derive(Clone, Copy, Debug)]
pub struct PointerAdapter {
    width:  f32,
    height: f32,
    last:   Option<(f32, f32)>,
}

impl PointerAdapter {
    pub fn new(width: usize, height: usize) -> Self {
        PointerAdapter {
            width:  width.max(1) as f32,
            height: height.max(1) as f32,
            last:   None,
        }
    }

    /// Track a surface resize.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width  = width.max(1) as f32;
        self.height = height.max(1) as f32;
    }

    /// Normalise a pixel position, clamped to the surface.
    pub fn normalize(&self, px: f32, py: f32) -> (f32, f32) {
        ((px / self.width).clamp(0.0, 1.0), (py / self.height).clamp(0.0, 1.0))
    }

    /// Turn a pixel position into a move event, or `None` if the pointer
    /// has not moved since the last call.
    pub fn moved(&mut self, px: f32, py: f32) -> Option<PointerEvent> {
        let (x, y) = self.normalize(px, py);
        if self.last == Some((x, y)) {
            return None;
        }
        self.last = Some((x, y));
        Some(PointerEvent::Moved { x, y })
    }
}

/// Orientation target for a normalised pointer position.
pub fn pointer_target(x: f32, y: f32) -> Orientation {
    orientation_from_point(x, y)
}
