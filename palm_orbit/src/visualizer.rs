//! Software-rendered visualizer using `minifb`.
//!
//! Layout:
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                                               │
//! │            wireframe object (rotates,         │
//! │            swells on open palm / click)       │
//! │                                               │
//! │  [message bar: Esc to dismiss]                │
//! │  status bar: mode, burst, key legend          │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! The whole window is the tracking surface: pointer moves and clicks over
//! it become [`PointerEvent`]s.  Simulation keys are forwarded straight to
//! the simulated provider over its channel.

use std::sync::mpsc::Sender;

use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use crate::controller::Status;
use crate::driver::{MeshTransform, SceneRenderer};
use crate::pointer::{PointerAdapter, PointerEvent};
use crate::sim::SimInput;
use crate::tracking::TrackingState;

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

const STATUS_H:       usize = 36;
const MESSAGE_H:      usize = 18;
const BG_COLOR:       u32   = 0xFF1A1A2E;
const TEXT_BG:        u32   = 0xFF0F3460;
const MESSAGE_BG:     u32   = 0xFF6B1F2A;
const EDGE_COLOR:     u32   = 0xFF7FDBFF;
const BURST_COLOR:    u32   = 0xFFFFD700;  // gold
const INNER_COLOR:    u32   = 0xFFB388FF;
const NUDGE:          f32   = 0.02;
/// Perspective: camera distance in object units.
const CAMERA_Z:       f32   = 4.0;

/// Inputs the app loop cares about (simulation keys are already forwarded).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WindowInput {
    Pointer(PointerEvent),
    ToggleTracking,
    DismissMessage,
    Quit,
}

// ════════════════════════════════════════════════════════════════════════════
// Mesh geometry: cube + inner octahedron
// ════════════════════════════════════════════════════════════════════════════

const CUBE: [[f32; 3]; 8] = [
    [-1.0, -1.0, -1.0], [ 1.0, -1.0, -1.0], [ 1.0,  1.0, -1.0], [-1.0,  1.0, -1.0],
    [-1.0, -1.0,  1.0], [ 1.0, -1.0,  1.0], [ 1.0,  1.0,  1.0], [-1.0,  1.0,  1.0],
];
const CUBE_EDGES: [(usize, usize); 12] = [
    (0, 1), (1, 2), (2, 3), (3, 0),
    (4, 5), (5, 6), (6, 7), (7, 4),
    (0, 4), (1, 5), (2, 6), (3, 7),
];
const OCTA: [[f32; 3]; 6] = [
    [ 0.7, 0.0, 0.0], [-0.7, 0.0, 0.0],
    [ 0.0, 0.7, 0.0], [ 0.0, -0.7, 0.0],
    [ 0.0, 0.0, 0.7], [ 0.0, 0.0, -0.7],
];
const OCTA_EDGES: [(usize, usize); 12] = [
    (0, 2), (0, 3), (0, 4), (0, 5),
    (1, 2), (1, 3), (1, 4), (1, 5),
    (2, 4), (4, 3), (3, 5), (5, 2),
];

/// Rotate about X by `pitch`, then about Y by `yaw`, then scale.
pub fn transform_point(p: [f32; 3], mesh: &MeshTransform) -> [f32; 3] {
    let (sp, cp) = mesh.pitch.sin_cos();
    let (sy, cy) = mesh.yaw.sin_cos();
    let [x, y, z] = p;
    let y1 = y * cp - z * sp;
    let z1 = y * sp + z * cp;
    let x2 = x * cy + z1 * sy;
    let z2 = -x * sy + z1 * cy;
    [x2 * mesh.scale, y1 * mesh.scale, z2 * mesh.scale]
}

/// Perspective-project onto a `w`×`h` viewport.
pub fn project(p: [f32; 3], w: usize, h: usize) -> (isize, isize) {
    let focal = w.min(h) as f32 * 0.9;
    let depth = (CAMERA_Z - p[2]).max(0.1);
    let sx = w as f32 / 2.0 + p[0] * focal / depth;
    let sy = h as f32 / 2.0 - p[1] * focal / depth;
    (sx as isize, sy as isize)
}

// ════════════════════════════════════════════════════════════════════════════
// Visualizer
// ════════════════════════════════════════════════════════════════════════════

/// The object's transform slot.  Detached while the window is resized;
/// reattached with the last transform the render loop applied.
#[derive(Clone, Copy, Debug, PartialEq)]
struct MeshSlot {
    live:   Option<MeshTransform>,
    parked: MeshTransform,
}

impl MeshSlot {
    fn new() -> Self {
        MeshSlot { live: Some(MeshTransform::default()), parked: MeshTransform::default() }
    }

    fn detach(&mut self) {
        if let Some(mesh) = self.live.take() {
            self.parked = mesh;
        }
    }

    fn reattach(&mut self) {
        if self.live.is_none() {
            self.live = Some(self.parked);
        }
    }
}

pub struct Visualizer {
    window:     Window,
    buf:        Vec<u32>,
    width:      usize,
    height:     usize,
    /// Dropped for one frame while the window is being resized.
    mesh:       MeshSlot,
    pointer:    PointerAdapter,
    mouse_down: bool,
    sim_tx:     Sender<SimInput>,
}

impl Visualizer {
    pub fn new(width: usize, height: usize, sim_tx: Sender<SimInput>) -> Result<Self, String> {
        let mut window = Window::new(
            "Palm Orbit — hand-tracked 3D controller",
            width, height,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        ).map_err(|e| e.to_string())?;

        window.limit_update_rate(Some(std::time::Duration::from_millis(16))); // ~60fps

        Ok(Visualizer {
            window,
            buf: vec![BG_COLOR; width * height],
            width,
            height,
            mesh: MeshSlot::new(),
            pointer: PointerAdapter::new(width, height),
            mouse_down: false,
            sim_tx,
        })
    }

    /// Poll keyboard and mouse.  Simulation keys go to the sim provider;
    /// everything else is returned.
    pub fn poll_input(&mut self) -> Vec<WindowInput> {
        let mut out = Vec::new();
        if !self.window.is_open() {
            out.push(WindowInput::Quit);
            return out;
        }

        let one_shot = |k: Key| self.window.is_key_pressed(k, KeyRepeat::No);
        let held     = |k: Key| self.window.is_key_pressed(k, KeyRepeat::Yes);

        if one_shot(Key::Q) {
            out.push(WindowInput::Quit);
            return out;
        }
        if one_shot(Key::C)      { out.push(WindowInput::ToggleTracking); }
        if one_shot(Key::Escape) { out.push(WindowInput::DismissMessage); }

        let mut sim = Vec::new();
        if one_shot(Key::O) { sim.push(SimInput::ToggleOpen); }
        if one_shot(Key::H) { sim.push(SimInput::ToggleVisible); }
        if held(Key::Left)  { sim.push(SimInput::Nudge { dx: -NUDGE, dy: 0.0 }); }
        if held(Key::Right) { sim.push(SimInput::Nudge { dx:  NUDGE, dy: 0.0 }); }
        if held(Key::Up)    { sim.push(SimInput::Nudge { dx: 0.0, dy: -NUDGE }); }
        if held(Key::Down)  { sim.push(SimInput::Nudge { dx: 0.0, dy:  NUDGE }); }
        for input in sim {
            // Provider gone (tracking never enabled) is fine.
            let _ = self.sim_tx.send(input);
        }

        // Pointer over the surface
        if let Some((mx, my)) = self.window.get_mouse_pos(MouseMode::Discard) {
            if let Some(ev) = self.pointer.moved(mx, my) {
                out.push(WindowInput::Pointer(ev));
            }
            let down = self.window.get_mouse_down(MouseButton::Left);
            if down && !self.mouse_down {
                out.push(WindowInput::Pointer(PointerEvent::Pressed));
            }
            self.mouse_down = down;
        }

        out
    }

    // ── Drawing ───────────────────────────────────────────────────────────

    fn draw_mesh(&mut self, mesh: &MeshTransform, exploding: bool) {
        let (w, h) = (self.width, self.height.saturating_sub(STATUS_H));
        let outer = if exploding { BURST_COLOR } else { EDGE_COLOR };

        let cube: Vec<_> = CUBE.iter().map(|&p| project(transform_point(p, mesh), w, h)).collect();
        for &(a, b) in CUBE_EDGES.iter() {
            self.draw_line(cube[a], cube[b], outer);
        }

        let octa: Vec<_> = OCTA.iter().map(|&p| project(transform_point(p, mesh), w, h)).collect();
        for &(a, b) in OCTA_EDGES.iter() {
            self.draw_line(octa[a], octa[b], INNER_COLOR);
        }
    }

    fn draw_status(&mut self, status: &Status) {
        let y = self.height.saturating_sub(STATUS_H);

        if let Some(msg) = &status.message {
            let my = y.saturating_sub(MESSAGE_H);
            self.fill_rect(0, my, self.width, MESSAGE_H, MESSAGE_BG);
            self.draw_label(&format!("{}  (esc)", msg), 10, my + 6, 0xFFFFEEEE);
        }

        self.fill_rect(0, y, self.width, STATUS_H, TEXT_BG);
        let color = match status.state {
            TrackingState::Detected  => 0xFF7CFC00,
            TrackingState::Searching => 0xFFFFB347,
            TrackingState::Mouse     => 0xFFEEEEEE,
            TrackingState::Idle      => 0xFF888888,
        };
        self.draw_label(&status.summary(), 10, y + 8, color);
        self.draw_label(
            "C=camera  arrows=move hand  O=open palm  H=hide hand  click=burst  Q=quit",
            10, y + 22, 0xFF888888,
        );
    }

    // ── Primitive drawing helpers ─────────────────────────────────────────

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for row in y..(y+h).min(self.height) {
            for col in x..(x+w).min(self.width) {
                self.buf[row * self.width + col] = color;
            }
        }
    }

    fn set_pixel(&mut self, x: isize, y: isize, color: u32) {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            self.buf[y as usize * self.width + x as usize] = color;
        }
    }

    /// Bresenham line.
    fn draw_line(&mut self, (x0, y0): (isize, isize), (x1, y1): (isize, isize), color: u32) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let (mut x, mut y, mut err) = (x0, y0, dx + dy);
        loop {
            self.set_pixel(x, y, color);
            if x == x1 && y == y1 { break; }
            let e2 = 2 * err;
            if e2 >= dy { err += dy; x += sx; }
            if e2 <= dx { err += dx; y += sy; }
        }
    }

    /// Minimal bitmap font: 3×5 characters for the status text.
    fn draw_label(&mut self, text: &str, x: usize, y: usize, color: u32) {
        let mut cx = x;
        for ch in text.chars() {
            let glyph = char_glyph(ch);
            for (row, &bits) in glyph.iter().enumerate() {
                for col in 0..3usize {
                    if bits & (1 << (2 - col)) != 0 {
                        self.set_pixel((cx + col) as isize, (y + row) as isize, color);
                    }
                }
            }
            cx += 4; // 3 wide + 1 gap
            if cx + 4 > self.width { break; }
        }
    }
}

impl SceneRenderer for Visualizer {
    fn mesh_mut(&mut self) -> Option<&mut MeshTransform> {
        self.mesh.live.as_mut()
    }

    fn render(&mut self, status: &Status) {
        let (w, h) = self.window.get_size();
        if (w, h) != (self.width, self.height) && w > 0 && h > 0 {
            // Rebuild the framebuffer; the mesh comes back next frame.
            self.width  = w;
            self.height = h;
            self.buf    = vec![BG_COLOR; w * h];
            self.pointer.resize(w, h);
            self.mesh.detach();
        } else {
            self.mesh.reattach();
        }

        self.buf.fill(BG_COLOR);
        if let Some(mesh) = self.mesh.live {
            self.draw_mesh(&mesh, status.exploding);
        }
        self.draw_status(status);

        self.window.update_with_buffer(&self.buf, self.width, self.height).ok();
    }

    fn is_open(&self) -> bool {
        self.window.is_open()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Minimal 3×5 bitmap font
// ────────────────────────────────────────────────────────────────────────────

fn char_glyph(c: char) -> [u8; 5] {
    match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'a' | 'A' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'b' | 'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'c' | 'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'd' | 'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'e' | 'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'f' | 'F' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'g' | 'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'h' | 'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'i' | 'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'j' | 'J' => [0b001, 0b001, 0b001, 0b101, 0b111],
        'k' | 'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'l' | 'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'm' | 'M' => [0b101, 0b111, 0b101, 0b101, 0b101],
        'n' | 'N' => [0b111, 0b101, 0b101, 0b101, 0b101],
        'o' | 'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'p' | 'P' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'q' | 'Q' => [0b111, 0b101, 0b101, 0b111, 0b001],
        'r' | 'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        's' | 'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        't' | 'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'u' | 'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'v' | 'V' => [0b101, 0b101, 0b101, 0b010, 0b010],
        'w' | 'W' => [0b101, 0b101, 0b101, 0b111, 0b101],
        'x' | 'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'y' | 'Y' => [0b101, 0b101, 0b111, 0b010, 0b010],
        'z' | 'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '(' => [0b010, 0b100, 0b100, 0b100, 0b010],
        ')' => [0b010, 0b001, 0b001, 0b001, 0b010],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        _   => [0b000, 0b000, 0b010, 0b000, 0b000], // fallback dot
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_transform_keeps_point() {
        let p = transform_point([1.0, 2.0, 3.0], &MeshTransform::default());
        assert_eq!(p, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn yaw_quarter_turn_moves_x_to_minus_z() {
        let mesh = MeshTransform { yaw: std::f32::consts::FRAC_PI_2, pitch: 0.0, scale: 1.0 };
        let p = transform_point([1.0, 0.0, 0.0], &mesh);
        assert!(p[0].abs() < 1e-5);
        assert!((p[2] + 1.0).abs() < 1e-5);
    }

    #[test]
    fn scale_multiplies_distance() {
        let mesh = MeshTransform { yaw: 0.3, pitch: -0.2, scale: 1.5 };
        let p = transform_point([0.0, 1.0, 0.0], &mesh);
        let len = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
        assert!((len - 1.5).abs() < 1e-5);
    }

    #[test]
    fn resize_restores_last_applied_transform() {
        let mut slot = MeshSlot::new();
        let turned = MeshTransform { yaw: 1.2, pitch: -0.4, scale: 1.3 };
        if let Some(mesh) = slot.live.as_mut() {
            *mesh = turned;
        }
        slot.detach();
        assert_eq!(slot.live, None);
        slot.detach();
        slot.reattach();
        assert_eq!(slot.live, Some(turned));
        slot.reattach();
        assert_eq!(slot.live, Some(turned));
    }

    #[test]
    fn origin_projects_to_centre() {
        assert_eq!(project([0.0, 0.0, 0.0], 640, 480), (320, 240));
    }

    #[test]
    fn every_status_char_has_a_glyph() {
        let fallback = char_glyph('\u{1}');
        for ch in "mode: detected burst! (esc)".chars() {
            assert!(ch == ' ' || char_glyph(ch) != fallback, "missing glyph {:?}", ch);
        }
    }
}
