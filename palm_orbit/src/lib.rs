//! # palm_orbit
//!
//! Gesture-driven 3D orientation controller.  A hand seen by the camera
//! steers a rendered object; the mouse takes over whenever no hand is in
//! view.
//!
//! ## Data flow
//!
//! ```text
//! camera ─► pose provider ─► SourceEvent ┐
//!   (worker thread, own cadence)         │  mpsc
//!                                        ▼
//! pointer ──────────────────────► Controller::update ─► Pose ─► SceneRenderer
//!                                 (tracking machine,
//!                                  gesture classifier,
//!                                  motion integrator)
//! ```
//!
//! ## Control mapping
//!
//! | Input | State | Effect |
//! |---|---|---|
//! | Wrist position | `detected` | Target yaw/pitch |
//! | Open palm (≥ 4 of 5 digits) | `detected` | Explode (scale burst, 500 ms) |
//! | Pointer move | not `detected` | Target yaw/pitch |
//! | Pointer press | not `detected` | Explode |
//! | No hand for 1 s | `searching`/`detected` | Fall back to `mouse` |
//!
//! ### Simulation keyboard shortcuts
//!
//! | Key | Action |
//! |---|---|
//! | `C` | Camera tracking on/off |
//! | Arrows | Move the simulated hand |
//! | `O` | Open palm / fist |
//! | `H` | Show / hide the hand |
//! | `Esc` | Dismiss status message |
//! | `Q` | Quit |

pub mod error;
pub mod landmarks;
pub mod gesture;
pub mod tracking;
pub mod motion;
pub mod pointer;
pub mod source;
pub mod sim;
pub mod controller;
pub mod driver;
pub mod visualizer;
pub mod config;
pub mod app;
