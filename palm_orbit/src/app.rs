//! Application wiring: simulated camera + provider, controller, visualizer,
//! render loop.

use std::sync::mpsc;
use std::time::Instant;

use tracing::info;

use crate::config::AppConfig;
use crate::controller::{ControlEvent, Controller};
use crate::driver::RenderLoop;
use crate::sim::{SimCamera, SimPoseProvider};
use crate::source::LandmarkSource;
use crate::visualizer::{Visualizer, WindowInput};

/// Run the full application.
///
/// Creates the visualizer, the landmark source (simulated camera and
/// provider), and drives the event/render loop at ~60 fps until the window
/// closes or `Q` is pressed.
pub fn run(cfg: AppConfig) -> Result<(), String> {
    // ── Sim input channel (window → provider) ─────────────────────────────
    let (sim_tx, sim_rx) = mpsc::channel();

    // ── Landmark source ───────────────────────────────────────────────────
    let (event_tx, event_rx) = mpsc::channel();
    let source = LandmarkSource::new(
        Box::new(SimCamera::new(&cfg.simulation)),
        Box::new(SimPoseProvider::new(sim_rx, &cfg.simulation, cfg.camera.feed_mirrored)),
        cfg.camera.request(),
        &cfg.provider,
        event_tx,
    );

    let vis = Visualizer::new(cfg.window.width, cfg.window.height, sim_tx)?;

    let controller = Controller::new(
        cfg.tracking.grace_period(),
        cfg.motion.clone(),
        cfg.camera.feed_mirrored,
        Instant::now(),
    );

    let mut rl = RenderLoop::new(vis, controller, source, event_rx);
    rl.start();
    if cfg.autostart {
        rl.set_tracking(true, Instant::now());
    }

    // ── Main loop ─────────────────────────────────────────────────────────
    'frames: loop {
        let now = Instant::now();
        for input in rl.renderer_mut().poll_input() {
            match input {
                WindowInput::Quit            => break 'frames,
                WindowInput::ToggleTracking  => rl.toggle_tracking(now),
                WindowInput::DismissMessage  => rl.controller_mut().dismiss_message(),
                WindowInput::Pointer(ev)     => rl.push(ControlEvent::Pointer(ev), now),
            }
        }
        if !rl.frame(now) {
            break;
        }
    }

    rl.shutdown();
    info!("bye");
    Ok(())
}
