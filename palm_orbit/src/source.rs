//! Landmark source: camera session + pose provider on a worker thread.
//!
//! The worker is spawned once and owns the camera and the provider for the
//! life of the source.  [`LandmarkSource::enable`] and
//! [`LandmarkSource::disable`] only post commands to it and return at once;
//! the camera open (which may sit behind a permission prompt) runs on the
//! worker, never on the caller's thread.
//!
//! Everything the worker learns comes back as a [`SourceEvent`] on one
//! `mpsc` channel: the outcome of each enable request, tagged with the
//! request's epoch so a stale answer can be told apart, and one
//! [`Detection`] (zero or one hand) per processed frame.
//!
//! An open session is held in a guard that releases it when dropped, so the
//! camera is released exactly once whether the session is disabled, the
//! source shuts down, or the worker unwinds.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::error::TrackingError;
use crate::landmarks::LandmarkSet;

/// Back-off when a session has no frame ready yet.
const IDLE_BACKOFF: Duration = Duration::from_millis(5);

// ════════════════════════════════════════════════════════════════════════════
// Camera
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    /// Front camera, pointing at the user.
    User,
    Environment,
}

/// What we ask the camera for.  Kept small: landmark accuracy does not need
/// more, and every extra pixel is provider latency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraRequest {
    pub width:  u32,
    pub height: u32,
    pub facing: Facing,
}

impl Default for CameraRequest {
    fn default() -> Self {
        CameraRequest { width: 320, height: 240, facing: Facing::User }
    }
}

/// One captured frame (8-bit luma).
#[derive(Clone, Debug)]
pub struct VideoFrame {
    pub width:       u32,
    pub height:      u32,
    pub pixels:      Vec<u8>,
    pub captured_at: Instant,
}

/// Something that can hand out camera sessions.
pub trait CameraDevice: Send {
    fn open(&mut self, request: &CameraRequest) -> Result<Box<dyn CameraSession>, TrackingError>;
}

/// An open camera stream.
pub trait CameraSession: Send {
    /// Wait up to about one frame interval for the next frame.
    fn next_frame(&mut self) -> Option<VideoFrame>;

    /// Close the stream.  Consumes the session, so it runs exactly once.
    fn release(self: Box<Self>);
}

// ════════════════════════════════════════════════════════════════════════════
// Pose provider
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelComplexity {
    Lite,
    Full,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOptions {
    pub max_hands:                u8,
    pub model_complexity:         ModelComplexity,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence:  f32,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        ProviderOptions {
            max_hands:                1,
            model_complexity:         ModelComplexity::Lite,
            min_detection_confidence: 0.5,
            min_tracking_confidence:  0.5,
        }
    }
}

/// The hand-landmark model.  A black box: frame in, at most one hand out.
pub trait PoseProvider: Send {
    /// False until the model has finished loading.
    fn is_ready(&self) -> bool;

    fn configure(&mut self, options: &ProviderOptions);

    fn detect(&mut self, frame: &VideoFrame) -> Option<LandmarkSet>;
}

// ════════════════════════════════════════════════════════════════════════════
// SourceEvent: what the worker sends to the render loop
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct Detection {
    pub hand: Option<LandmarkSet>,
    pub at:   Instant,
}

#[derive(Clone, Debug)]
pub enum SourceEvent {
    /// The camera for enable request `epoch` is open and frames are flowing.
    Opened { epoch: u64 },
    /// Enable request `epoch` failed; nothing is left open.
    Failed { epoch: u64, error: TrackingError },
    Detection(Detection),
}

impl From<Detection> for SourceEvent {
    fn from(d: Detection) -> Self {
        SourceEvent::Detection(d)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LandmarkSource
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    Enable(u64),
    Disable,
    Shutdown,
}

pub struct LandmarkSource {
    commands: Sender<Command>,
    worker:   Option<JoinHandle<()>>,
    request:  CameraRequest,
    /// Bumped on every enable and disable; only the newest request's
    /// outcome counts.
    epoch:    u64,
    wanted:   bool,
}

impl LandmarkSource {
    pub fn new(
        camera:       Box<dyn CameraDevice>,
        mut provider: Box<dyn PoseProvider>,
        request:      CameraRequest,
        options:      &ProviderOptions,
        events:       Sender<SourceEvent>,
    ) -> Self {
        provider.configure(options);
        let (commands, inbox) = mpsc::channel();
        let worker = thread::spawn(move || run_worker(camera, provider, request, inbox, events));
        LandmarkSource {
            commands,
            worker: Some(worker),
            request,
            epoch: 0,
            wanted: false,
        }
    }

    /// True from `enable()` until `disable()`, a reported failure, or the
    /// loss of the worker.
    pub fn is_enabled(&self) -> bool {
        self.wanted
    }

    pub fn request(&self) -> &CameraRequest {
        &self.request
    }

    /// Ask the worker to open the camera and start feeding the provider.
    ///
    /// Returns immediately; the outcome arrives later as
    /// [`SourceEvent::Opened`] or [`SourceEvent::Failed`].  Already enabled →
    /// `Ok(())` without a second request.  `Err` only when the worker is gone.
    pub fn enable(&mut self) -> Result<(), TrackingError> {
        if self.wanted {
            return Ok(());
        }
        if !self.worker_alive() {
            warn!("enable: landmark worker is gone");
            return Err(TrackingError::SourceLost);
        }
        self.epoch += 1;
        self.commands
            .send(Command::Enable(self.epoch))
            .map_err(|_| TrackingError::SourceLost)?;
        self.wanted = true;
        debug!(epoch = self.epoch, "enable requested");
        Ok(())
    }

    /// Stop feeding frames and release the camera.  Idempotent, and does
    /// not wait for the worker.
    pub fn disable(&mut self) {
        if !self.wanted {
            return;
        }
        self.wanted = false;
        self.epoch += 1;
        // a dead worker has already released its session
        let _ = self.commands.send(Command::Disable);
        info!("landmark source disabled");
    }

    /// Does `epoch` belong to the request currently in force?
    pub fn is_current(&self, epoch: u64) -> bool {
        self.wanted && epoch == self.epoch
    }

    /// Record that the current enable request failed.
    pub fn mark_failed(&mut self) {
        self.wanted = false;
    }

    /// If tracking is on but the worker has died, switch off and say why.
    /// Reports each loss once.
    pub fn check_worker(&mut self) -> Option<TrackingError> {
        if self.wanted && !self.worker_alive() {
            self.wanted = false;
            warn!("landmark worker stopped unexpectedly");
            return Some(TrackingError::SourceLost);
        }
        None
    }

    /// Stop the worker for good and wait for it.  Idempotent; `Drop` calls
    /// it.  Waits out a camera open still in progress.
    pub fn shutdown(&mut self) {
        self.disable();
        let Some(worker) = self.worker.take() else { return };
        let _ = self.commands.send(Command::Shutdown);
        if worker.join().is_err() {
            warn!("landmark worker panicked");
        }
    }

    fn worker_alive(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }
}

impl Drop for LandmarkSource {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Worker
// ════════════════════════════════════════════════════════════════════════════

/// An open session; released on drop, including during unwinding.
struct LiveSession(Option<Box<dyn CameraSession>>);

impl LiveSession {
    fn next_frame(&mut self) -> Option<VideoFrame> {
        self.0.as_mut()?.next_frame()
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        if let Some(session) = self.0.take() {
            session.release();
            info!("camera session released");
        }
    }
}

/// Worker body: blocks on commands while idle, polls them between frames
/// while streaming.  Runs until shut down or the render loop hangs up.
fn run_worker(
    mut camera:   Box<dyn CameraDevice>,
    mut provider: Box<dyn PoseProvider>,
    request:      CameraRequest,
    inbox:        Receiver<Command>,
    events:       Sender<SourceEvent>,
) {
    let mut live: Option<LiveSession> = None;
    loop {
        let command = if live.is_some() {
            match inbox.try_recv() {
                Ok(c)                           => Some(c),
                Err(TryRecvError::Empty)        => None,
                Err(TryRecvError::Disconnected) => Some(Command::Shutdown),
            }
        } else {
            Some(inbox.recv().unwrap_or(Command::Shutdown))
        };

        match command {
            Some(Command::Enable(epoch)) => {
                let outcome = if live.is_some() {
                    SourceEvent::Opened { epoch }
                } else {
                    match open(camera.as_mut(), provider.as_ref(), &request) {
                        Ok(session) => {
                            live = Some(LiveSession(Some(session)));
                            SourceEvent::Opened { epoch }
                        }
                        Err(error) => SourceEvent::Failed { epoch, error },
                    }
                };
                if events.send(outcome).is_err() {
                    break;
                }
                continue;
            }
            Some(Command::Disable)  => { live = None; continue; }
            Some(Command::Shutdown) => break,
            None => {}
        }

        let Some(session) = live.as_mut() else { continue };
        let Some(frame) = session.next_frame() else {
            thread::sleep(IDLE_BACKOFF);
            continue;
        };
        let hand = provider.detect(&frame);
        trace!(hand = hand.is_some(), "frame processed");
        if events.send(Detection { hand, at: Instant::now() }.into()).is_err() {
            break;
        }
    }
    drop(live);
    debug!("landmark worker exiting");
}

/// Provider check first, so a model that is still loading never leaves a
/// camera open.
fn open(
    camera:   &mut dyn CameraDevice,
    provider: &dyn PoseProvider,
    request:  &CameraRequest,
) -> Result<Box<dyn CameraSession>, TrackingError> {
    if !provider.is_ready() {
        warn!("enable: pose provider not ready");
        return Err(TrackingError::ProviderNotReady);
    }
    match camera.open(request) {
        Ok(session) => {
            info!(
                width  = request.width,
                height = request.height,
                facing = ?request.facing,
                "camera session opened"
            );
            Ok(session)
        }
        Err(e) => {
            warn!(error = %e, "enable: camera open failed");
            Err(e)
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::sim::{synthetic_hand, HandPose};

    #[derive(Default, Clone)]
    struct Counters {
        opened:   Arc<AtomicUsize>,
        released: Arc<AtomicUsize>,
    }

    impl Counters {
        fn opened(&self) -> usize   { self.opened.load(Ordering::SeqCst) }
        fn released(&self) -> usize { self.released.load(Ordering::SeqCst) }
        fn open_sessions(&self) -> usize { self.opened() - self.released() }
    }

    struct FakeCamera {
        counters: Counters,
        deny:     bool,
        delay:    Duration,
        seen:     Arc<Mutex<Option<CameraRequest>>>,
    }

    impl CameraDevice for FakeCamera {
        fn open(&mut self, request: &CameraRequest) -> Result<Box<dyn CameraSession>, TrackingError> {
            *self.seen.lock().unwrap() = Some(*request);
            thread::sleep(self.delay);
            if self.deny {
                return Err(TrackingError::PermissionDenied);
            }
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSession { counters: self.counters.clone() }))
        }
    }

    struct FakeSession {
        counters: Counters,
    }

    impl CameraSession for FakeSession {
        fn next_frame(&mut self) -> Option<VideoFrame> {
            thread::sleep(Duration::from_millis(2));
            Some(VideoFrame { width: 4, height: 4, pixels: vec![0; 16], captured_at: Instant::now() })
        }
        fn release(self: Box<Self>) {
            self.counters.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FakeProvider {
        ready:      bool,
        crash:      bool,
        configured: Option<ProviderOptions>,
    }

    impl PoseProvider for FakeProvider {
        fn is_ready(&self) -> bool { self.ready }
        fn configure(&mut self, options: &ProviderOptions) {
            self.configured = Some(options.clone());
        }
        fn detect(&mut self, _frame: &VideoFrame) -> Option<LandmarkSet> {
            assert_eq!(self.configured.as_ref().map(|o| o.max_hands), Some(1));
            if self.crash {
                panic!("model crashed");
            }
            Some(synthetic_hand(&HandPose::default()))
        }
    }

    struct Fixture {
        src:      LandmarkSource,
        rx:       Receiver<SourceEvent>,
        counters: Counters,
        seen:     Arc<Mutex<Option<CameraRequest>>>,
    }

    fn fixture(camera: impl FnOnce(Counters, Arc<Mutex<Option<CameraRequest>>>) -> FakeCamera,
               provider: FakeProvider) -> Fixture {
        let counters = Counters::default();
        let seen = Arc::new(Mutex::new(None));
        let (tx, rx) = mpsc::channel();
        let src = LandmarkSource::new(
            Box::new(camera(counters.clone(), seen.clone())),
            Box::new(provider),
            CameraRequest::default(),
            &ProviderOptions::default(),
            tx,
        );
        Fixture { src, rx, counters, seen }
    }

    fn source(deny: bool, ready: bool) -> Fixture {
        fixture(
            |counters, seen| FakeCamera { counters, deny, delay: Duration::ZERO, seen },
            FakeProvider { ready, crash: false, configured: None },
        )
    }

    /// Next status event, skipping detections.
    fn next_status(rx: &Receiver<SourceEvent>) -> SourceEvent {
        loop {
            match rx.recv_timeout(Duration::from_secs(2)).unwrap() {
                SourceEvent::Detection(_) => continue,
                other => return other,
            }
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn enable_streams_detections() {
        let mut f = source(false, true);
        f.src.enable().unwrap();
        assert!(matches!(next_status(&f.rx), SourceEvent::Opened { epoch: 1 }));
        assert!(f.src.is_current(1));
        let hand = loop {
            if let SourceEvent::Detection(d) = f.rx.recv_timeout(Duration::from_secs(2)).unwrap() {
                break d.hand;
            }
        };
        assert!(hand.is_some());
        assert_eq!(f.counters.open_sessions(), 1);
        assert_eq!(*f.seen.lock().unwrap(), Some(CameraRequest {
            width: 320, height: 240, facing: Facing::User,
        }));
        f.src.disable();
        assert!(wait_until(|| f.counters.open_sessions() == 0));
    }

    #[test]
    fn double_enable_opens_one_session() {
        let mut f = source(false, true);
        f.src.enable().unwrap();
        f.src.enable().unwrap();
        assert!(matches!(next_status(&f.rx), SourceEvent::Opened { .. }));
        f.src.shutdown();
        assert_eq!(f.counters.opened(), 1);
    }

    #[test]
    fn disable_is_idempotent_and_safe_without_session() {
        let mut f = source(false, true);
        f.src.disable();
        f.src.enable().unwrap();
        assert!(matches!(next_status(&f.rx), SourceEvent::Opened { .. }));
        f.src.disable();
        f.src.disable();
        f.src.shutdown();
        f.src.shutdown();
        assert_eq!(f.counters.released(), 1);
        assert!(!f.src.is_enabled());
    }

    #[test]
    fn can_re_enable_after_disable() {
        let mut f = source(false, true);
        f.src.enable().unwrap();
        assert!(matches!(next_status(&f.rx), SourceEvent::Opened { epoch: 1 }));
        f.src.disable();
        f.src.enable().unwrap();
        assert!(matches!(next_status(&f.rx), SourceEvent::Opened { epoch: 3 }));
        assert!(f.src.is_enabled());
        let counters = f.counters.clone();
        drop(f);
        assert_eq!(counters.opened(), 2);
        assert_eq!(counters.open_sessions(), 0);
    }

    #[test]
    fn permission_denied_leaves_nothing_open() {
        let mut f = source(true, true);
        f.src.enable().unwrap();
        match next_status(&f.rx) {
            SourceEvent::Failed { epoch, error } => {
                assert_eq!(error, TrackingError::PermissionDenied);
                assert!(f.src.is_current(epoch));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        f.src.mark_failed();
        assert!(!f.src.is_enabled());
        assert_eq!(f.counters.open_sessions(), 0);
    }

    #[test]
    fn provider_not_ready_skips_camera() {
        let mut f = source(false, false);
        f.src.enable().unwrap();
        assert!(matches!(
            next_status(&f.rx),
            SourceEvent::Failed { error: TrackingError::ProviderNotReady, .. }
        ));
        assert!(f.seen.lock().unwrap().is_none());
        assert_eq!(f.counters.opened(), 0);
    }

    #[test]
    fn drop_releases_session() {
        let mut f = source(false, true);
        f.src.enable().unwrap();
        assert!(matches!(next_status(&f.rx), SourceEvent::Opened { .. }));
        let counters = f.counters.clone();
        drop(f);
        assert_eq!(counters.open_sessions(), 0);
    }

    #[test]
    fn slow_camera_open_does_not_block_the_caller() {
        let mut f = fixture(
            |counters, seen| FakeCamera {
                counters, deny: false, delay: Duration::from_millis(300), seen,
            },
            FakeProvider { ready: true, crash: false, configured: None },
        );
        let t = Instant::now();
        f.src.enable().unwrap();
        assert!(t.elapsed() < Duration::from_millis(100));
        assert!(f.src.is_enabled());
        assert!(matches!(next_status(&f.rx), SourceEvent::Opened { epoch: 1 }));
        assert!(t.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn disable_during_slow_open_releases_once() {
        let mut f = fixture(
            |counters, seen| FakeCamera {
                counters, deny: false, delay: Duration::from_millis(200), seen,
            },
            FakeProvider { ready: true, crash: false, configured: None },
        );
        f.src.enable().unwrap();
        let t = Instant::now();
        f.src.disable();
        assert!(t.elapsed() < Duration::from_millis(100));
        // the late answer belongs to a request no longer in force
        assert!(matches!(next_status(&f.rx), SourceEvent::Opened { epoch: 1 }));
        assert!(!f.src.is_current(1));
        assert!(wait_until(|| f.counters.released() == 1));
        assert_eq!(f.counters.opened(), 1);
    }

    #[test]
    fn crashed_provider_releases_session_and_reports_loss() {
        let mut f = fixture(
            |counters, seen| FakeCamera { counters, deny: false, delay: Duration::ZERO, seen },
            FakeProvider { ready: true, crash: true, configured: None },
        );
        f.src.enable().unwrap();
        assert!(wait_until(|| f.counters.released() == 1));

        let mut lost = None;
        assert!(wait_until(|| {
            lost = f.src.check_worker();
            lost.is_some()
        }));
        assert_eq!(lost, Some(TrackingError::SourceLost));
        assert!(!f.src.is_enabled());
        assert_eq!(f.src.check_worker(), None);

        assert_eq!(f.src.enable(), Err(TrackingError::SourceLost));
        assert_ne!(
            TrackingError::SourceLost.status_text(),
            TrackingError::ProviderNotReady.status_text()
        );
        let counters = f.counters.clone();
        drop(f);
        assert_eq!(counters.released(), 1);
    }
}
