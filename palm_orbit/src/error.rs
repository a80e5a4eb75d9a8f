//! Error types.
//!
//! Camera and provider failures are all recoverable: they stop at the
//! landmark-source boundary and surface as a `mouse` fallback plus a status
//! message.  Nothing in this crate treats them as fatal.

use std::path::PathBuf;

// ════════════════════════════════════════════════════════════════════════════
// TrackingError
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackingError {
    /// The user (or the OS) refused camera access.
    #[error("camera permission denied")]
    PermissionDenied,

    /// No usable camera, or it failed to open.
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    /// Tracking was requested before the pose provider finished loading.
    #[error("pose provider not ready")]
    ProviderNotReady,

    /// The worker feeding frames to the provider died; the provider went
    /// with it and tracking cannot be enabled again this session.
    #[error("landmark worker stopped unexpectedly")]
    SourceLost,

    /// A provider produced a hand with the wrong number of points.
    #[error("expected 21 hand landmarks, got {0}")]
    InvalidLandmarkCount(usize),
}

impl TrackingError {
    /// True for every failure that should degrade to pointer control
    /// rather than abort anything.
    pub fn is_recoverable(&self) -> bool {
        match self {
            TrackingError::PermissionDenied
            | TrackingError::CameraUnavailable(_)
            | TrackingError::ProviderNotReady
            | TrackingError::SourceLost => true,
            TrackingError::InvalidLandmarkCount(_) => false,
        }
    }

    /// Short, user-facing text for the status bar.
    pub fn status_text(&self) -> String {
        match self {
            TrackingError::PermissionDenied =>
                "Camera permission denied - switched to mouse mode".to_string(),
            TrackingError::CameraUnavailable(why) =>
                format!("Camera unavailable ({}) - switched to mouse mode", why),
            TrackingError::ProviderNotReady =>
                "Hand model not loaded yet - mouse mode, retry later".to_string(),
            TrackingError::SourceLost =>
                "Hand tracking stopped unexpectedly - switched to mouse mode".to_string(),
            TrackingError::InvalidLandmarkCount(n) =>
                format!("Bad hand data ({} points)", n),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ConfigError
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_and_provider_errors_are_recoverable() {
        assert!(TrackingError::PermissionDenied.is_recoverable());
        assert!(TrackingError::CameraUnavailable("busy".into()).is_recoverable());
        assert!(TrackingError::ProviderNotReady.is_recoverable());
        assert!(TrackingError::SourceLost.is_recoverable());
        assert!(!TrackingError::InvalidLandmarkCount(3).is_recoverable());
    }

    #[test]
    fn status_text_mentions_mouse_fallback() {
        assert!(TrackingError::PermissionDenied.status_text().contains("mouse"));
        assert!(TrackingError::SourceLost.status_text().contains("mouse"));
    }

    #[test]
    fn lost_worker_is_not_reported_as_loading() {
        let lost = TrackingError::SourceLost.status_text();
        assert!(!lost.contains("not loaded"));
        assert_ne!(lost, TrackingError::ProviderNotReady.status_text());
    }
}
