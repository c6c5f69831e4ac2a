//! Error types surfaced by the capture/upload controller.

use thiserror::Error;

use crate::phase::{Event, Phase, Rejection};

/// Failures of a user action. Some of these are rendered into the view
/// (camera denial, upload failure) rather than rejected outright.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Unable to access camera.")]
    CameraAccessDenied,

    #[error("Please upload or capture a photo first!")]
    NoImageSelected,

    #[error("Upload failed!")]
    UploadFailed,

    #[error("{0}")]
    NetworkOrParse(String),

    #[error("Selected file is empty")]
    EmptyFile,

    #[error("Selected file is not a supported image")]
    NotAnImage,

    #[error("Unable to capture photo: {0}")]
    CaptureFailed(String),

    #[error("A submission is already in progress")]
    SubmissionInProgress,

    #[error("Cannot {action} while {phase}")]
    NotAvailable { phase: Phase, action: Event },
}

impl ControllerError {
    /// Whether the failure is shown to the user as part of the page rather
    /// than refusing the action.
    pub fn is_rendered(&self) -> bool {
        matches!(
            self,
            Self::CameraAccessDenied
                | Self::UploadFailed
                | Self::NetworkOrParse(_)
                | Self::CaptureFailed(_)
        )
    }

    /// Whether the action was refused because of the current phase.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::SubmissionInProgress | Self::NotAvailable { .. })
    }
}

impl From<Rejection> for ControllerError {
    fn from(r: Rejection) -> Self {
        match r {
            Rejection::NoImageSelected => Self::NoImageSelected,
            Rejection::SubmissionInProgress => Self::SubmissionInProgress,
            Rejection::NotAvailable { phase, event } => Self::NotAvailable {
                phase,
                action: event,
            },
        }
    }
}

/// Failures reported by a camera capability.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("permission denied: {0}")]
    NotAllowed(String),

    #[error("no camera available: {0}")]
    NotFound(String),

    #[error("stream has ended")]
    Ended,

    #[error("frame unavailable: {0}")]
    Frame(String),
}
