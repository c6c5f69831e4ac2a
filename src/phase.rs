//! UI phase state machine.
//!
//! [`transition`] is pure: it maps the current [`Phase`] and an [`Event`] to
//! the next phase plus the ordered [`Effect`]s the controller must perform.
//! Which controls are on screen is derived from the phase alone by
//! [`visible_controls`].

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Where the selected image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    File,
    Camera,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Phase {
    /// Nothing chosen; upload and start-camera are offered.
    Idle,
    /// The single camera capability request is outstanding.
    RequestingCamera,
    /// Stream open, awaiting capture.
    CameraLive,
    /// Frame grabbed and camera released; JPEG encoding outstanding.
    EncodingCapture,
    PreviewFromFile,
    PreviewFromCamera,
    Submitting { source: ImageSource },
    /// Success or error shown in the output area.
    Result { source: ImageSource, succeeded: bool },
}

impl Phase {
    /// Source of the image currently on screen, if any.
    pub fn source(&self) -> Option<ImageSource> {
        match self {
            Self::PreviewFromFile => Some(ImageSource::File),
            Self::PreviewFromCamera => Some(ImageSource::Camera),
            Self::Submitting { source } | Self::Result { source, .. } => Some(*source),
            Self::EncodingCapture => Some(ImageSource::Camera),
            Self::Idle | Self::RequestingCamera | Self::CameraLive => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::RequestingCamera => "waiting for camera access",
            Self::CameraLive => "the camera is live",
            Self::EncodingCapture => "encoding the captured photo",
            Self::PreviewFromFile => "previewing an uploaded file",
            Self::PreviewFromCamera => "previewing a captured photo",
            Self::Submitting { .. } => "submitting",
            Self::Result { .. } => "showing a result",
        };
        f.write_str(s)
    }
}

/// User actions and completions of asynchronous capability calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    FileChosen,
    StartCamera,
    CameraGranted,
    CameraDenied,
    Capture,
    FrameEncoded,
    CaptureFailed,
    Retake,
    Reupload,
    Submit,
    SubmitSucceeded,
    SubmitFailed,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FileChosen => "choose a file",
            Self::StartCamera => "start the camera",
            Self::CameraGranted | Self::CameraDenied => "complete a camera request",
            Self::Capture => "capture a photo",
            Self::FrameEncoded => "finish encoding a photo",
            Self::CaptureFailed => "abandon a capture",
            Self::Retake => "retake",
            Self::Reupload => "reupload",
            Self::Submit => "submit",
            Self::SubmitSucceeded | Self::SubmitFailed => "complete a submission",
        };
        f.write_str(s)
    }
}

/// Side effects, performed by the controller in the order given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Output text back to "Waiting for result...", inline error cleared,
    /// result image hidden.
    ResetOutput,
    /// Ask the capability for a video-only stream.
    RequestCamera,
    BindStream,
    GrabFrame,
    /// Stop every track of the active stream and release the handle.
    StopTracks,
    EncodeJpeg,
    StoreImage,
    DiscardImage,
    ShowPreview,
    HidePreview,
    ShowError,
    ClearPicker,
    OpenPicker,
    ShowProcessing,
    PostImage,
    ShowResult,
    ShowFailure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: Phase,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: Phase, effects: &[Effect]) -> Self {
        Self {
            next,
            effects: effects.to_vec(),
        }
    }
}

/// Why an event was refused. A refused event leaves the phase unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NoImageSelected,
    SubmissionInProgress,
    NotAvailable { phase: Phase, event: Event },
}

/// Compute the next phase and effects for `event` in `phase`.
///
/// `has_image` reports whether the session currently holds a selected image;
/// it guards submission.
pub fn transition(phase: Phase, event: Event, has_image: bool) -> Result<Transition, Rejection> {
    use Effect::*;

    let t = match (phase, event) {
        (Phase::Idle, Event::FileChosen) => Transition::to(
            Phase::PreviewFromFile,
            &[StoreImage, ShowPreview, ResetOutput],
        ),
        (Phase::Idle, Event::StartCamera) => Transition::to(
            Phase::RequestingCamera,
            &[HidePreview, ResetOutput, RequestCamera],
        ),
        (Phase::RequestingCamera, Event::CameraGranted) => {
            Transition::to(Phase::CameraLive, &[BindStream])
        }
        (Phase::RequestingCamera, Event::CameraDenied) => Transition::to(Phase::Idle, &[ShowError]),
        (Phase::CameraLive, Event::Capture) => Transition::to(
            Phase::EncodingCapture,
            &[GrabFrame, StopTracks, EncodeJpeg],
        ),
        (Phase::CameraLive, Event::CaptureFailed) => {
            Transition::to(Phase::Idle, &[StopTracks, ShowError])
        }
        (Phase::EncodingCapture, Event::FrameEncoded) => Transition::to(
            Phase::PreviewFromCamera,
            &[StoreImage, ShowPreview, ResetOutput],
        ),
        (Phase::EncodingCapture, Event::CaptureFailed) => {
            Transition::to(Phase::Idle, &[ShowError])
        }
        (Phase::PreviewFromCamera, Event::Retake)
        | (
            Phase::Result {
                source: ImageSource::Camera,
                ..
            },
            Event::Retake,
        ) => Transition::to(Phase::Idle, &[DiscardImage, HidePreview, ResetOutput]),
        (Phase::PreviewFromFile, Event::Reupload)
        | (
            Phase::Result {
                source: ImageSource::File,
                ..
            },
            Event::Reupload,
        ) => Transition::to(
            Phase::Idle,
            &[DiscardImage, HidePreview, ResetOutput, ClearPicker, OpenPicker],
        ),
        (Phase::Submitting { .. }, Event::Submit) => return Err(Rejection::SubmissionInProgress),
        (_, Event::Submit) if !has_image => return Err(Rejection::NoImageSelected),
        (Phase::PreviewFromFile | Phase::PreviewFromCamera | Phase::Result { .. }, Event::Submit) => {
            let source = phase
                .source()
                .ok_or(Rejection::NotAvailable { phase, event })?;
            Transition::to(Phase::Submitting { source }, &[ShowProcessing, PostImage])
        }
        (Phase::Submitting { source }, Event::SubmitSucceeded) => Transition::to(
            Phase::Result {
                source,
                succeeded: true,
            },
            &[ShowResult],
        ),
        (Phase::Submitting { source }, Event::SubmitFailed) => Transition::to(
            Phase::Result {
                source,
                succeeded: false,
            },
            &[ShowFailure],
        ),
        _ => return Err(Rejection::NotAvailable { phase, event }),
    };

    Ok(t)
}

/// On-screen elements whose visibility follows the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    UploadLabel,
    StartCamera,
    CameraPreview,
    Capture,
    PreviewImage,
    Retake,
    Reupload,
    Submit,
    ResultImage,
}

/// Controls shown for `phase`.
pub fn visible_controls(phase: Phase) -> BTreeSet<Control> {
    use Control::*;

    let redo = |source| match source {
        ImageSource::File => Reupload,
        ImageSource::Camera => Retake,
    };

    let controls: Vec<Control> = match phase {
        Phase::Idle => vec![UploadLabel, StartCamera],
        Phase::RequestingCamera | Phase::EncodingCapture => vec![],
        Phase::CameraLive => vec![CameraPreview, Capture],
        Phase::PreviewFromFile => vec![PreviewImage, Reupload, Submit],
        Phase::PreviewFromCamera => vec![PreviewImage, Retake, Submit],
        Phase::Submitting { .. } => vec![PreviewImage],
        Phase::Result { source, succeeded } => {
            let mut v = vec![PreviewImage, redo(source), Submit];
            if succeeded {
                v.push(ResultImage);
            }
            v
        }
    };

    controls.into_iter().collect()
}
