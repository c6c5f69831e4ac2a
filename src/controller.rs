//! Capture/upload controller.
//!
//! Owns the session (phase, camera stream, selected image, picker and
//! rendered view) and executes the effects produced by
//! [`phase::transition`](crate::phase::transition). The session lock is never
//! held across an await. The camera request, frame encoding and upload each
//! run in a spawned task that commits its own completion event, so the
//! session settles even when the caller's future is dropped.
//! `RequestingCamera`, `EncodingCapture` and `Submitting` guard against
//! re-entry while such a task is outstanding.

use image::DynamicImage;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::blob::ImageBlob;
use crate::endpoint::{ProcessingEndpoint, UploadResult};
use crate::error::ControllerError;
use crate::media::{MediaDevices, MediaStream, StreamConstraints};
use crate::phase::{self, visible_controls, Control, Effect, Event, Phase, Rejection};
use crate::picker::FileInput;
use crate::theme::Theme;

pub const WAITING_TEXT: &str = "Waiting for result...";
pub const PROCESSING_TEXT: &str = "Processing image... ⏳";

/// Rendered text state of the page.
#[derive(Debug, Default)]
struct View {
    output_text: String,
    error_message: String,
    /// Blocking notice the user has to dismiss.
    alert: Option<String>,
    preview: Option<ImageBlob>,
    result_image_url: Option<String>,
}

struct Session {
    phase: Phase,
    active_stream: Option<Box<dyn MediaStream>>,
    selected_image: Option<ImageBlob>,
    picker: FileInput,
    view: View,
    theme: Theme,
}

impl Session {
    fn release_stream(&mut self) {
        if let Some(mut stream) = self.active_stream.take() {
            stream.stop_all_tracks();
            debug!("Camera stream released");
        }
    }

    /// Apply `event`: validate it, perform its effects in order, then commit
    /// the next phase. A failing effect leaves the phase unchanged.
    fn dispatch(&mut self, event: Event, scratch: &mut Scratch) -> Result<Phase, ControllerError> {
        let t = match phase::transition(self.phase, event, self.selected_image.is_some()) {
            Ok(t) => t,
            Err(rejection) => {
                if rejection == Rejection::NoImageSelected {
                    self.view.alert = Some(ControllerError::NoImageSelected.to_string());
                }
                debug!("{:?} rejected in {:?}: {:?}", event, self.phase, rejection);
                return Err(rejection.into());
            }
        };

        for effect in &t.effects {
            self.perform(*effect, scratch)?;
        }

        debug!("{:?}: {:?} -> {:?}", event, self.phase, t.next);
        self.phase = t.next;
        // The dialog only stays requested on the choice screen.
        if t.next != Phase::Idle {
            self.picker.close();
        }
        Ok(t.next)
    }

    fn perform(&mut self, effect: Effect, scratch: &mut Scratch) -> Result<(), ControllerError> {
        match effect {
            Effect::ResetOutput => {
                self.view.output_text = WAITING_TEXT.to_string();
                self.view.error_message.clear();
                self.view.result_image_url = None;
            }
            // Performed by a completion task once the session is unlocked.
            Effect::RequestCamera | Effect::PostImage => {}
            Effect::BindStream => {
                self.release_stream();
                self.active_stream = scratch.stream.take();
            }
            Effect::GrabFrame => {
                let stream = self
                    .active_stream
                    .as_mut()
                    .ok_or_else(|| ControllerError::CaptureFailed("no active stream".to_string()))?;
                let frame = stream
                    .grab_frame()
                    .map_err(|e| ControllerError::CaptureFailed(e.to_string()))?;
                scratch.frame = Some(frame);
            }
            Effect::StopTracks => self.release_stream(),
            Effect::EncodeJpeg => {
                if scratch.frame.is_none() {
                    return Err(ControllerError::CaptureFailed("no frame grabbed".to_string()));
                }
            }
            Effect::StoreImage => self.selected_image = scratch.chosen.take(),
            Effect::DiscardImage => self.selected_image = None,
            Effect::ShowPreview => self.view.preview = self.selected_image.clone(),
            Effect::HidePreview => self.view.preview = None,
            Effect::ShowError => {
                self.view.error_message = scratch.error.take().unwrap_or_default();
            }
            Effect::ClearPicker => self.picker.clear(),
            Effect::OpenPicker => self.picker.open(),
            Effect::ShowProcessing => {
                self.view.output_text = PROCESSING_TEXT.to_string();
                self.view.result_image_url = None;
            }
            Effect::ShowResult => {
                if let Some(result) = scratch.result.take() {
                    self.view.output_text = result.text;
                    self.view.result_image_url = Some(result.image_url);
                }
            }
            Effect::ShowFailure => {
                let message = scratch.error.take().unwrap_or_default();
                self.view.output_text = format!("❌ Error: {}", message);
                self.view.result_image_url = None;
            }
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release_stream();
    }
}

fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Values handed between effects of one transition.
#[derive(Default)]
struct Scratch {
    chosen: Option<ImageBlob>,
    stream: Option<Box<dyn MediaStream>>,
    frame: Option<DynamicImage>,
    error: Option<String>,
    result: Option<UploadResult>,
}

impl Scratch {
    fn with_chosen(image: ImageBlob) -> Self {
        let mut scratch = Self::default();
        scratch.chosen = Some(image);
        scratch
    }

    fn with_stream(stream: Box<dyn MediaStream>) -> Self {
        let mut scratch = Self::default();
        scratch.stream = Some(stream);
        scratch
    }

    fn with_error(message: String) -> Self {
        let mut scratch = Self::default();
        scratch.error = Some(message);
        scratch
    }

    fn with_result(result: UploadResult) -> Self {
        let mut scratch = Self::default();
        scratch.result = Some(result);
        scratch
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        // A stream that never got bound must not keep the device open.
        if let Some(mut stream) = self.stream.take() {
            stream.stop_all_tracks();
        }
    }
}

/// Serialisable rendering of the session for a front end.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub phase: Phase,
    pub visible: BTreeSet<Control>,
    pub output_text: String,
    pub error_message: String,
    pub alert: Option<String>,
    pub preview_src: Option<String>,
    pub preview_digest: Option<String>,
    pub result_image_src: Option<String>,
    pub camera_live: bool,
    pub picker_requested: bool,
    pub theme: Theme,
    pub theme_class: Option<&'static str>,
    pub theme_button_label: &'static str,
}

pub struct CaptureController {
    session: Arc<Mutex<Session>>,
    devices: Arc<dyn MediaDevices>,
    endpoint: Arc<dyn ProcessingEndpoint>,
    jpeg_quality: u8,
}

impl CaptureController {
    pub fn new(
        devices: Arc<dyn MediaDevices>,
        endpoint: Arc<dyn ProcessingEndpoint>,
        jpeg_quality: u8,
        theme: Theme,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session {
                phase: Phase::Idle,
                active_stream: None,
                selected_image: None,
                picker: FileInput::new(),
                view: View {
                    output_text: WAITING_TEXT.to_string(),
                    ..View::default()
                },
                theme,
            })),
            devices,
            endpoint,
            jpeg_quality,
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        lock(&self.session)
    }

    pub fn phase(&self) -> Phase {
        self.session().phase
    }

    pub fn selected_image(&self) -> Option<ImageBlob> {
        self.session().selected_image.clone()
    }

    pub fn has_active_stream(&self) -> bool {
        self.session().active_stream.is_some()
    }

    /// A file came back from the picker. Returns `false` when the choice did
    /// not change the picker's selection, in which case nothing happens.
    pub fn select_file(&self, name: &str, bytes: Vec<u8>) -> Result<bool, ControllerError> {
        let blob = ImageBlob::from_file(name, bytes)?;
        let mut s = self.session();

        // A refused choice must not be recorded as the picker's selection.
        phase::transition(s.phase, Event::FileChosen, s.selected_image.is_some())?;
        if !s.picker.choose(&blob) {
            debug!("Picker selection unchanged, ignoring");
            return Ok(false);
        }

        info!("File selected: {} ({} bytes, {})", blob.name(), blob.len(), blob.mime());
        s.dispatch(Event::FileChosen, &mut Scratch::with_chosen(blob))?;
        Ok(true)
    }

    /// Make exactly one camera capability request.
    pub async fn start_camera(&self) -> Result<(), ControllerError> {
        self.session().dispatch(Event::StartCamera, &mut Scratch::default())?;

        info!("Requesting camera access from {}", self.devices.name());
        let session = self.session.clone();
        let devices = self.devices.clone();
        let request = tokio::spawn(async move {
            let outcome = devices.get_user_media(StreamConstraints::VIDEO_ONLY).await;

            let mut s = lock(&session);
            match outcome {
                Ok(stream) => {
                    s.dispatch(Event::CameraGranted, &mut Scratch::with_stream(stream))?;
                    info!("Camera stream bound");
                    Ok(())
                }
                Err(e) => {
                    warn!("Camera access failed: {}", e);
                    let mut scratch =
                        Scratch::with_error(ControllerError::CameraAccessDenied.to_string());
                    s.dispatch(Event::CameraDenied, &mut scratch)?;
                    Err(ControllerError::CameraAccessDenied)
                }
            }
        });

        self.settle(request, Event::CameraDenied, |_| ControllerError::CameraAccessDenied)
            .await
    }

    /// Grab the current frame and release the camera, then keep the frame
    /// as JPEG once it has been encoded off the async workers.
    pub async fn capture(&self) -> Result<(), ControllerError> {
        info!("Capture requested");
        let frame = {
            let mut s = self.session();
            let mut scratch = Scratch::default();
            let grabbed = s.dispatch(Event::Capture, &mut scratch).and_then(|_| {
                scratch
                    .frame
                    .take()
                    .ok_or_else(|| ControllerError::CaptureFailed("no frame grabbed".to_string()))
            });
            match grabbed {
                Ok(frame) => frame,
                Err(e @ ControllerError::CaptureFailed(_)) => {
                    warn!("{}", e);
                    s.dispatch(Event::CaptureFailed, &mut Scratch::with_error(e.to_string()))?;
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        };

        let session = self.session.clone();
        let quality = self.jpeg_quality;
        let encode = tokio::spawn(async move {
            let outcome =
                match tokio::task::spawn_blocking(move || ImageBlob::encode_jpeg(&frame, quality))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(e) => Err(ControllerError::CaptureFailed(e.to_string())),
                };

            let mut s = lock(&session);
            match outcome {
                Ok(image) => {
                    debug!("Captured {} ({} bytes)", image.name(), image.len());
                    s.dispatch(Event::FrameEncoded, &mut Scratch::with_chosen(image))?;
                    Ok(())
                }
                Err(e) => {
                    warn!("{}", e);
                    s.dispatch(Event::CaptureFailed, &mut Scratch::with_error(e.to_string()))?;
                    Err(e)
                }
            }
        });

        self.settle(encode, Event::CaptureFailed, ControllerError::CaptureFailed)
            .await
    }

    /// Drop the captured photo and go back to the choice screen.
    pub fn retake(&self) -> Result<(), ControllerError> {
        self.session().dispatch(Event::Retake, &mut Scratch::default())?;
        Ok(())
    }

    /// Drop the chosen file, clear the picker and reopen it.
    pub fn reupload(&self) -> Result<(), ControllerError> {
        self.session().dispatch(Event::Reupload, &mut Scratch::default())?;
        Ok(())
    }

    /// Send the selected image to the processing endpoint and show the
    /// outcome. The image is kept afterwards so it can be resubmitted.
    pub async fn submit(&self) -> Result<UploadResult, ControllerError> {
        let image = {
            let mut s = self.session();
            let image = s
                .selected_image
                .clone()
                .ok_or(ControllerError::NoImageSelected);
            s.dispatch(Event::Submit, &mut Scratch::default())?;
            image?
        };

        let submission = Uuid::new_v4().simple().to_string();
        info!("Submission {}: sending {}", submission, image.name());
        let session = self.session.clone();
        let endpoint = self.endpoint.clone();
        let upload = tokio::spawn(async move {
            let outcome = endpoint.submit(&image).await;

            let mut s = lock(&session);
            match outcome {
                Ok(result) => {
                    info!("Submission {}: succeeded", submission);
                    s.dispatch(Event::SubmitSucceeded, &mut Scratch::with_result(result.clone()))?;
                    Ok(result)
                }
                Err(e) => {
                    warn!("Submission {}: {}", submission, e);
                    s.dispatch(Event::SubmitFailed, &mut Scratch::with_error(e.to_string()))?;
                    Err(e)
                }
            }
        });

        self.settle(upload, Event::SubmitFailed, ControllerError::NetworkOrParse)
            .await
    }

    /// Await a completion task. If the task died before committing its
    /// event, `on_abort` is committed in its place so the phase cannot stay
    /// stuck waiting for it.
    async fn settle<T>(
        &self,
        task: JoinHandle<Result<T, ControllerError>>,
        on_abort: Event,
        fail: fn(String) -> ControllerError,
    ) -> Result<T, ControllerError> {
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                let err = fail(e.to_string());
                warn!("{:?} task aborted: {}", on_abort, e);
                let mut scratch = Scratch::with_error(err.to_string());
                if let Err(rejected) = self.session().dispatch(on_abort, &mut scratch) {
                    debug!("Aborted task had already settled: {}", rejected);
                }
                Err(err)
            }
        }
    }

    pub fn dismiss_alert(&self) {
        self.session().view.alert = None;
    }

    pub fn toggle_theme(&self) -> Theme {
        let mut s = self.session();
        s.theme = s.theme.toggled();
        s.theme
    }

    pub fn snapshot(&self) -> Snapshot {
        let s = self.session();
        let visible = visible_controls(s.phase);

        let preview = s
            .view
            .preview
            .as_ref()
            .filter(|_| visible.contains(&Control::PreviewImage));
        let result_image_src = s
            .view
            .result_image_url
            .clone()
            .filter(|_| visible.contains(&Control::ResultImage));

        Snapshot {
            phase: s.phase,
            output_text: s.view.output_text.clone(),
            error_message: s.view.error_message.clone(),
            alert: s.view.alert.clone(),
            preview_src: preview.map(ImageBlob::data_url),
            preview_digest: preview.map(|p| p.digest().to_string()),
            result_image_src,
            camera_live: s.active_stream.as_ref().is_some_and(|st| st.is_live()),
            picker_requested: s.picker.dialog_requested(),
            theme: s.theme,
            theme_class: s.theme.root_class(),
            theme_button_label: s.theme.button_label(),
            visible,
        }
    }
}
