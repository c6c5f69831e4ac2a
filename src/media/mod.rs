//! Camera capability abstraction.
//!
//! Defines the [`MediaDevices`] trait (permission + stream acquisition) and
//! the [`MediaStream`] handle it returns, so the controller can be driven by
//! a real device, the frame-file camera, or a test fake.

pub mod frame_file;

use image::DynamicImage;

use crate::error::MediaError;

/// Constraints for a capability request. Only video is ever requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub video: bool,
    pub audio: bool,
}

impl StreamConstraints {
    pub const VIDEO_ONLY: Self = Self {
        video: true,
        audio: false,
    };
}

/// A live camera handle. Frames are available until every track is stopped.
pub trait MediaStream: Send {
    /// Current frame at the source's native resolution.
    fn grab_frame(&mut self) -> Result<DynamicImage, MediaError>;

    /// Stop every track, releasing the device.
    fn stop_all_tracks(&mut self);

    fn is_live(&self) -> bool;
}

/// Async trait implemented by each camera backend.
#[async_trait::async_trait]
pub trait MediaDevices: Send + Sync {
    fn name(&self) -> &str;

    /// Request camera access. Rejection means the user or platform denied it.
    async fn get_user_media(
        &self,
        constraints: StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, MediaError>;
}
