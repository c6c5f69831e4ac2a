//! Frame-file camera: serves an image on disk as the live frame source.

use image::{DynamicImage, GenericImageView};
use std::path::PathBuf;
use tracing::{debug, info};

use super::{MediaDevices, MediaStream, StreamConstraints};
use crate::error::MediaError;

pub struct FrameFileCamera {
    frame_path: Option<PathBuf>,
}

impl FrameFileCamera {
    pub fn new(frame_path: Option<PathBuf>) -> Self {
        Self { frame_path }
    }
}

#[async_trait::async_trait]
impl MediaDevices for FrameFileCamera {
    fn name(&self) -> &str {
        "frame_file"
    }

    async fn get_user_media(
        &self,
        constraints: StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, MediaError> {
        if constraints.audio {
            return Err(MediaError::NotFound("no audio source".to_string()));
        }
        if !constraints.video {
            return Err(MediaError::NotFound("no video track requested".to_string()));
        }

        let path = self
            .frame_path
            .clone()
            .ok_or_else(|| MediaError::NotAllowed("no camera configured".to_string()))?;

        let frame = tokio::task::spawn_blocking(move || image::open(&path).map(|img| (img, path)))
            .await
            .map_err(|e| MediaError::NotFound(e.to_string()))?;

        let (frame, path) = frame.map_err(|e| MediaError::NotFound(e.to_string()))?;
        if frame.width() == 0 || frame.height() == 0 {
            return Err(MediaError::Frame(format!("{:?} has no pixels", path)));
        }
        info!(
            "FrameFileCamera: streaming {:?} ({}x{})",
            path,
            frame.width(),
            frame.height()
        );

        Ok(Box::new(FrameFileStream {
            frame,
            live: true,
        }))
    }
}

struct FrameFileStream {
    frame: DynamicImage,
    live: bool,
}

impl MediaStream for FrameFileStream {
    fn grab_frame(&mut self) -> Result<DynamicImage, MediaError> {
        if !self.live {
            return Err(MediaError::Ended);
        }
        Ok(self.frame.clone())
    }

    fn stop_all_tracks(&mut self) {
        if self.live {
            debug!("FrameFileCamera: track stopped");
        }
        self.live = false;
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::tests::sample_frame;

    #[tokio::test]
    async fn test_denied_without_path() {
        let camera = FrameFileCamera::new(None);
        let err = camera
            .get_user_media(StreamConstraints::VIDEO_ONLY)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, MediaError::NotAllowed(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let camera = FrameFileCamera::new(Some(PathBuf::from("/nonexistent/frame.png")));
        let err = camera
            .get_user_media(StreamConstraints::VIDEO_ONLY)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, MediaError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_streams_file_until_stopped() {
        let path = std::env::temp_dir().join(format!("frame-{}.png", uuid::Uuid::new_v4().simple()));
        sample_frame().save(&path).unwrap();

        let camera = FrameFileCamera::new(Some(path.clone()));
        let mut stream = camera
            .get_user_media(StreamConstraints::VIDEO_ONLY)
            .await
            .unwrap();
        assert!(stream.is_live());
        assert_eq!(stream.grab_frame().unwrap().width(), 8);

        stream.stop_all_tracks();
        assert!(!stream.is_live());
        assert!(matches!(stream.grab_frame(), Err(MediaError::Ended)));

        std::fs::remove_file(path).ok();
    }
}
