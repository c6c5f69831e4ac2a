//! In-memory image blobs from the file picker or a captured frame.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{codecs::jpeg::JpegEncoder, ColorType, DynamicImage, ImageFormat};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

use crate::error::ControllerError;

/// File name given to camera captures.
pub const CAPTURE_FILE_NAME: &str = "capture.jpg";

/// Image bytes plus the metadata the page needs to preview and upload them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    name: String,
    mime: &'static str,
    bytes: Arc<Vec<u8>>,
    digest: String,
}

impl ImageBlob {
    /// Accept a user-chosen file. The file must be non-empty and its bytes
    /// must be a recognised image format.
    pub fn from_file(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ControllerError> {
        if bytes.is_empty() {
            return Err(ControllerError::EmptyFile);
        }
        let format = image::guess_format(&bytes).map_err(|_| ControllerError::NotAnImage)?;
        Ok(Self::new(name.into(), mime_for(format), bytes))
    }

    /// Encode a grabbed frame as JPEG at its native resolution.
    pub fn encode_jpeg(frame: &DynamicImage, quality: u8) -> Result<Self, ControllerError> {
        let rgb = frame.to_rgb8();
        let (width, height) = rgb.dimensions();

        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, quality)
            .encode(rgb.as_raw(), width, height, ColorType::Rgb8)
            .map_err(|e| ControllerError::CaptureFailed(e.to_string()))?;

        debug!("Encoded {}x{} frame as JPEG ({} bytes)", width, height, buf.len());
        Ok(Self::new(CAPTURE_FILE_NAME.to_string(), "image/jpeg", buf))
    }

    fn new(name: String, mime: &'static str, bytes: Vec<u8>) -> Self {
        let digest = {
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            format!("{:x}", hasher.finalize())
        };
        Self {
            name,
            mime,
            bytes: Arc::new(bytes),
            digest,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Hex SHA-256 of the bytes.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// `data:` URL suitable for an `<img src>`.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, BASE64.encode(self.bytes.as_slice()))
    }
}

fn mime_for(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Tiff => "image/tiff",
        ImageFormat::Ico => "image/x-icon",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    pub(crate) fn sample_frame() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 6, Rgb([200, 30, 30])))
    }

    pub(crate) fn sample_png() -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        sample_frame()
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_from_file_sniffs_mime() {
        let blob = ImageBlob::from_file("plate.png", sample_png()).unwrap();
        assert_eq!(blob.mime(), "image/png");
        assert_eq!(blob.name(), "plate.png");
        assert_eq!(blob.digest().len(), 64);
    }

    #[test]
    fn test_rejects_empty_and_non_images() {
        assert!(matches!(
            ImageBlob::from_file("empty.png", Vec::new()),
            Err(ControllerError::EmptyFile)
        ));
        assert!(matches!(
            ImageBlob::from_file("notes.txt", b"hello there".to_vec()),
            Err(ControllerError::NotAnImage)
        ));
    }

    #[test]
    fn test_encode_jpeg_keeps_resolution() {
        let blob = ImageBlob::encode_jpeg(&sample_frame(), 92).unwrap();
        assert_eq!(blob.mime(), "image/jpeg");
        assert_eq!(blob.name(), CAPTURE_FILE_NAME);

        let decoded = image::load_from_memory(blob.bytes()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
    }

    #[test]
    fn test_same_bytes_same_digest() {
        let a = ImageBlob::from_file("a.png", sample_png()).unwrap();
        let b = ImageBlob::from_file("b.png", sample_png()).unwrap();
        assert_eq!(a.digest(), b.digest());
        assert!(a.data_url().starts_with("data:image/png;base64,"));
    }
}
