//! Remote processing endpoint client.

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::blob::ImageBlob;
use crate::error::ControllerError;

/// Field name and file name the endpoint expects for the image part.
const FILE_FIELD: &str = "file";
const UPLOAD_FILE_NAME: &str = "image.jpg";

/// Successful processing response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub text: String,
    pub image_url: String,
}

/// Async trait implemented by anything that can process a submitted image.
#[async_trait::async_trait]
pub trait ProcessingEndpoint: Send + Sync {
    async fn submit(&self, image: &ImageBlob) -> Result<UploadResult, ControllerError>;
}

/// Posts the image as multipart form data to a fixed URL. One request per
/// submit; no retries and no client-side timeout.
pub struct HttpEndpoint {
    url: Url,
    client: Client,
}

impl HttpEndpoint {
    pub fn new(client: Client, url: Url) -> Self {
        Self { url, client }
    }

    /// Resolve a possibly relative `image_url` against the endpoint URL.
    fn resolve(&self, image_url: &str) -> String {
        self.url
            .join(image_url)
            .map(String::from)
            .unwrap_or_else(|_| image_url.to_string())
    }
}

#[async_trait::async_trait]
impl ProcessingEndpoint for HttpEndpoint {
    async fn submit(&self, image: &ImageBlob) -> Result<UploadResult, ControllerError> {
        let part = Part::bytes(image.bytes().to_vec())
            .file_name(UPLOAD_FILE_NAME)
            .mime_str(image.mime())
            .map_err(|e| ControllerError::NetworkOrParse(e.to_string()))?;

        let form = Form::new().part(FILE_FIELD, part);

        info!(
            "HttpEndpoint: posting {} ({} bytes, {}) to {}",
            image.name(),
            image.len(),
            image.mime(),
            self.url
        );

        let response = self
            .client
            .post(self.url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| ControllerError::NetworkOrParse(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("HttpEndpoint: upload rejected ({})", status);
            return Err(ControllerError::UploadFailed);
        }

        let mut result: UploadResult = response
            .json()
            .await
            .map_err(|e| ControllerError::NetworkOrParse(e.to_string()))?;

        result.image_url = self.resolve(&result.image_url);
        debug!("HttpEndpoint: result image at {}", result.image_url);
        Ok(result)
    }
}
