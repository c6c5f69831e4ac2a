//! Runtime configuration.
//!
//! Values come from the environment (a `.env` file is loaded by `main`),
//! falling back to defaults for local development.

use anyhow::{Context, Result};
use reqwest::Url;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::theme::Theme;

const DEFAULT_UPLOAD_ENDPOINT: &str = "http://127.0.0.1:5000/upload";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
/// Browser default for `canvas.toBlob` JPEG quality (0.92).
const DEFAULT_JPEG_QUALITY: u8 = 92;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Where submitted images are posted.
    pub upload_endpoint: Url,
    pub bind_addr: SocketAddr,
    /// Image served as the live camera frame. No path means no camera.
    pub camera_frame_path: Option<PathBuf>,
    pub jpeg_quality: u8,
    /// Request body limit for files chosen through the controller service.
    pub max_upload_bytes: usize,
    pub initial_theme: Theme,
}

impl ClientConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Build configuration from an explicit variable map.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| lookup(&vars, key);

        let upload_endpoint = get("UPLOAD_ENDPOINT").unwrap_or(DEFAULT_UPLOAD_ENDPOINT);
        let upload_endpoint = Url::parse(upload_endpoint)
            .with_context(|| format!("Invalid UPLOAD_ENDPOINT: {}", upload_endpoint))?;

        let bind_addr = get("BIND_ADDR").unwrap_or(DEFAULT_BIND_ADDR);
        let bind_addr: SocketAddr = bind_addr
            .parse()
            .with_context(|| format!("Invalid BIND_ADDR: {}", bind_addr))?;

        let jpeg_quality = match get("JPEG_QUALITY") {
            Some(q) => {
                let q: u8 = q
                    .parse()
                    .with_context(|| format!("Invalid JPEG_QUALITY: {}", q))?;
                if !(1..=100).contains(&q) {
                    anyhow::bail!("JPEG_QUALITY must be between 1 and 100, got {}", q);
                }
                q
            }
            None => DEFAULT_JPEG_QUALITY,
        };

        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            Some(n) => n
                .parse()
                .with_context(|| format!("Invalid MAX_UPLOAD_BYTES: {}", n))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let initial_theme = match get("INITIAL_THEME") {
            Some(t) => t.parse()?,
            None => Theme::Light,
        };

        Ok(Self {
            upload_endpoint,
            bind_addr,
            camera_frame_path: get("CAMERA_FRAME_PATH").map(PathBuf::from),
            jpeg_quality,
            max_upload_bytes,
            initial_theme,
        })
    }
}

/// Trimmed value for `key`, treating blank as unset.
fn lookup<'a>(vars: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}
