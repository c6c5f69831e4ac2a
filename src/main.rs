//! Capture Upload - headless controller for the photo capture/upload page.

mod blob;
mod config;
mod controller;
mod endpoint;
mod error;
mod media;
mod phase;
mod picker;
mod theme;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use config::ClientConfig;
use controller::{CaptureController, Snapshot};
use endpoint::HttpEndpoint;
use error::ControllerError;
use media::frame_file::FrameFileCamera;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    controller: Arc<CaptureController>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "capture_upload=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env()?;
    info!("Uploading to {}", config.upload_endpoint);
    match &config.camera_frame_path {
        Some(path) => info!("Camera frames from {:?}", path),
        None => warn!("CAMERA_FRAME_PATH not set, camera requests will be denied"),
    }

    let endpoint = HttpEndpoint::new(reqwest::Client::new(), config.upload_endpoint.clone());
    let camera = FrameFileCamera::new(config.camera_frame_path.clone());
    let controller = CaptureController::new(
        Arc::new(camera),
        Arc::new(endpoint),
        config.jpeg_quality,
        config.initial_theme,
    );

    let state = AppState {
        controller: Arc::new(controller),
    };
    let app = router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Server listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ui/state", get(get_state))
        .route("/ui/file", post(choose_file))
        .route("/ui/camera/start", post(start_camera))
        .route("/ui/camera/capture", post(capture))
        .route("/ui/retake", post(retake))
        .route("/ui/reupload", post(reupload))
        .route("/ui/submit", post(submit))
        .route("/ui/theme", post(toggle_theme))
        .route("/ui/alert/dismiss", post(dismiss_alert))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// Snapshot plus the status matching how the action went.
struct ActionResponse {
    status: StatusCode,
    snapshot: Snapshot,
}

impl ActionResponse {
    fn from_outcome<T>(controller: &CaptureController, outcome: Result<T, ControllerError>) -> Self {
        let status = match &outcome {
            Ok(_) => StatusCode::OK,
            Err(e) if e.is_rendered() => StatusCode::OK,
            Err(e) if e.is_conflict() => StatusCode::CONFLICT,
            Err(_) => StatusCode::BAD_REQUEST,
        };
        if let Err(e) = &outcome {
            info!("Action finished in {:?}: {}", controller.phase(), e);
        }
        Self {
            status,
            snapshot: controller.snapshot(),
        }
    }
}

impl IntoResponse for ActionResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.snapshot)).into_response()
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn get_state(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.controller.snapshot())
}

/// Receive the file chosen in the picker dialog.
async fn choose_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<ActionResponse, (StatusCode, String)> {
    let mut filename = String::new();
    let mut file_data = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e))
    })? {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or("image").to_string();
            file_data = field.bytes().await.map_err(|e| {
                error!("Failed to read uploaded file: {}", e);
                (StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e))
            })?.to_vec();
            break;
        }
    }

    let outcome = state.controller.select_file(&filename, file_data);
    Ok(ActionResponse::from_outcome(&state.controller, outcome))
}

async fn start_camera(State(state): State<AppState>) -> ActionResponse {
    let outcome = state.controller.start_camera().await;
    ActionResponse::from_outcome(&state.controller, outcome)
}

async fn capture(State(state): State<AppState>) -> ActionResponse {
    let outcome = state.controller.capture().await;
    if let Some(image) = state.controller.selected_image() {
        debug!(
            "Captured {} ({} bytes), camera held: {}",
            image.name(),
            image.len(),
            state.controller.has_active_stream()
        );
    }
    ActionResponse::from_outcome(&state.controller, outcome)
}

async fn retake(State(state): State<AppState>) -> ActionResponse {
    let outcome = state.controller.retake();
    ActionResponse::from_outcome(&state.controller, outcome)
}

async fn reupload(State(state): State<AppState>) -> ActionResponse {
    let outcome = state.controller.reupload();
    ActionResponse::from_outcome(&state.controller, outcome)
}

async fn submit(State(state): State<AppState>) -> ActionResponse {
    let outcome = state.controller.submit().await;
    ActionResponse::from_outcome(&state.controller, outcome)
}

async fn toggle_theme(State(state): State<AppState>) -> Json<Snapshot> {
    let theme = state.controller.toggle_theme();
    info!("Theme switched to {:?}", theme);
    Json(state.controller.snapshot())
}

async fn dismiss_alert(State(state): State<AppState>) -> Json<Snapshot> {
    state.controller.dismiss_alert();
    Json(state.controller.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::tests::sample_png;
    use crate::endpoint::tests::{ok_backend, serve};
    use crate::theme::Theme;
    use reqwest::multipart::{Form, Part};
    use serde_json::Value;

    async fn spawn_service(camera_frame_path: Option<std::path::PathBuf>) -> String {
        let (backend, _) = ok_backend().await;
        let url = reqwest::Url::parse(&format!("{}/upload", backend)).unwrap();
        let controller = CaptureController::new(
            Arc::new(FrameFileCamera::new(camera_frame_path)),
            Arc::new(HttpEndpoint::new(reqwest::Client::new(), url)),
            92,
            Theme::Light,
        );
        let state = AppState {
            controller: Arc::new(controller),
        };
        serve(router(state, 1024 * 1024)).await
    }

    async fn post(client: &reqwest::Client, url: String) -> (StatusCode, Value) {
        let resp = client.post(url).send().await.unwrap();
        let status = StatusCode::from_u16(resp.status().as_u16()).unwrap();
        (status, resp.json().await.unwrap())
    }

    fn png_form() -> Form {
        let part = Part::bytes(sample_png()).file_name("plate.png");
        Form::new().part("file", part)
    }

    #[tokio::test]
    async fn test_upload_and_submit_flow() {
        let base = spawn_service(None).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/ui/file", base))
            .multipart(png_form())
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
        let snap: Value = resp.json().await.unwrap();
        assert_eq!(snap["phase"]["name"], "preview_from_file");
        assert_eq!(
            snap["visible"],
            serde_json::json!(["preview_image", "reupload", "submit"])
        );

        let (status, snap) = post(&client, format!("{}/ui/submit", base)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snap["output_text"], "cat");
        assert!(snap["result_image_src"].as_str().unwrap().ends_with("/r/1.png"));
    }

    #[tokio::test]
    async fn test_camera_capture_and_retake() {
        let path = std::env::temp_dir().join(format!("frame-{}.png", uuid::Uuid::new_v4().simple()));
        std::fs::write(&path, sample_png()).unwrap();
        let base = spawn_service(Some(path.clone())).await;
        let client = reqwest::Client::new();

        let (status, snap) = post(&client, format!("{}/ui/camera/start", base)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snap["phase"]["name"], "camera_live");
        assert_eq!(snap["camera_live"], true);

        let (_, snap) = post(&client, format!("{}/ui/camera/capture", base)).await;
        assert_eq!(snap["phase"]["name"], "preview_from_camera");
        assert_eq!(snap["camera_live"], false);
        assert!(snap["preview_src"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));

        let (_, snap) = post(&client, format!("{}/ui/retake", base)).await;
        assert_eq!(snap["visible"], serde_json::json!(["upload_label", "start_camera"]));

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_camera_denied_is_rendered() {
        let base = spawn_service(None).await;
        let client = reqwest::Client::new();

        let (status, snap) = post(&client, format!("{}/ui/camera/start", base)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snap["phase"]["name"], "idle");
        assert_eq!(snap["error_message"], "Unable to access camera.");
        assert_eq!(snap["camera_live"], false);
    }

    #[tokio::test]
    async fn test_submit_without_image_raises_alert() {
        let base = spawn_service(None).await;
        let client = reqwest::Client::new();

        let (status, snap) = post(&client, format!("{}/ui/submit", base)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(snap["alert"], "Please upload or capture a photo first!");

        let (_, snap) = post(&client, format!("{}/ui/alert/dismiss", base)).await;
        assert!(snap["alert"].is_null());
    }

    #[tokio::test]
    async fn test_capture_outside_camera_is_conflict() {
        let base = spawn_service(None).await;
        let client = reqwest::Client::new();

        let (status, _) = post(&client, format!("{}/ui/camera/capture", base)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_theme_toggle_route() {
        let base = spawn_service(None).await;
        let client = reqwest::Client::new();

        let (_, snap) = post(&client, format!("{}/ui/theme", base)).await;
        assert_eq!(snap["theme"], "dark");
        assert_eq!(snap["theme_button_label"], "☀️ Light Theme");
    }
}
