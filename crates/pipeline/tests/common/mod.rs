//! Shared fixtures: a fake conversion function and an invoker wired to
//! local-disk storage.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use sketchbook_converter::{encode_image, ConversionApi, ConverterConfig};
use sketchbook_pipeline::ConversionInvoker;
use sketchbook_storage::local::LocalBackend;
use sketchbook_storage::{StorageBackend, StorageGateway};
use sqlx::PgPool;
use tempfile::TempDir;

pub const LEASE: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Fake conversion function
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Mode {
    Succeed,
    Decline(String),
    Unavailable,
}

pub struct FakeFunction {
    mode: Mutex<Mode>,
    latency: Mutex<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<serde_json::Value>>,
}

impl FakeFunction {
    pub fn set_mode(&self, mode: Mode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<serde_json::Value> {
        self.seen.lock().unwrap().last().cloned()
    }

    async fn record(&self, body: serde_json::Value) -> Mode {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(body);
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.mode.lock().unwrap().clone()
    }
}

async fn convert_script(
    State(fake): State<Arc<FakeFunction>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let file_name = body["fileName"].as_str().unwrap_or_default().to_string();
    match fake.record(body).await {
        Mode::Succeed => Json(serde_json::json!({
            "success": true,
            "message": "converted",
            "jsContent": format!("// converted from {file_name}\nfunction setup() {{}}"),
        }))
        .into_response(),
        Mode::Decline(message) => {
            Json(serde_json::json!({"success": false, "message": message})).into_response()
        }
        Mode::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "overloaded").into_response(),
    }
}

async fn convert_image(
    State(fake): State<Arc<FakeFunction>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    match fake.record(body).await {
        Mode::Succeed => Json(serde_json::json!({
            "success": true,
            "imageDerivedData": encode_image(&png(2, 2)),
            "compressionRatio": 0.5,
        }))
        .into_response(),
        Mode::Decline(message) => {
            Json(serde_json::json!({"success": false, "message": message})).into_response()
        }
        Mode::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "overloaded").into_response(),
    }
}

/// Start a fake conversion function and return a client pointed at it.
pub async fn spawn_function() -> (ConversionApi, Arc<FakeFunction>) {
    let fake = Arc::new(FakeFunction {
        mode: Mutex::new(Mode::Succeed),
        latency: Mutex::new(Duration::ZERO),
        calls: AtomicUsize::new(0),
        seen: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route("/convert/script", post(convert_script))
        .route("/convert/image", post(convert_image))
        .with_state(Arc::clone(&fake));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = ConverterConfig {
        script_url: format!("http://{addr}/convert/script"),
        image_url: format!("http://{addr}/convert/image"),
        timeout: Duration::from_secs(10),
    };
    (ConversionApi::new(&config).unwrap(), fake)
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub invoker: Arc<ConversionInvoker>,
    pub fake: Arc<FakeFunction>,
    pub storage: Arc<StorageGateway>,
    pub uploads: TempDir,
}

pub async fn harness(pool: PgPool) -> Harness {
    harness_with_lease(pool, LEASE).await
}

pub async fn harness_with_lease(pool: PgPool, lease: Duration) -> Harness {
    let uploads = tempfile::tempdir().unwrap();
    let backends: Vec<Arc<dyn StorageBackend>> = vec![Arc::new(LocalBackend::new(uploads.path()))];
    let storage = Arc::new(StorageGateway::new(backends, Duration::from_secs(3600)).unwrap());
    let (api, fake) = spawn_function().await;
    let invoker = Arc::new(ConversionInvoker::new(pool, api, Arc::clone(&storage), lease));
    Harness {
        invoker,
        fake,
        storage,
        uploads,
    }
}

/// Encode a blank RGB image as PNG.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Poll `check` until it returns true or `timeout` elapses.
pub async fn eventually<F: FnMut() -> bool>(timeout: Duration, mut check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
