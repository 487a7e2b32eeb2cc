//! Test application wired to a real database, local-disk storage and a
//! fake conversion function.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use http_body_util::BodyExt;
use sketchbook_api::config::ServerConfig;
use sketchbook_api::router::build_app_router;
use sketchbook_api::state::AppState;
use sketchbook_converter::{encode_image, ConversionApi, ConverterConfig};
use sketchbook_pipeline::{ConversionInvoker, RetryConfig, RetrySupervisor};
use sketchbook_storage::local::LocalBackend;
use sketchbook_storage::{StorageBackend, StorageGateway};
use sqlx::PgPool;
use tempfile::TempDir;
use tokio_util::task::TaskTracker;
use tower::ServiceExt;

/// Delay before a scheduled retry runs.
pub const RETRY_DELAY: Duration = Duration::from_millis(200);

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout: Duration::from_secs(5),
    }
}

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

    async fn record(&self) -> Mode {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.mode.lock().unwrap().clone()
    }
}

fn failure(mode: Mode) -> Response {
    match mode {
        Mode::Decline(message) => {
            Json(serde_json::json!({"success": false, "message": message})).into_response()
        }
        _ => (StatusCode::SERVICE_UNAVAILABLE, "overloaded").into_response(),
    }
}

async fn convert_script(
    State(fake): State<Arc<FakeFunction>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    match fake.record().await {
        Mode::Succeed => Json(serde_json::json!({
            "success": true,
            "jsContent": format!("// {}\nfunction setup() {{}}", body["fileName"]),
        }))
        .into_response(),
        other => failure(other),
    }
}

async fn convert_image(State(fake): State<Arc<FakeFunction>>) -> Response {
    match fake.record().await {
        Mode::Succeed => Json(serde_json::json!({
            "success": true,
            "imageDerivedData": encode_image(&png(2, 2)),
        }))
        .into_response(),
        other => failure(other),
    }
}

async fn spawn_function() -> (ConversionApi, Arc<FakeFunction>) {
    let fake = Arc::new(FakeFunction {
        mode: Mutex::new(Mode::Succeed),
        latency: Mutex::new(Duration::ZERO),
        calls: AtomicUsize::new(0),
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
// Application
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub fake: Arc<FakeFunction>,
    pub uploads: TempDir,
}

/// Build the full application router with all middleware layers, using the
/// given database pool.
pub async fn build_test_app(pool: PgPool) -> TestApp {
    let config = test_config();
    let uploads = tempfile::tempdir().unwrap();
    let backends: Vec<Arc<dyn StorageBackend>> = vec![Arc::new(LocalBackend::new(uploads.path()))];
    let storage = Arc::new(StorageGateway::new(backends, Duration::from_secs(3600)).unwrap());

    let (api, fake) = spawn_function().await;
    let invoker = Arc::new(ConversionInvoker::new(
        pool.clone(),
        api,
        Arc::clone(&storage),
        Duration::from_secs(60),
    ));
    let supervisor = Arc::new(RetrySupervisor::start(
        Arc::clone(&invoker),
        RetryConfig {
            queue_capacity: 16,
            concurrency: 2,
            max_attempts: 1,
            delay: RETRY_DELAY,
        },
    ));

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        invoker,
        supervisor,
        storage,
        attempts: TaskTracker::new(),
    };
    let router = build_app_router(state.clone(), &config).unwrap();

    TestApp {
        router,
        state,
        fake,
        uploads,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &TestApp, request: Request<Body>) -> Response {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn post_empty(app: &TestApp, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn send_json(
    app: &TestApp,
    method: Method,
    uri: &str,
    body: serde_json::Value,
) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

const BOUNDARY: &str = "sketchbook-test-boundary";

pub async fn send_file(
    app: &TestApp,
    method: Method,
    uri: &str,
    file_name: &str,
    data: &[u8],
) -> Response {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Encode a blank RGB image as PNG.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}
