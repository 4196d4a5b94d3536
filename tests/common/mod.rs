//! In-process stand-in for the images API and the host serving the results.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Multipart, Path as UrlPath, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION, header::CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use openai_variations::variation::VariationClient;

pub const API_KEY: &str = "sk-test-key";

/// Smallest valid PNG signature plus padding; the stand-in never decodes it.
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13, b'I', b'H', b'D', b'R',
];

/// One multipart field as the stand-in received it.
#[derive(Clone, Debug)]
pub struct ReceivedField {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ReceivedField {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).to_string()
    }
}

/// One entry of the variations response.
#[derive(Clone, Debug)]
enum Entry {
    /// Served by the image route.
    Hosted(String),
    /// Served with a body shorter than its `content-length`.
    Truncated(String),
    /// Sends part of the body, then goes quiet.
    Stalled(String),
    /// `b64_json` only, no `url`.
    NoUrl,
}

/// How long a stalled download stays quiet.
const STALL: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
struct MockState {
    base: String,
    raw_base: String,
    entries: Arc<Vec<Entry>>,
    failing: Arc<Vec<String>>,
    reject: Option<(u16, Value)>,
    delay: Option<Duration>,
    variation_calls: Arc<AtomicUsize>,
    download_calls: Arc<AtomicUsize>,
    fields: Arc<Mutex<Vec<ReceivedField>>>,
    last_response: Arc<Mutex<Option<Value>>>,
}

/// Builder for [`MockApi`].
#[derive(Default)]
pub struct MockApiBuilder {
    entries: Vec<Entry>,
    failing: Vec<String>,
    reject: Option<(u16, Value)>,
    delay: Option<Duration>,
}

impl MockApiBuilder {
    /// Image names returned by the variations endpoint, in order.
    pub fn images(mut self, names: &[&str]) -> Self {
        self.entries
            .extend(names.iter().map(|name| Entry::Hosted(name.to_string())));
        self
    }

    /// Adds an image whose body ends before its declared length.
    pub fn truncated(mut self, name: &str) -> Self {
        self.entries.push(Entry::Truncated(name.to_string()));
        self
    }

    /// Adds an image whose body stops arriving partway through.
    pub fn stalled(mut self, name: &str) -> Self {
        self.entries.push(Entry::Stalled(name.to_string()));
        self
    }

    /// Adds an entry that carries no url.
    pub fn without_url(mut self) -> Self {
        self.entries.push(Entry::NoUrl);
        self
    }

    /// Image names the host answers with 404.
    pub fn failing(mut self, names: &[&str]) -> Self {
        self.failing = names.iter().map(|name| name.to_string()).collect();
        self
    }

    /// Makes the variations endpoint answer with this status and body.
    pub fn reject(mut self, status: u16, body: Value) -> Self {
        self.reject = Some((status, body));
        self
    }

    /// Holds every variations call for this long before answering.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn start(self) -> MockApi {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock api");
        let addr = listener.local_addr().expect("mock api address");
        let raw_listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind raw image host");
        let raw_addr = raw_listener.local_addr().expect("raw host address");
        let state = MockState {
            base: format!("http://{addr}"),
            raw_base: format!("http://{raw_addr}"),
            entries: Arc::new(self.entries),
            failing: Arc::new(self.failing),
            reject: self.reject,
            delay: self.delay,
            variation_calls: Arc::new(AtomicUsize::new(0)),
            download_calls: Arc::new(AtomicUsize::new(0)),
            fields: Arc::new(Mutex::new(Vec::new())),
            last_response: Arc::new(Mutex::new(None)),
        };

        let app = Router::new()
            .route(
                "/v1/images/variations",
                axum::routing::post(create_variation_handler),
            )
            .route("/images/{name}", axum::routing::get(image_handler))
            .with_state(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        tokio::spawn(serve_raw(raw_listener, Arc::clone(&state.download_calls)));

        MockApi { addr, state }
    }
}

/// A running stand-in server.
pub struct MockApi {
    addr: SocketAddr,
    state: MockState,
}

impl MockApi {
    pub fn builder() -> MockApiBuilder {
        MockApiBuilder::default()
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/v1/", self.addr)
    }

    pub fn image_url(&self, name: &str) -> String {
        format!("{}/images/{name}", self.state.base)
    }

    pub fn variation_calls(&self) -> usize {
        self.state.variation_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.state.download_calls.load(Ordering::SeqCst)
    }

    pub fn fields(&self) -> Vec<ReceivedField> {
        self.state.fields.lock().expect("fields lock").clone()
    }

    pub fn field(&self, name: &str) -> Option<ReceivedField> {
        self.fields().into_iter().find(|field| field.name == name)
    }

    pub fn last_response(&self) -> Option<Value> {
        self.state.last_response.lock().expect("response lock").clone()
    }

    /// A client pointed at this server, writing into `output_dir`.
    pub fn client(&self, output_dir: &Path) -> VariationClient {
        self.client_with_timeout(output_dir, Duration::from_secs(10))
    }

    /// Like [`MockApi::client`], with a custom per-image download timeout.
    pub fn client_with_timeout(&self, output_dir: &Path, timeout: Duration) -> VariationClient {
        VariationClient::builder()
            .api_key(API_KEY)
            .base_url(self.base_url())
            .output_dir(output_dir)
            .download_timeout(timeout)
            .build()
            .expect("client")
    }
}

/// Writes a small PNG named `name` into `dir`.
pub fn write_source(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, PNG_BYTES).expect("write source image");
    path
}

/// Files directly inside `dir`, sorted by name.
pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names = std::fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().to_string())
        .collect::<Vec<_>>();
    names.sort();
    names
}

fn error_body(message: &str) -> Value {
    json!({"error": {"message": message, "type": "invalid_request_error", "param": null, "code": null}})
}

async fn create_variation_handler(
    State(state): State<MockState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    state.variation_calls.fetch_add(1, Ordering::SeqCst);

    let mut fields = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        fields.push(ReceivedField {
            name,
            file_name,
            content_type,
            bytes,
        });
    }
    *state.fields.lock().expect("fields lock") = fields;

    // answer only after the upload is drained
    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {API_KEY}"));
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(error_body("Incorrect API key provided")),
        )
            .into_response();
    }

    if let Some(delay) = state.delay {
        tokio::time::sleep(delay).await;
    }

    if let Some((status, body)) = &state.reject {
        let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST);
        return (status, axum::Json(body.clone())).into_response();
    }

    let data = state
        .entries
        .iter()
        .map(|entry| match entry {
            Entry::Hosted(name) => {
                json!({"url": format!("{}/images/{name}?st=2023-06-14&sig=abc", state.base)})
            }
            Entry::Truncated(name) => json!({"url": format!("{}/truncated/{name}", state.raw_base)}),
            Entry::Stalled(name) => json!({"url": format!("{}/stalled/{name}", state.raw_base)}),
            Entry::NoUrl => json!({"b64_json": "iVBORw0KGgo="}),
        })
        .collect::<Vec<_>>();
    let body = json!({"created": 1686700000, "data": data});
    *state.last_response.lock().expect("response lock") = Some(body.clone());
    axum::Json(body).into_response()
}

async fn image_handler(State(state): State<MockState>, UrlPath(name): UrlPath<String>) -> Response {
    state.download_calls.fetch_add(1, Ordering::SeqCst);
    if state.failing.contains(&name) {
        return (StatusCode::NOT_FOUND, "BlobNotFound").into_response();
    }
    ([(CONTENT_TYPE, "image/png")], PNG_BYTES.to_vec()).into_response()
}

/// Plain HTTP/1.1 host for downloads that go wrong partway through.
///
/// Each response declares four times the bytes it sends. `/stalled/` paths
/// then hold the connection open for [`STALL`], the rest close it at once.
async fn serve_raw(listener: TcpListener, download_calls: Arc<AtomicUsize>) {
    while let Ok((socket, _)) = listener.accept().await {
        download_calls.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(answer_raw(socket));
    }
}

async fn answer_raw(mut socket: TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|window| window == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(read) => request.extend_from_slice(&buf[..read]),
        }
    }

    let head = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: image/png\r\ncontent-length: {}\r\n\r\n",
        PNG_BYTES.len() * 4
    );
    if socket.write_all(head.as_bytes()).await.is_err()
        || socket.write_all(PNG_BYTES).await.is_err()
        || socket.flush().await.is_err()
    {
        return;
    }
    if request.starts_with(b"GET /stalled/") {
        tokio::time::sleep(STALL).await;
    }
}
