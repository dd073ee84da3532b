//! Local HTTP fixtures for exercising the request engine end to end.
//!
//! Every route models one transfer behaviour the engine has to handle:
//! plain bodies, echoes, repeated headers, slow and streaming responses,
//! arbitrary status codes and redirects. Hits on `/slow` are counted so
//! tests can verify how many attempts reached the server.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use futures::stream;
use tokio::net::TcpListener;

/// Delay between two chunks of a `/drip` response.
pub const DRIP_INTERVAL: Duration = Duration::from_millis(100);

/// Payload of one `/drip` chunk.
pub const DRIP_CHUNK: &[u8] = b"drip\n";

#[derive(Clone, Default)]
pub struct Hits {
    slow: Arc<AtomicUsize>,
}

impl Hits {
    pub fn slow(&self) -> usize {
        self.slow.load(Ordering::SeqCst)
    }
}

pub fn app() -> Router {
    app_with_hits(Hits::default())
}

/// Build the router around a caller-visible hit counter.
pub fn app_with_hits(hits: Hits) -> Router {
    Router::new()
        .route("/hello", get(hello))
        .route("/echo", get(echo).post(echo).put(echo).patch(echo).delete(echo))
        .route("/headers", get(headers))
        .route("/slow/{ms}", get(slow))
        .route("/hits", get(hit_count))
        .route("/drip/{chunks}", get(drip))
        .route("/large/{bytes}", get(large))
        .route("/status/{code}", get(status))
        .route("/redirect", get(redirect))
        .with_state(hits)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn hello() -> &'static str {
    "hello"
}

/// Returns the request body unchanged, keeping its content type.
async fn echo(headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| header::HeaderValue::from_static("application/octet-stream"));
    ([(header::CONTENT_TYPE, content_type)], body).into_response()
}

/// Lists the received request headers and answers with a repeated header.
async fn headers(headers: HeaderMap) -> Response {
    let received: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    (
        AppendHeaders([(header::SET_COOKIE, "a=1"), (header::SET_COOKIE, "b=2")]),
        Json(received),
    )
        .into_response()
}

async fn slow(State(hits): State<Hits>, Path(ms): Path<u64>) -> &'static str {
    let hit = hits.slow.fetch_add(1, Ordering::SeqCst) + 1;
    tracing::debug!(ms, hit, "slow request");
    tokio::time::sleep(Duration::from_millis(ms)).await;
    "slow"
}

async fn hit_count(State(hits): State<Hits>) -> String {
    hits.slow().to_string()
}

/// Streams `chunks` small chunks, one every `DRIP_INTERVAL`.
async fn drip(Path(chunks): Path<u32>) -> Response {
    let body = stream::unfold(0u32, move |sent| async move {
        if sent >= chunks {
            return None;
        }
        tokio::time::sleep(DRIP_INTERVAL).await;
        Some((Ok::<_, std::io::Error>(Bytes::from_static(DRIP_CHUNK)), sent + 1))
    });
    Body::from_stream(body).into_response()
}

/// A body of exactly `bytes` bytes cycling through `a..=z`.
async fn large(Path(bytes): Path<usize>) -> Vec<u8> {
    (b'a'..=b'z').cycle().take(bytes).collect()
}

async fn status(Path(code): Path<u16>) -> Result<StatusCode, StatusCode> {
    StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)
}

async fn redirect() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/hello")]).into_response()
}
