use axum::body::Body;
use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, app_with_hits, Hits, DRIP_CHUNK};
use tower::ServiceExt;

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// --- hello ---

#[tokio::test]
async fn hello_returns_five_bytes() {
    let resp = app().oneshot(get("/hello")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, "hello");
}

// --- echo ---

#[tokio::test]
async fn echo_returns_body_and_content_type() {
    let req = Request::builder()
        .method("POST")
        .uri("/echo")
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "application/json");
    assert_eq!(body_bytes(resp).await, "{}");
}

#[tokio::test]
async fn echo_defaults_to_octet_stream() {
    let req = Request::builder()
        .method("PUT")
        .uri("/echo")
        .body(Body::from(vec![0u8, 1, 2]))
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();

    assert_eq!(
        resp.headers()[http::header::CONTENT_TYPE],
        "application/octet-stream"
    );
    assert_eq!(&body_bytes(resp).await[..], &[0u8, 1, 2][..]);
}

// --- headers ---

#[tokio::test]
async fn headers_lists_request_fields_and_repeats_set_cookie() {
    let req = Request::builder()
        .uri("/headers")
        .header("x-tag", "one")
        .header("x-tag", "two")
        .body(Body::empty())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();

    let cookies: Vec<_> = resp
        .headers()
        .get_all(http::header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(cookies, vec!["a=1", "b=2"]);

    let received: Vec<(String, String)> =
        serde_json::from_slice(&body_bytes(resp).await).unwrap();
    let tags: Vec<&str> = received
        .iter()
        .filter(|(name, _)| name == "x-tag")
        .map(|(_, value)| value.as_str())
        .collect();
    assert_eq!(tags, vec!["one", "two"]);
}

// --- slow / hits ---

#[tokio::test]
async fn slow_counts_hits() {
    let hits = Hits::default();
    let app = app_with_hits(hits.clone());

    let resp = app.clone().oneshot(get("/slow/10")).await.unwrap();
    assert_eq!(body_bytes(resp).await, "slow");
    let resp = app.clone().oneshot(get("/slow/0")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(hits.slow(), 2);
    let resp = app.oneshot(get("/hits")).await.unwrap();
    assert_eq!(body_bytes(resp).await, "2");
}

// --- drip ---

#[tokio::test]
async fn drip_streams_requested_chunks() {
    let resp = app().oneshot(get("/drip/3")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, DRIP_CHUNK.repeat(3));
}

// --- large ---

#[tokio::test]
async fn large_returns_exact_length() {
    let resp = app().oneshot(get("/large/70000")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await.len(), 70000);
}

// --- status / redirect ---

#[tokio::test]
async fn status_echoes_code() {
    let resp = app().oneshot(get("/status/503")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn redirect_points_to_hello() {
    let resp = app().oneshot(get("/redirect")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers()[http::header::LOCATION], "/hello");
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let resp = app().oneshot(get("/nope")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
