//! End-to-end transfers through `UreqTransport` against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port in a background
//! runtime, then drives a real `Client` over loopback HTTP. This checks the
//! ureq adapter (head replay, body streaming, timeouts, redirects) together
//! with the engine's retry and abort rules.

use std::net::SocketAddr;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use http_engine::{
    result_code, Client, ClientConfig, Method, Outcome, RequestDatagram, RequestError,
    ResponseDatagram, SubmitOptions, TransportError,
};

/// Start the mock server on a random port and return its address.
fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn run(client: &Client, request: &RequestDatagram, options: SubmitOptions) -> (Outcome, ResponseDatagram) {
    let (tx, rx) = mpsc::channel();
    client
        .submit_with(request, options, move |outcome, response| {
            tx.send((outcome, response)).unwrap();
        })
        .unwrap();
    assert!(client.wait(Some(Duration::from_secs(30))), "request did not finish");
    rx.recv().unwrap()
}

fn get(client: &Client, url: &str) -> (Outcome, ResponseDatagram) {
    run(client, &RequestDatagram::get(url), SubmitOptions::default())
}

#[test]
fn get_hello() {
    let addr = start_server();
    let client = Client::new();

    let (outcome, response) = get(&client, &format!("http://{addr}/hello"));
    assert_eq!(result_code(&outcome), 0);
    assert_eq!(response.status(), 200);
    assert_eq!(response.header("content-length"), Some("5"));
    assert_eq!(response.body_text(), "hello");
}

#[test]
fn post_body_is_echoed() {
    let addr = start_server();
    let client = Client::new();
    let request = RequestDatagram::post(format!("http://{addr}/echo"), b"{\"n\":1}".to_vec())
        .with_header("Content-Type", "application/json");

    let (outcome, response) = run(&client, &request, SubmitOptions::default());
    assert_eq!(outcome, Ok(()));
    assert_eq!(response.header("content-type"), Some("application/json"));
    assert_eq!(response.body(), b"{\"n\":1}");
}

#[test]
fn put_and_patch_carry_bodies() {
    let addr = start_server();
    let client = Client::new();
    for method in [Method::Put, Method::Patch] {
        let request =
            RequestDatagram::new(method, format!("http://{addr}/echo")).with_body(b"data".to_vec());
        let (outcome, response) = run(&client, &request, SubmitOptions::default());
        assert_eq!(outcome, Ok(()), "{method}");
        assert_eq!(response.body(), b"data", "{method}");
    }
}

#[test]
fn request_headers_are_sent_and_repeated_response_headers_kept() {
    let addr = start_server();
    let client = Client::new();
    let request = RequestDatagram::get(format!("http://{addr}/headers"))
        .with_header("X-Tag", "one")
        .with_header("X-Tag", "two");

    let (outcome, response) = run(&client, &request, SubmitOptions::default());
    assert_eq!(outcome, Ok(()));

    let cookies: Vec<&str> = response.header_values("set-cookie").collect();
    assert_eq!(cookies, vec!["a=1", "b=2"]);

    let received: Vec<(String, String)> = serde_json::from_slice(response.body()).unwrap();
    let tags: Vec<&str> = received
        .iter()
        .filter(|(name, _)| name == "x-tag")
        .map(|(_, value)| value.as_str())
        .collect();
    assert_eq!(tags, vec!["one", "two"]);
}

#[test]
fn error_statuses_are_successful_transfers() {
    let addr = start_server();
    let client = Client::new();
    for code in [204u16, 404, 500] {
        let (outcome, response) = get(&client, &format!("http://{addr}/status/{code}"));
        assert_eq!(outcome, Ok(()), "status {code}");
        assert_eq!(response.status(), code);
    }
}

#[test]
fn head_request_has_no_body() {
    let addr = start_server();
    let client = Client::new();
    let request = RequestDatagram::new(Method::Head, format!("http://{addr}/hello"));

    let (outcome, response) = run(&client, &request, SubmitOptions::default());
    assert_eq!(outcome, Ok(()));
    assert_eq!(response.status(), 200);
    assert_eq!(response.body_len(), 0);
}

#[test]
fn redirects_are_followed() {
    let addr = start_server();
    let client = Client::new();

    let (outcome, response) = get(&client, &format!("http://{addr}/redirect"));
    assert_eq!(outcome, Ok(()));
    assert_eq!(response.status(), 200);
    assert_eq!(response.body_text(), "hello");
}

#[test]
fn large_body_is_assembled_in_order() {
    let addr = start_server();
    let client = Client::new();

    let (outcome, response) = get(&client, &format!("http://{addr}/large/200000"));
    assert_eq!(outcome, Ok(()));
    assert_eq!(response.body_len(), 200_000);
    assert!(response.body_capacity() >= response.body_len());
    let expected: Vec<u8> = (b'a'..=b'z').cycle().take(200_000).collect();
    assert_eq!(response.body(), &expected[..]);
}

#[test]
fn timeouts_are_retried_then_reported() {
    let addr = start_server();
    let client =
        Client::with_config(ClientConfig::new().with_transfer_timeout(Duration::from_millis(200)));

    let (outcome, response) = run(
        &client,
        &RequestDatagram::get(format!("http://{addr}/slow/2000")),
        SubmitOptions::default().with_retries(2),
    );
    assert_eq!(outcome, Err(RequestError::Transport(TransportError::TimedOut)));
    assert_eq!(result_code(&outcome), 28);
    assert_eq!(response.status(), 0);

    let (_, hits) = get(&client, &format!("http://{addr}/hits"));
    assert_eq!(hits.body_text(), "3");
}

#[test]
fn abort_interrupts_streaming_body() {
    let addr = start_server();
    let client = Client::new();
    let (tx, rx) = mpsc::channel();
    client
        .submit(&RequestDatagram::get(format!("http://{addr}/drip/100")), move |outcome, response| {
            tx.send((outcome, response)).unwrap();
        })
        .unwrap();

    std::thread::sleep(Duration::from_millis(350));
    assert!(client.is_busy());
    let started = Instant::now();
    client.abort();
    assert!(client.wait(Some(Duration::from_secs(5))));
    assert!(started.elapsed() < Duration::from_secs(5));

    let (outcome, response) = rx.recv().unwrap();
    assert_eq!(outcome, Err(RequestError::Aborted));
    assert_eq!(result_code(&outcome), -4);
    assert_eq!(response.body_len(), 0);

    // The client is usable again after an abort.
    let (outcome, response) = get(&client, &format!("http://{addr}/hello"));
    assert_eq!(outcome, Ok(()));
    assert_eq!(response.body_text(), "hello");
}

#[test]
fn abort_before_response_head() {
    let addr = start_server();
    let client = Client::new();
    let (tx, rx) = mpsc::channel();
    client
        .submit(&RequestDatagram::get(format!("http://{addr}/slow/4000")), move |outcome, response| {
            tx.send((outcome, response)).unwrap();
        })
        .unwrap();

    std::thread::sleep(Duration::from_millis(200));
    let started = Instant::now();
    client.abort();
    assert!(client.wait(Some(Duration::from_secs(1))), "abort did not end the transfer");
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!client.is_busy());

    let (outcome, response) = rx.recv().unwrap();
    assert_eq!(result_code(&outcome), -4);
    assert_eq!(response.status(), 0);
}

#[test]
fn drop_does_not_wait_for_slow_server() {
    let addr = start_server();
    let client = Client::new();
    client
        .submit(&RequestDatagram::get(format!("http://{addr}/slow/4000")), |_, _| {})
        .unwrap();
    std::thread::sleep(Duration::from_millis(200));

    let started = Instant::now();
    drop(client);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn refused_connection_fails_without_retry_semantics() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let client = Client::new();

    let (outcome, response) = run(
        &client,
        &RequestDatagram::get(format!("http://{addr}/")),
        SubmitOptions::default()
            .with_connect_timeout(Duration::from_millis(500))
            .with_retries(3),
    );
    match outcome {
        Err(RequestError::Transport(err)) => assert!(!err.is_timeout(), "{err:?}"),
        other => panic!("expected transport failure, got {other:?}"),
    }
    assert_eq!(response.status(), 0);
}

#[test]
fn non_http_scheme_is_rejected() {
    let client = Client::new();
    let (outcome, _) = get(&client, "ftp://127.0.0.1/file");
    assert_eq!(outcome, Err(RequestError::Transport(TransportError::UnsupportedProtocol)));
    assert_eq!(result_code(&outcome), 1);
}

#[test]
fn connect_method_is_unsupported() {
    let client = Client::new();
    let request = RequestDatagram::new(Method::Connect, "http://127.0.0.1:9/");
    let (outcome, _) = run(&client, &request, SubmitOptions::default());
    assert_eq!(outcome, Err(RequestError::UnsupportedMethod(Method::Connect)));
    assert_eq!(result_code(&outcome), -2);
}
