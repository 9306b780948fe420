use std::sync::Arc;
use std::time::Duration;

use differer::test_util::{create_test_state, StubRunner};
use differer::{app, routes, HttpRunner, Runner};
use differer_common::{decode_job, encode_result, RunResult};
use http::{Method, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{header, method};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

async fn send_request(
    app: &axum::Router,
    method: Method,
    uri: &str,
    body: Option<String>,
) -> (StatusCode, Vec<u8>) {
    let mut req_builder = http::Request::builder().method(method).uri(uri);

    if body.is_some() {
        req_builder = req_builder.header("Content-Type", "application/json");
    }

    let req = req_builder
        .body(match body {
            Some(b) => axum::body::Body::from(b),
            None => axum::body::Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

fn batch(addresses: &[&str]) -> Option<String> {
    Some(json!({ "addresses": addresses }).to_string())
}

fn stub_app(stub: &Arc<StubRunner>) -> axum::Router {
    let runners: Vec<Arc<dyn Runner>> = vec![Arc::clone(stub) as Arc<dyn Runner>];
    routes::router(create_test_state(runners))
}

#[tokio::test]
async fn test_valid_batch() {
    let stub = Arc::new(StubRunner::returning(RunResult::ok("bbac", "test")));
    let app = stub_app(&stub);

    let (status, body) = send_request(
        &app,
        Method::POST,
        "/differer",
        batch(&["https://example.com/"]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let got: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        got,
        json!({
            "results": [{
                "runner": "stub",
                "string": "https://example.com/",
                "outputs": {"id": "bbac", "value": "test", "error": ""}
            }]
        })
    );
}

#[tokio::test]
async fn test_bad_runner_yields_null_output() {
    let stub = Arc::new(StubRunner::failing("bad runner"));
    let app = stub_app(&stub);

    let (status, body) = send_request(
        &app,
        Method::POST,
        "/differer",
        batch(&["https://example.com/"]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let got: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        got,
        json!({
            "results": [{
                "runner": "stub",
                "string": "https://example.com/",
                "outputs": null
            }]
        })
    );
}

#[tokio::test]
async fn test_response_is_json() {
    let stub = Arc::new(StubRunner::returning(RunResult::ok("a", "b")));
    let app = stub_app(&stub);

    let req = http::Request::builder()
        .method(Method::POST)
        .uri("/differer")
        .body(axum::body::Body::from(batch(&["x"]).unwrap()))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );
}

#[tokio::test]
async fn test_invalid_method() {
    let stub = Arc::new(StubRunner::failing("invalid method"));
    let app = stub_app(&stub);

    let (status, _) = send_request(&app, Method::GET, "/differer", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(stub.received().is_empty());
}

#[tokio::test]
async fn test_empty_input() {
    let stub = Arc::new(StubRunner::failing("empty input"));
    let app = stub_app(&stub);

    let (status, body) = send_request(&app, Method::POST, "/differer", batch(&[])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, b"No addresses were received");
    assert!(stub.received().is_empty());
}

#[tokio::test]
async fn test_missing_addresses_read_as_empty() {
    let stub = Arc::new(StubRunner::returning(RunResult::ok("a", "b")));
    let app = stub_app(&stub);

    for body in ["{}", r#"{"addresses": null}"#, "null"] {
        let (status, reply) =
            send_request(&app, Method::POST, "/differer", Some(body.to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body:?}");
        assert_eq!(reply, b"No addresses were received");
    }
    assert!(stub.received().is_empty());
}

#[tokio::test]
async fn test_too_many_addresses() {
    let stub = Arc::new(StubRunner::returning(RunResult::ok("a", "b")));
    let app = stub_app(&stub);

    let addresses: Vec<String> = (0..4097).map(|i| format!("https://{i}.example/")).collect();
    let body = json!({ "addresses": addresses }).to_string();
    let (status, body) = send_request(&app, Method::POST, "/differer", Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, b"Only 4096 addresses can be passed at once");
    assert!(stub.received().is_empty());
}

#[tokio::test]
async fn test_empty_address() {
    let stub = Arc::new(StubRunner::returning(RunResult::ok("a", "b")));
    let app = stub_app(&stub);

    let (status, body) = send_request(&app, Method::POST, "/differer", batch(&["ok", ""])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, b"Empty addresses are not allowed");
    assert!(stub.received().is_empty());
}

#[tokio::test]
async fn test_address_length_limit() {
    let stub = Arc::new(StubRunner::returning(RunResult::ok("a", "b")));
    let app = stub_app(&stub);

    let longest = "a".repeat(128);
    let (status, _) = send_request(
        &app,
        Method::POST,
        "/differer",
        batch(&[longest.as_str()]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let too_long = "a".repeat(129);
    let (status, body) = send_request(
        &app,
        Method::POST,
        "/differer",
        batch(&[too_long.as_str()]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, b"Max supported address length is 128");
}

#[tokio::test]
async fn test_malformed_json() {
    let stub = Arc::new(StubRunner::returning(RunResult::ok("a", "b")));
    let app = stub_app(&stub);

    for body in ["{", r#"{"addresses": "https://example.com/"}"#, "42"] {
        let (status, reply) = send_request(
            &app,
            Method::POST,
            "/differer",
            Some(body.to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body:?}");
        assert_eq!(reply, b"Bad schema");
    }
    assert!(stub.received().is_empty());
}

#[tokio::test]
async fn test_unknown_path() {
    let stub = Arc::new(StubRunner::returning(RunResult::ok("a", "b")));
    let app = stub_app(&stub);

    let (status, _) = send_request(&app, Method::POST, "/nonexistent", batch(&["x"])).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_no_runners_returns_empty_results() {
    let app = routes::router(create_test_state(Vec::new()));

    let (status, body) = send_request(
        &app,
        Method::POST,
        "/differer",
        batch(&["https://example.com/"]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let got: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(got, json!({ "results": [] }));
}

#[tokio::test]
async fn test_health_reports_runner_count() {
    let runners: Vec<Arc<dyn Runner>> = vec![
        Arc::new(StubRunner::returning(RunResult::ok("a", "b")).named("one")),
        Arc::new(StubRunner::returning(RunResult::ok("a", "b")).named("two")),
    ];
    let app = app(create_test_state(runners));

    let (status, body) = send_request(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    let got: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(got["status"], "ok");
    assert_eq!(got["runners"], 2);
}

#[tokio::test]
async fn test_http_runners_end_to_end() {
    let echo = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("content-type", "application/protobuf"))
        .respond_with(|req: &Request| {
            let job = decode_job(&req.body).unwrap();
            let result = RunResult::ok("echo", job.address);
            ResponseTemplate::new(200).set_body_bytes(encode_result(&result).unwrap().to_vec())
        })
        .expect(2)
        .mount(&echo)
        .await;

    let broken = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&broken)
        .await;

    let client = reqwest::Client::new();
    let runners: Vec<Arc<dyn Runner>> = vec![
        Arc::new(HttpRunner::new("echo", echo.uri().parse().unwrap(), client.clone())),
        Arc::new(HttpRunner::new("broken", broken.uri().parse().unwrap(), client)),
    ];
    let app = app(create_test_state(runners));

    let (status, body) = send_request(
        &app,
        Method::POST,
        "/differer",
        batch(&["https://example.com/", "https://example.org/"]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let got: Value = serde_json::from_slice(&body).unwrap();
    let results = got["results"].as_array().unwrap();
    assert_eq!(results.len(), 4);
    for result in results {
        match result["runner"].as_str().unwrap() {
            "echo" => {
                assert_eq!(result["outputs"]["id"], "echo");
                assert_eq!(result["outputs"]["value"], result["string"]);
            }
            "broken" => assert!(result["outputs"].is_null()),
            other => panic!("unexpected runner {other}"),
        }
    }
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_batches() {
    let runners: Vec<Arc<dyn Runner>> = vec![
        Arc::new(StubRunner::hanging().named("slow")),
        Arc::new(StubRunner::returning(RunResult::ok("fast", "v")).named("fast")),
    ];
    let state = create_test_state(runners);
    let shutdown = state.shutdown.clone();
    let app = routes::router(state);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
    });

    let (status, body) = tokio::time::timeout(
        Duration::from_secs(5),
        send_request(&app, Method::POST, "/differer", batch(&["https://example.com/"])),
    )
    .await
    .expect("batch did not finish after shutdown");

    assert_eq!(status, StatusCode::OK);
    let got: Value = serde_json::from_slice(&body).unwrap();
    let results = got["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    for result in results {
        match result["runner"].as_str().unwrap() {
            "slow" => assert!(result["outputs"].is_null()),
            _ => assert_eq!(result["outputs"]["value"], "v"),
        }
    }
}
