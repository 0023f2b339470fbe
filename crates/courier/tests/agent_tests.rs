//! Integration tests for request dispatch against a mock HTTP server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use courier::{
    Agent, Error, Method, Payload, ReqwestTransport, RequestOptions, Response, verbs,
};
use serde_json::json;
use tokio::sync::mpsc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type Triple = (Option<Response>, Option<Payload>, Option<Error>);

/// A callback that forwards its arguments to a channel.
fn capture() -> (
    impl FnOnce(Option<Response>, Option<Payload>, Option<Error>) + Send + 'static,
    mpsc::UnboundedReceiver<Triple>,
) {
    let (tx, rx) = mpsc::unbounded_channel::<Triple>();
    let callback = move |r: Option<Response>, p: Option<Payload>, e: Option<Error>| {
        let _ = tx.send((r, p, e));
    };
    (callback, rx)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Triple>) -> Triple {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("callback not invoked in time")
        .expect("callback dropped without being invoked")
}

#[tokio::test]
async fn test_end_decodes_json_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"a":1}"#, "application/json"))
        .mount(&mock_server)
        .await;

    let (callback, mut rx) = capture();
    let _agent = Agent::get(format!("{}/data", mock_server.uri())).end(callback);

    let (response, payload, error) = next(&mut rx).await;
    let response = response.expect("metadata present");
    assert_eq!(response.status, 200);
    assert!(response.is_json());
    assert_eq!(payload, Some(Payload::Json(json!({"a": 1}))));
    assert!(error.is_none());
}

#[tokio::test]
async fn test_end_ignores_text_body_that_looks_like_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/text"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"a":1}"#, "text/plain"))
        .mount(&mock_server)
        .await;

    let (callback, mut rx) = capture();
    let _agent = Agent::get(format!("{}/text", mock_server.uri())).end(callback);

    let (response, payload, error) = next(&mut rx).await;
    assert_eq!(response.unwrap().content_type(), Some("text/plain"));
    assert!(payload.is_none());
    assert!(error.is_none());
}

#[tokio::test]
async fn test_raw_delivers_unmodified_bytes() {
    let mock_server = MockServer::start().await;
    let body = br#"{ "spaced" : true }"#.to_vec();

    Mock::given(method("GET"))
        .and(path("/raw"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.clone(), "application/json"))
        .mount(&mock_server)
        .await;

    let (callback, mut rx) = capture();
    let _agent = Agent::get(format!("{}/raw", mock_server.uri())).raw(callback);

    let (response, payload, error) = next(&mut rx).await;
    assert!(response.is_some());
    assert_eq!(payload.and_then(Payload::into_bytes).unwrap().to_vec(), body);
    assert!(error.is_none());
}

#[tokio::test]
async fn test_send_posts_json_with_content_type() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/users"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"name": "John", "roles": ["admin"]})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1, "name": "John"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let outcome = Agent::post(format!("{}/api/users", mock_server.uri()))
        .send(&json!({"name": "John", "roles": ["admin"]}))
        .execute()
        .await;

    assert_eq!(outcome.status(), Some(201));
    let data = outcome.json().expect("decoded body");
    assert_eq!(data["id"], 1);
    assert_eq!(data["name"], "John");
}

#[tokio::test]
async fn test_set_header_is_sent_once_with_latest_value() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/headers"))
        .and(header("x-trace", "second"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let outcome = Agent::get(format!("{}/headers", mock_server.uri()))
        .set_header("X-Trace", "first")
        .set_header("x-trace", "second")
        .execute()
        .await;

    assert_eq!(outcome.status(), Some(204));
    let received = mock_server.received_requests().await.unwrap();
    assert_eq!(received[0].headers.get_all("x-trace").iter().count(), 1);
}

#[tokio::test]
async fn test_base_url_reuse_across_calls() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/users/1"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut defaults = http::HeaderMap::new();
    defaults.insert("accept", "application/json".parse().unwrap());
    let base = format!("{}/", mock_server.uri());

    let (first, mut first_rx) = capture();
    let (second, mut second_rx) = capture();
    let _agent = Agent::with_base(base, Some(defaults))
        .request(Method::Get, "users")
        .end(first)
        .request(Method::Delete, "users/1")
        .end(second);

    let (_, payload, error) = next(&mut first_rx).await;
    assert_eq!(payload, Some(Payload::Json(json!([{"id": 1}]))));
    assert!(error.is_none());

    let (response, payload, error) = next(&mut second_rx).await;
    assert_eq!(response.unwrap().status, 204);
    assert!(payload.is_none());
    assert!(error.is_none());
}

#[tokio::test]
async fn test_on_complete_matches_end() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/items/7"))
        .and(body_json(json!({"done": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let url = format!("{}/items/7", mock_server.uri());

    let (via_options, mut options_rx) = capture();
    let _agent = verbs::put_json(
        url.clone(),
        &json!({"done": true}),
        RequestOptions::new().on_complete(via_options),
    );

    let (via_end, mut end_rx) = capture();
    let _agent = Agent::put(url).send(&json!({"done": true})).end(via_end);

    let (a_response, a_payload, a_error) = next(&mut options_rx).await;
    let (b_response, b_payload, b_error) = next(&mut end_rx).await;

    assert_eq!(a_response.map(|r| r.status), b_response.map(|r| r.status));
    assert_eq!(a_payload, b_payload);
    assert_eq!(a_error, b_error);
}

#[tokio::test]
async fn test_on_complete_for_post_and_delete_verbs() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/items"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"name": "lamp"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 9})))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/items/9/touch"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/items/9"))
        .and(header("x-reason", "cleanup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"deleted": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();

    let (created, mut created_rx) = capture();
    let _agent = verbs::post_json(
        format!("{uri}/items"),
        &json!({"name": "lamp"}),
        RequestOptions::new().on_complete(created),
    );

    let (touched, mut touched_rx) = capture();
    let _agent = verbs::post(
        format!("{uri}/items/9/touch"),
        RequestOptions::new().on_complete(touched),
    );

    let (deleted, mut deleted_rx) = capture();
    let _agent = verbs::delete(
        format!("{uri}/items/9"),
        RequestOptions::new()
            .header("X-Reason", "cleanup")
            .on_complete(deleted),
    );

    let (response, payload, error) = next(&mut created_rx).await;
    assert_eq!(response.unwrap().status, 201);
    assert_eq!(payload, Some(Payload::Json(json!({"id": 9}))));
    assert!(error.is_none());

    let (response, payload, error) = next(&mut touched_rx).await;
    assert_eq!(response.unwrap().status, 202);
    assert!(payload.is_none());
    assert!(error.is_none());

    let (response, payload, error) = next(&mut deleted_rx).await;
    assert_eq!(response.unwrap().status, 200);
    assert_eq!(payload, Some(Payload::Json(json!({"deleted": true}))));
    assert!(error.is_none());
}

#[tokio::test]
async fn test_error_status_is_not_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/not-found"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"message": "no such user"})),
        )
        .mount(&mock_server)
        .await;

    let outcome = verbs::get(
        format!("{}/not-found", mock_server.uri()),
        RequestOptions::new(),
    )
    .execute()
    .await;

    let response = outcome.response.as_ref().expect("metadata present");
    assert!(response.is_client_error());
    assert_eq!(response.status_text, "Not Found");
    assert_eq!(outcome.json().unwrap()["message"], "no such user");
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn test_malformed_json_reports_error_with_metadata() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{\"a\":", "application/json"))
        .mount(&mock_server)
        .await;

    let outcome = Agent::get(format!("{}/broken", mock_server.uri()))
        .execute()
        .await;

    assert_eq!(outcome.status(), Some(200));
    assert!(outcome.payload.is_none());
    assert!(matches!(outcome.error, Some(Error::Deserialize(_))));
}

#[tokio::test]
async fn test_connection_failure_invokes_callback_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let counter = calls.clone();
    let _agent = Agent::get("http://127.0.0.1:1/unreachable").end(move |r, p, e| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send((r, p, e));
    });

    let (response, payload, error) = next(&mut rx).await;
    assert!(response.is_none());
    assert!(payload.is_none());
    assert!(error.expect("transport error").is_transport());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_relative_url_without_base_is_reported() {
    let (callback, mut rx) = capture();
    let _agent = Agent::get("users").end(callback);

    let (response, _, error) = next(&mut rx).await;
    assert!(response.is_none());
    assert!(matches!(error, Some(Error::InvalidUrl { .. })));
}

#[tokio::test]
async fn test_transport_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let transport = ReqwestTransport::builder()
        .timeout(Duration::from_millis(100))
        .build()
        .expect("Failed to build transport");

    let outcome = Agent::get(format!("{}/slow", mock_server.uri()))
        .transport(Arc::new(transport))
        .execute()
        .await;

    assert_eq!(outcome.error, Some(Error::Timeout));
    assert!(outcome.response.is_none());
}

#[test]
fn test_dispatch_outside_runtime() {
    let mock_runtime = tokio::runtime::Runtime::new().unwrap();
    let mock_server = mock_runtime.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sync"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;
        server
    });

    let outcome = Agent::get(format!("{}/sync", mock_server.uri()))
        .execute_raw()
        .blocking_wait();

    assert_eq!(outcome.bytes().map(|b| b.to_vec()), Some(b"hello".to_vec()));
}
