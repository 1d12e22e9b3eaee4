use crate::common::{body_string, client, get, request, setup, FakeNetwork};
use httpnock::{
    prelude::*,
    recorder::{self, Played, RecorderOptions},
};
use std::sync::{Arc, Mutex};

#[test]
fn record_and_playback_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, r#"{"id":1}"#);
    recorder::rec(RecorderOptions::new().output_objects(true).dont_print(true)).unwrap();

    // Act: record the real exchange
    let live = client(&network)
        .send_blocking(request(
            "POST",
            "http://api.com/items?draft=true",
            &[("content-type", "application/json")],
            r#"{"name":"x"}"#,
        ))
        .unwrap();

    let defs = recorder::play().objects().unwrap();
    recorder::stop();

    // Assert
    assert_eq!(body_string(&live), r#"{"id":1}"#);
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0].scope, "http://api.com:80");
    assert_eq!(defs[0].method, "POST");
    assert_eq!(defs[0].path, "/items?draft=true");
    assert_eq!(defs[0].body, Some(serde_json::json!({"name": "x"})));
    assert_eq!(defs[0].response, Some(serde_json::json!({"id": 1})));
    assert_eq!(
        defs[0].headers.as_ref().unwrap()["x-served-by"],
        "network"
    );
    assert!(defs[0].reqheaders.is_none());

    // Act: replay without the network
    let scopes = httpnock::define(defs).unwrap();
    disable_net_connect();
    let replayed = client(&network)
        .send_blocking(request(
            "POST",
            "http://api.com/items?draft=true",
            &[("content-type", "application/json")],
            r#"{"name":"x"}"#,
        ))
        .unwrap();

    // Assert
    assert_eq!(body_string(&replayed), r#"{"id":1}"#);
    assert_eq!(replayed.headers()["x-served-by"], "network");
    assert_eq!(network.calls().len(), 1);
    scopes[0].done();
}

#[test]
fn recording_ignores_interceptors_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "network");
    let scope = nock("http://a.com").get("/").reply(200, "mocked");
    recorder::rec(false).unwrap();

    // Act
    let res = client(&network).send_blocking(get("http://a.com/")).unwrap();
    recorder::stop();

    // Assert
    assert_eq!(body_string(&res), "network");
    assert_eq!(scope.pending_mocks().len(), 1);
    assert_eq!(recorder::recorded().len(), 1);
}

#[test]
fn record_code_snippets_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(404, "not here");
    let lines = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = lines.clone();

    recorder::rec(
        RecorderOptions::new()
            .enable_reqheaders_recording(true)
            .logging(move |output| sink.lock().unwrap().push(output.to_string())),
    )
    .unwrap();

    // Act
    client(&network)
        .send_blocking(request("GET", "http://a.com/missing", &[("Accept", "text/plain")], ""))
        .unwrap();
    recorder::stop();

    // Assert
    let code = match recorder::play() {
        Played::Code(code) => code,
        other => panic!("unexpected output: {:?}", other),
    };
    assert_eq!(code.len(), 1);
    assert!(code[0].starts_with("httpnock::nock(\"http://a.com:80\")"));
    assert!(code[0].contains(".match_header(\"accept\", \"text/plain\")"));
    assert!(code[0].contains(".reply_with_headers(404, \"not here\""));

    let lines = lines.lock().unwrap();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("<<<<<<-- cut here -->>>>>>"));
    assert!(lines[0].contains(&code[0]));
}

#[test]
fn binary_responses_are_recorded_as_base64_test() {
    // Arrange
    let _guard = setup();
    let network = Arc::new(BinaryNetwork);
    recorder::rec(RecorderOptions::new().output_objects(true).dont_print(true)).unwrap();

    // Act
    httpnock::InterceptingClient::with_transport(network)
        .send_blocking(get("http://a.com/blob"))
        .unwrap();
    recorder::stop();

    // Assert
    let defs = recorder::recorded();
    assert!(defs[0].response_is_binary);
    assert_eq!(defs[0].response, Some(serde_json::json!("/wD+")));
}

#[test]
fn binary_request_bodies_replay_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(201, "stored");
    let upload = || {
        http::Request::post("http://a.com/upload")
            .body(bytes::Bytes::from_static(&[0xff, 0xfe, 0x00, 0x01]))
            .unwrap()
    };
    recorder::rec(RecorderOptions::new().output_objects(true).dont_print(true)).unwrap();

    // Act: record the real exchange
    client(&network).send_blocking(upload()).unwrap();
    recorder::stop();
    let defs = recorder::play().objects().unwrap();

    // Assert
    assert!(defs[0].body_is_binary);
    assert_eq!(defs[0].body, Some(serde_json::json!("//4AAQ==")));

    // Act: replay without the network
    httpnock::define(defs).unwrap();
    disable_net_connect();
    let other = client(&network).send_blocking(
        http::Request::post("http://a.com/upload")
            .body(bytes::Bytes::from_static(&[0xff, 0xfe, 0x00, 0x02]))
            .unwrap(),
    );
    let replayed = client(&network).send_blocking(upload()).unwrap();

    // Assert
    assert!(matches!(other, Err(Error::NetConnectNotAllowed { .. })));
    assert_eq!(replayed.status(), 201);
    assert_eq!(body_string(&replayed), "stored");
    assert_eq!(network.calls().len(), 1);
    assert!(httpnock::is_done());
}

#[test]
fn repeated_response_headers_replay_test() {
    // Arrange
    let _guard = setup();
    let network = Arc::new(CookieNetwork);
    let client = httpnock::InterceptingClient::with_transport(network);
    recorder::rec(RecorderOptions::new().output_objects(true).dont_print(true)).unwrap();

    // Act
    let live = client.send_blocking(get("http://a.com/login")).unwrap();
    recorder::stop();
    httpnock::define(recorder::play().objects().unwrap()).unwrap();
    disable_net_connect();
    let replayed = client.send_blocking(get("http://a.com/login")).unwrap();

    // Assert
    let cookies = |res: &http::Response<bytes::Bytes>| -> Vec<String> {
        res.headers()
            .get_all("set-cookie")
            .iter()
            .map(|value| value.to_str().unwrap().to_string())
            .collect()
    };
    assert_eq!(cookies(&live), vec!["a=1", "b=2"]);
    assert_eq!(cookies(&replayed), cookies(&live));
    assert_eq!(replayed.headers()["x-served-by"], "network");
}

#[test]
fn recording_twice_fails_test() {
    // Arrange
    let _guard = setup();
    recorder::rec(false).unwrap();

    // Act
    let second = recorder::rec(true);

    // Assert
    assert!(matches!(second, Err(Error::RecordingInProgress)));
    assert!(recorder::is_recording());

    recorder::stop();
    assert!(!recorder::is_recording());
}

#[test]
fn clear_empties_the_buffer_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "");
    recorder::rec(false).unwrap();
    client(&network).send_blocking(get("http://a.com/")).unwrap();
    recorder::stop();

    // Act + Assert: the buffer survives stop until cleared
    assert_eq!(recorder::play().len(), 1);
    recorder::clear();
    assert!(recorder::play().is_empty());
}

struct BinaryNetwork;

#[async_trait::async_trait]
impl httpnock::Transport for BinaryNetwork {
    async fn send(
        &self,
        _req: http::Request<bytes::Bytes>,
    ) -> Result<http::Response<bytes::Bytes>, httpnock::TransportError> {
        Ok(http::Response::new(bytes::Bytes::from_static(&[0xff, 0x00, 0xfe])))
    }
}

struct CookieNetwork;

#[async_trait::async_trait]
impl httpnock::Transport for CookieNetwork {
    async fn send(
        &self,
        _req: http::Request<bytes::Bytes>,
    ) -> Result<http::Response<bytes::Bytes>, httpnock::TransportError> {
        http::Response::builder()
            .header("set-cookie", "a=1")
            .header("set-cookie", "b=2")
            .header("x-served-by", "network")
            .body(bytes::Bytes::from_static(b"welcome"))
            .map_err(|err| httpnock::TransportError::Other(err.to_string()))
    }
}
