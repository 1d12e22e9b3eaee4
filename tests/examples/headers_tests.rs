use crate::common::{body_string, client, get, request, setup, FakeNetwork};
use chrono::{TimeZone, Utc};
use httpnock::{prelude::*, HeaderValueSource};

#[test]
fn request_headers_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "");

    let scope = nock_with_options(
        "http://api.com",
        NockOptions::new()
            .reqheader("authorization", "Bearer token")
            .badheader("x-debug"),
    )
    .match_header("accept", Regex::new("json").unwrap())
    .get("/me")
    .match_header("X-Request-Id", ValueMatcher::predicate(|v| v.len() == 4))
    .reply(200, "me");

    let client = client(&network);
    let headers = [
        ("Authorization", "Bearer token"),
        ("Accept", "application/json"),
        ("x-request-id", "abcd"),
    ];

    // Act
    let missing = client.send_blocking(request("GET", "http://api.com/me", &headers[..2], ""));
    let forbidden = client.send_blocking(request(
        "GET",
        "http://api.com/me",
        &[headers[0], headers[1], headers[2], ("x-debug", "1")],
        "",
    ));
    let res = client
        .send_blocking(request("GET", "http://api.com/me", &headers, ""))
        .unwrap();

    // Assert
    assert!(matches!(missing, Err(Error::NoMatch { .. })));
    assert!(matches!(forbidden, Err(Error::NoMatch { .. })));
    assert_eq!(res.status(), 200);
    scope.done();
}

#[test]
fn reply_headers_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "");

    let scope = nock("http://api.com")
        .default_reply_headers([("X-Powered-By", "nock"), ("Content-Type", "text/plain")])
        .get("/page")
        .reply_with_headers(
            200,
            "<html></html>",
            [
                ("content-type", HeaderValueSource::from("text/html")),
                (
                    "x-requested-path",
                    HeaderValueSource::dynamic(|req: &HttpRequest, _body: &[u8]| {
                        req.path().to_string()
                    }),
                ),
            ],
        );

    // Act
    let res = client(&network)
        .send_blocking(get("http://api.com/page"))
        .unwrap();

    // Assert
    let content_types: Vec<_> = res.headers().get_all("content-type").iter().collect();
    assert_eq!(content_types, vec!["text/html"]);
    assert_eq!(res.headers()["x-powered-by"], "nock");
    assert_eq!(res.headers()["x-requested-path"], "/page");
    assert_eq!(body_string(&res), "<html></html>");
    scope.done();
}

#[test]
fn content_length_and_date_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "");
    let date = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();

    let scope = nock("http://api.com")
        .reply_content_length()
        .reply_date(date)
        .get("/sized")
        .reply_with_headers(200, "hello", [("Content-Length", "999")]);

    // Act
    let res = client(&network)
        .send_blocking(get("http://api.com/sized"))
        .unwrap();

    // Assert
    assert_eq!(res.headers()["content-length"], "5");
    assert_eq!(res.headers()["date"], "Thu, 02 Jan 2020 03:04:05 GMT");
    scope.done();
}

#[test]
fn json_replies_keep_explicit_content_type_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "");

    let scope = nock("http://api.com")
        .get("/problem")
        .reply_with_headers(
            400,
            serde_json::json!({"error": "bad"}),
            [("Content-Type", "application/problem+json")],
        );

    // Act
    let res = client(&network)
        .send_blocking(get("http://api.com/problem"))
        .unwrap();

    // Assert
    assert_eq!(res.status(), 400);
    assert_eq!(res.headers()["content-type"], "application/problem+json");
    scope.done();
}
