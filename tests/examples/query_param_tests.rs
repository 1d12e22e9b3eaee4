use crate::common::{client, get, setup, FakeNetwork};
use httpnock::prelude::*;

#[test]
fn query_param_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "");

    let scope = nock("http://music.com")
        .get("/search")
        .query([("query", "Metallica"), ("limit", "10")])
        .reply(200, "found");

    let client = client(&network);

    // Act: parameter order does not matter, extra parameters do
    let extra = client.send_blocking(get("http://music.com/search?query=Metallica&limit=10&page=2"));
    let res = client
        .send_blocking(get("http://music.com/search?limit=10&query=Metallica"))
        .unwrap();

    // Assert
    assert!(matches!(extra, Err(Error::NoMatch { .. })));
    assert_eq!(res.status(), 200);
    scope.done();
}

#[test]
fn query_in_path_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "");

    let scope = nock("http://music.com")
        .get("/search?query=Iron%20Maiden")
        .reply(200, "found");

    // Act
    let res = client(&network)
        .send_blocking(get("http://music.com/search?query=Iron+Maiden"))
        .unwrap();

    // Assert
    assert_eq!(res.status(), 200);
    scope.done();
}

#[test]
fn query_value_matchers_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "");

    let scope = nock("http://music.com")
        .get("/albums")
        .query(vec![
            ("year", ValueMatcher::from(Regex::new(r"^19\d\d$").unwrap())),
            ("band", ValueMatcher::predicate(|v| v.starts_with("Black"))),
        ])
        .reply(200, "albums");

    // Act
    let res = client(&network)
        .send_blocking(get("http://music.com/albums?band=Black%20Sabbath&year=1970"))
        .unwrap();

    // Assert
    assert_eq!(res.status(), 200);
    scope.done();
}

#[test]
fn query_any_and_absent_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "");

    let scope = nock("http://music.com")
        .get("/any")
        .query_any()
        .reply(200, "any")
        .get("/none")
        .reply(200, "none");

    let client = client(&network);

    // Act
    let with_query = client.send_blocking(get("http://music.com/any?a=1&b=2")).unwrap();
    let unexpected_query = client.send_blocking(get("http://music.com/none?a=1"));
    let without_query = client.send_blocking(get("http://music.com/none")).unwrap();

    // Assert
    assert_eq!(with_query.status(), 200);
    assert!(matches!(unexpected_query, Err(Error::NoMatch { .. })));
    assert_eq!(without_query.status(), 200);
    scope.done();
}

#[test]
fn query_predicate_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "");

    let scope = nock("http://music.com")
        .get("/tracks")
        .query(QueryMatcher::predicate(|params: &[(String, String)]| {
            params.iter().filter(|(k, _)| k == "id").count() == 2
        }))
        .reply(200, "tracks");

    // Act
    let res = client(&network)
        .send_blocking(get("http://music.com/tracks?id=1&id=2"))
        .unwrap();

    // Assert
    assert_eq!(res.status(), 200);
    scope.done();
}

#[test]
#[should_panic(expected = "query parameters have already been defined")]
fn query_defined_twice_panics_test() {
    let _guard = setup();
    nock("http://music.com")
        .get("/search?query=x")
        .query([("query", "y")]);
}
