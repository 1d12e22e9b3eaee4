use crate::common::{body_string, client, get, setup, FakeNetwork};
use httpnock::{prelude::*, InterceptorSelector};

#[test]
fn times_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "");

    let scope = nock("http://a.com").get("/x").times(2).reply(200, "x");
    let client = client(&network);

    // Act + Assert
    client.send_blocking(get("http://a.com/x")).unwrap();
    assert_eq!(scope.pending_mocks(), vec!["GET http://a.com:80/x"]);

    client.send_blocking(get("http://a.com/x")).unwrap();
    assert!(scope.pending_mocks().is_empty());
    assert!(scope.active_mocks().is_empty());

    let exhausted = client.send_blocking(get("http://a.com/x"));
    assert!(matches!(exhausted, Err(Error::NoMatch { .. })));
    scope.done();
}

#[test]
fn persist_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "");

    let scope = nock("http://a.com").get("/forever").persist().reply(200, "again");
    let client = client(&network);

    // Act
    for _ in 0..5 {
        let res = client.send_blocking(get("http://a.com/forever")).unwrap();
        assert_eq!(res.status(), 200);
    }

    // Assert
    assert!(scope.pending_mocks().is_empty());
    assert_eq!(scope.active_mocks(), vec!["GET http://a.com:80/forever"]);
    assert!(httpnock::is_done());
}

#[test]
fn scope_persist_applies_to_all_interceptors_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "");

    let scope = nock("http://a.com")
        .persist()
        .get("/one")
        .reply(200, "one")
        .get("/two")
        .reply(200, "two");
    let client = client(&network);

    // Act
    for _ in 0..3 {
        client.send_blocking(get("http://a.com/one")).unwrap();
        client.send_blocking(get("http://a.com/two")).unwrap();
    }

    // Assert
    assert!(scope.is_done());
    assert_eq!(scope.active_mocks().len(), 2);
}

#[test]
fn optional_interceptors_are_never_pending_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "");

    let scope = nock("http://a.com")
        .get("/maybe")
        .optionally()
        .reply(200, "maybe");

    // Assert: done before any request
    assert!(scope.is_done());
    assert_eq!(scope.active_mocks(), vec!["GET http://a.com:80/maybe"]);

    // Act: still matchable
    let res = client(&network).send_blocking(get("http://a.com/maybe")).unwrap();
    assert_eq!(res.status(), 200);
    assert!(scope.active_mocks().is_empty());
}

#[test]
#[should_panic(expected = "Mocks not yet satisfied:\nGET http://a.com:80/never")]
fn done_panics_for_pending_interceptors_test() {
    let _guard = setup();
    nock("http://a.com").get("/never").reply(200, "").done();
}

#[test]
#[should_panic(expected = "an interceptor must match at least once")]
fn zero_times_panics_test() {
    let _guard = setup();
    nock("http://a.com").get("/x").times(0);
}

#[test]
fn global_pending_mocks_test() {
    // Arrange
    let _guard = setup();

    nock("http://a.com").get("/a").reply(200, "");
    nock("https://b.com").post("/b").reply(200, "");

    // Assert
    assert_eq!(
        httpnock::pending_mocks(),
        vec!["GET http://a.com:80/a", "POST https://b.com:443/b"]
    );
    assert!(!httpnock::is_done());

    // Act
    httpnock::clean_all();

    // Assert
    assert!(httpnock::pending_mocks().is_empty());
    assert!(httpnock::is_done());
}

#[test]
fn remove_interceptor_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "network");

    let scope = nock("http://a.com")
        .get("/gone")
        .reply(200, "mocked")
        .get("/kept")
        .reply(200, "kept");

    // Act
    let removed = httpnock::remove_interceptor(&InterceptorSelector::new("a.com", "/gone"));
    let removed_again = httpnock::remove_interceptor(&InterceptorSelector::new("a.com", "/gone"));
    let wrong_method = httpnock::remove_interceptor(
        &InterceptorSelector::new("a.com", "/kept").method("POST"),
    );

    // Assert
    assert!(removed);
    assert!(!removed_again);
    assert!(!wrong_method);
    assert_eq!(scope.pending_mocks(), vec!["GET http://a.com:80/kept"]);

    let gone = client(&network).send_blocking(get("http://a.com/gone"));
    assert!(matches!(gone, Err(Error::NoMatch { .. })));
}

#[test]
fn scopes_register_again_after_clean_all_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "");

    let scope = nock("http://a.com").persist();
    httpnock::clean_all();

    // Act
    let scope = scope.get("/late").reply(200, "late");
    let res = client(&network).send_blocking(get("http://a.com/late")).unwrap();

    // Assert
    assert_eq!(res.status(), 200);
    assert!(scope.is_done());
}

#[test]
fn reused_scope_handles_match_after_newer_scopes_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "");

    let stale = nock("http://a.com");
    httpnock::clean_all();

    nock("http://a.com").get("/x").reply(200, "registered-first");
    stale.get("/x").reply(200, "registered-second");

    // Act
    let first = client(&network).send_blocking(get("http://a.com/x")).unwrap();
    let second = client(&network).send_blocking(get("http://a.com/x")).unwrap();

    // Assert
    assert_eq!(body_string(&first), "registered-first");
    assert_eq!(body_string(&second), "registered-second");
}
