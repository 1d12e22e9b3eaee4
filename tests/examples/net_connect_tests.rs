use crate::common::{body_string, client, get, setup, FakeNetwork};
use httpnock::prelude::*;

#[test]
fn disable_net_connect_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "network");
    disable_net_connect();

    // Act
    let err = client(&network)
        .send_blocking(get("http://unmocked.com/"))
        .unwrap_err();

    // Assert
    match err {
        Error::NetConnectNotAllowed { host } => assert_eq!(host, "unmocked.com:80"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(network.calls().is_empty());
}

#[test]
fn enable_net_connect_for_host_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "network");
    disable_net_connect();
    enable_net_connect_for("localhost");
    enable_net_connect_for(Regex::new(r"\.internal:8080$").unwrap());
    enable_net_connect_for(ValueMatcher::predicate(|host| host.starts_with("trusted.")));

    let client = client(&network);

    // Act
    let local = client.send_blocking(get("http://localhost:3000/health")).unwrap();
    let internal = client.send_blocking(get("http://api.internal:8080/")).unwrap();
    let trusted = client.send_blocking(get("https://trusted.example.com/")).unwrap();
    let substring = client.send_blocking(get("http://notlocalhost.com/"));
    let other_port = client.send_blocking(get("http://api.internal:9090/"));

    // Assert
    assert_eq!(body_string(&local), "network");
    assert_eq!(internal.status(), 200);
    assert_eq!(trusted.status(), 200);
    assert!(matches!(substring, Err(Error::NetConnectNotAllowed { .. })));
    assert!(matches!(other_port, Err(Error::NetConnectNotAllowed { .. })));
    assert_eq!(network.calls().len(), 3);
}

#[test]
fn net_connect_is_checked_before_allow_unmocked_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "network");

    nock_with_options("http://a.com", NockOptions::new().allow_unmocked(true))
        .get("/mocked")
        .reply(200, "mocked");

    let client = client(&network);

    // Act: allowed while net connect is enabled
    let passed = client.send_blocking(get("http://a.com/other")).unwrap();
    disable_net_connect();
    let rejected = client.send_blocking(get("http://a.com/other"));
    let mocked = client.send_blocking(get("http://a.com/mocked")).unwrap();

    // Assert
    assert_eq!(body_string(&passed), "network");
    assert!(matches!(rejected, Err(Error::NetConnectNotAllowed { .. })));
    assert_eq!(body_string(&mocked), "mocked");
}

#[test]
fn clean_all_enables_net_connect_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "network");
    disable_net_connect();

    // Act
    clean_all();
    let res = client(&network).send_blocking(get("http://a.com/")).unwrap();

    // Assert
    assert_eq!(res.status(), 200);
}

#[test]
fn restore_and_activate_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "network");
    nock("http://a.com").get("/").reply(200, "mocked");
    disable_net_connect();

    // Act: detached interception sends everything to the network
    httpnock::restore();
    let detached = client(&network).send_blocking(get("http://a.com/")).unwrap();
    httpnock::activate();
    let attached = client(&network).send_blocking(get("http://a.com/")).unwrap();

    // Assert
    assert!(httpnock::is_active());
    assert_eq!(body_string(&detached), "network");
    assert_eq!(body_string(&attached), "mocked");
}
