use crate::common::{client, get, setup, FakeNetwork};
use httpnock::prelude::*;
use std::time::{Duration, Instant};

#[test]
fn delay_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "");
    let delay = Duration::from_millis(300);
    let start_time = Instant::now();

    let scope = nock("http://a.com").get("/delay").delay(delay).reply(200, "slow");

    // Act
    let res = client(&network)
        .send_blocking(get("http://a.com/delay"))
        .unwrap();

    // Assert
    assert_eq!(res.status(), 200);
    assert!(start_time.elapsed() >= delay);
    scope.done();
}

#[tokio::test]
async fn connection_and_body_delays_add_up_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "");
    let start_time = Instant::now();

    let scope = nock("http://a.com")
        .get("/slow")
        .delay_connection(Duration::from_millis(150))
        .delay_body(Duration::from_millis(150))
        .reply(200, "slow");

    // Act
    let res = client(&network).send(get("http://a.com/slow")).await.unwrap();

    // Assert
    assert_eq!(res.status(), 200);
    assert!(start_time.elapsed() >= Duration::from_millis(300));
    scope.done();
}

#[tokio::test]
async fn injected_errors_are_delayed_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "");
    let delay = Duration::from_millis(200);
    let start_time = Instant::now();

    nock("http://a.com")
        .get("/timeout")
        .delay_body(delay)
        .reply_with_error("timed out");

    // Act
    let err = client(&network)
        .send(get("http://a.com/timeout"))
        .await
        .unwrap_err();

    // Assert
    assert!(matches!(err, Error::Injected(_)));
    assert!(start_time.elapsed() >= delay);
}
