use httpnock::{intercept, nock, HttpRequest, Interception, Join};

use crate::common::setup;

#[test]
fn all_runtimes_test() {
    let _guard = setup();
    nock("http://runtime.com").get("/").persist().reply(202, "");

    // Tokio
    assert_eq!(
        tokio::runtime::Runtime::new().unwrap().block_on(test_fn()),
        202
    );

    // Current thread tokio
    assert_eq!(
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
            .block_on(test_fn()),
        202
    );

    // No runtime at all
    assert_eq!(test_fn().join(), 202);
}

async fn test_fn() -> u16 {
    let req = HttpRequest::new("GET", "http://runtime.com/", vec![], Default::default()).unwrap();
    match intercept(req) {
        Interception::Responded(pending) => pending.resolve().await.unwrap().status,
        other => panic!("unexpected result: {:?}", other),
    }
}
