use crate::common::{body_string, client, get, setup, FakeNetwork};
use httpnock::{
    back::{self, BackMode, BackOptions},
    prelude::*,
};
use std::{fs, path::PathBuf};

fn fixtures_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("httpnock-back-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

#[test]
fn record_then_replay_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "recorded body");
    let dir = fixtures_dir("record");
    back::set_fixtures(&dir);
    back::set_mode(BackMode::Record);

    // Act: the first session records real traffic into the fixture
    back::back("users.json", |ctx| {
        assert!(ctx.is_recording());
        assert!(!ctx.is_loaded());
        let res = client(&network)
            .send_blocking(get("http://users.com/list"))
            .unwrap();
        assert_eq!(body_string(&res), "recorded body");
    })
    .unwrap();

    // Assert
    let fixture = dir.join("users.json");
    assert!(fixture.is_file());
    assert_eq!(network.calls().len(), 1);
    assert!(!httpnock::recorder::is_recording());

    // Act: the second session replays it without the network
    back::back("users.json", |ctx| {
        assert!(ctx.is_loaded());
        assert!(!ctx.is_recording());
        assert_eq!(ctx.scopes().len(), 1);

        let res = client(&network)
            .send_blocking(get("http://users.com/list"))
            .unwrap();
        assert_eq!(body_string(&res), "recorded body");

        let unknown = client(&network).send_blocking(get("http://users.com/other"));
        assert!(matches!(unknown, Err(Error::NetConnectNotAllowed { .. })));

        ctx.assert_scopes_finished();
    })
    .unwrap();

    // Assert
    assert_eq!(network.calls().len(), 1);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn record_hooks_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "secret");
    let dir = fixtures_dir("hooks");
    back::set_fixtures(&dir);
    back::set_mode(BackMode::Record);

    let options = BackOptions::new()
        .after_record(|mut defs| {
            defs.iter_mut()
                .for_each(|def| def.response = Some(serde_json::json!("redacted")));
            defs
        })
        .before(|def| def.status = 299);

    // Act
    back::back_with_options("hooks.json", options.clone(), |_ctx| {
        client(&network)
            .send_blocking(get("http://a.com/token"))
            .unwrap();
    })
    .unwrap();

    let res = back::back_with_options("hooks.json", options, |_ctx| {
        client(&network)
            .send_blocking(get("http://a.com/token"))
            .unwrap()
    })
    .unwrap();

    // Assert
    assert_eq!(res.status(), 299);
    assert_eq!(body_string(&res), "redacted");
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn nothing_recorded_writes_nothing_test() {
    // Arrange
    let _guard = setup();
    let dir = fixtures_dir("empty");
    back::set_fixtures(&dir);
    back::set_mode(BackMode::Record);

    // Act
    let ctx = back::context("empty.json").unwrap();
    ctx.done().unwrap();

    // Assert
    assert!(!dir.join("empty.json").exists());
}

#[test]
fn dryrun_lets_unmocked_requests_through_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "network");
    let dir = fixtures_dir("dryrun");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("api.json"),
        r#"[{"scope": "http://api.com:80", "method": "GET", "path": "/fixed", "response": "fixture"}]"#,
    )
    .unwrap();
    back::set_fixtures(&dir);
    back::set_mode(BackMode::Dryrun);

    // Act
    let (fixed, other) = back::back("api.json", |ctx| {
        assert!(ctx.is_loaded());
        let client = client(&network);
        (
            client.send_blocking(get("http://api.com/fixed")).unwrap(),
            client.send_blocking(get("http://api.com/other")).unwrap(),
        )
    })
    .unwrap();

    // Assert
    assert_eq!(body_string(&fixed), "fixture");
    assert_eq!(body_string(&other), "network");
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn lockdown_rejects_everything_unmatched_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "network");
    back::set_fixtures(fixtures_dir("lockdown"));
    back::set_mode(BackMode::Lockdown);

    // Act
    let result = back::back("absent.json", |ctx| {
        assert!(!ctx.is_loaded());
        client(&network).send_blocking(get("http://api.com/"))
    })
    .unwrap();

    // Assert
    assert!(matches!(result, Err(Error::NetConnectNotAllowed { .. })));
    assert!(network.calls().is_empty());
}

#[test]
fn wild_mode_detaches_interception_test() {
    // Arrange
    let _guard = setup();
    let network = FakeNetwork::new(200, "network");
    nock("http://api.com").get("/").reply(200, "mocked");
    back::set_mode(BackMode::Wild);

    // Act
    let res = back::back("anything.json", |_ctx| {
        client(&network).send_blocking(get("http://api.com/")).unwrap()
    })
    .unwrap();

    // Assert
    assert_eq!(body_string(&res), "network");
    assert!(!httpnock::is_active());
    assert!(httpnock::pending_mocks().is_empty());
}

#[test]
fn set_mode_by_name_test() {
    let _guard = setup();
    back::set_mode(BackMode::Lockdown);

    back::set_mode_str("RECORD").unwrap();
    assert_eq!(back::current_mode(), BackMode::Record);

    assert!(matches!(
        back::set_mode_str("bogus"),
        Err(Error::InvalidBackMode(_))
    ));
    assert_eq!(back::current_mode(), BackMode::Record);
}
