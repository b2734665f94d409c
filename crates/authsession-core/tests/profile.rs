//! Profile cache transitions against a mock `/me` endpoint.

mod common;

use std::time::Duration;

use authsession_core::ProfileCache;
use common::{bearer, memory_session, token_expiring_in};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn profile_body(name: &str) -> serde_json::Value {
    serde_json::json!({ "username": name, "email": format!("{}@example.com", name) })
}

async fn mount_profile(server: &MockServer, token: &str, name: &str, delay: Duration) {
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", bearer(token).as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(profile_body(name))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_fetches_profile_once() {
    let server = MockServer::start().await;
    let token = token_expiring_in("dana", 600);

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body("dana")))
        .expect(1)
        .mount(&server)
        .await;

    let (session, _) = memory_session(&server.uri());
    let cache = ProfileCache::new(session.clone());
    session.login(token.as_str());

    cache.sync().expect("fetch started").await.unwrap();
    assert!(cache.sync().is_none());

    assert_eq!(cache.profile().unwrap().username, "dana");
}

#[tokio::test]
async fn test_rapid_login_logout_leaves_no_profile() {
    let server = MockServer::start().await;
    let token = token_expiring_in("dana", 600);
    mount_profile(&server, &token, "dana", Duration::from_millis(200)).await;

    let (session, _) = memory_session(&server.uri());
    let cache = ProfileCache::new(session.clone());

    session.login(token.as_str());
    let fetch = cache.sync().expect("fetch started");
    session.logout();
    assert!(cache.sync().is_none());

    fetch.await.unwrap();
    assert!(cache.profile().is_none());
}

#[tokio::test]
async fn test_last_transition_wins_over_last_response() {
    let server = MockServer::start().await;
    let slow = token_expiring_in("slow", 600);
    let fast = token_expiring_in("fast", 600);
    mount_profile(&server, &slow, "slow", Duration::from_millis(300)).await;
    mount_profile(&server, &fast, "fast", Duration::ZERO).await;

    let (session, _) = memory_session(&server.uri());
    let cache = ProfileCache::new(session.clone());

    session.login(slow.as_str());
    let first = cache.sync().expect("first fetch");
    session.login(fast.as_str());
    let second = cache.sync().expect("second fetch");

    second.await.unwrap();
    first.await.unwrap();
    assert_eq!(cache.profile().unwrap().username, "fast");
}

#[tokio::test]
async fn test_failed_fetch_clears_profile() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let (session, _) = memory_session(&server.uri());
    let cache = ProfileCache::new(session.clone());
    session.login(token_expiring_in("dana", 600));

    cache.sync().expect("fetch started").await.unwrap();
    assert!(cache.profile().is_none());
}

#[tokio::test]
async fn test_unreachable_server_clears_profile() {
    // Nothing listens on the discard port
    let (session, _) = memory_session("http://127.0.0.1:9");
    let cache = ProfileCache::new(session.clone());
    session.login(token_expiring_in("dana", 600));
    cache.set(Some(serde_json::from_value(profile_body("stale")).unwrap()));
    assert!(cache.profile().is_some());

    cache.sync().expect("fetch started").await.unwrap();
    assert!(cache.profile().is_none());
}

#[tokio::test]
async fn test_profile_hidden_after_credential_expires() {
    let server = MockServer::start().await;
    let token = token_expiring_in("dana", 1);
    mount_profile(&server, &token, "dana", Duration::ZERO).await;

    let (session, _) = memory_session(&server.uri());
    let cache = ProfileCache::new(session.clone());
    session.login(token.as_str());
    cache.sync().expect("fetch started").await.unwrap();
    assert_eq!(cache.profile().unwrap().username, "dana");

    // Nothing publishes the expiry and no sync runs
    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert!(cache.profile().is_none());
}

#[tokio::test]
async fn test_expired_credential_counts_as_logged_out() {
    let server = MockServer::start().await;
    let (session, _) = memory_session(&server.uri());
    let cache = ProfileCache::new(session.clone());

    session.login(token_expiring_in("dana", -5));
    assert!(cache.sync().is_none());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_watcher_follows_session() {
    let server = MockServer::start().await;
    let token = token_expiring_in("dana", 600);
    mount_profile(&server, &token, "dana", Duration::ZERO).await;

    let (session, _) = memory_session(&server.uri());
    let cache = ProfileCache::new(session.clone());
    let watcher = cache.spawn_watcher();

    session.login(token.as_str());
    let mut loaded = false;
    for _ in 0..50 {
        if cache.profile().is_some() {
            loaded = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(loaded, "profile never loaded");

    session.logout();
    for _ in 0..50 {
        if cache.profile().is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(cache.profile().is_none());

    watcher.abort();
}

#[tokio::test]
async fn test_refetch_replaces_profile() {
    let server = MockServer::start().await;
    let token = token_expiring_in("dana", 600);

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body("dana")))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body("dana-renamed")))
        .expect(1)
        .mount(&server)
        .await;

    let (session, _) = memory_session(&server.uri());
    let cache = ProfileCache::new(session.clone());
    session.login(token.as_str());

    cache.sync().expect("fetch started").await.unwrap();
    assert_eq!(cache.profile().unwrap().username, "dana");

    cache.refetch().expect("refetch started").await.unwrap();
    assert_eq!(cache.profile().unwrap().username, "dana-renamed");

    session.logout();
    assert!(cache.refetch().is_none());
    assert!(cache.profile().is_none());
}
