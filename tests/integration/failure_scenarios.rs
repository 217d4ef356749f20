//! Failure tests for the relay
//!
//! These tests verify that the system handles failures gracefully:
//! - Endpoint errors and unreachable endpoints
//! - Invalid credentials at startup and reload
//! - Malformed configuration files

use std::sync::Arc;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use telegram_relay::EventKind;
use telegram_relay::config::{ConfigValue, JsonFileStore, TOKEN_KEY, TOKEN_PLACEHOLDER};
use telegram_relay::dispatcher::Dispatch;
use telegram_relay::error::ConfigError;
use telegram_relay::relay::Relay;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_disabled_kind_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let snapshot = with_values(
        configured(&server),
        &[("messages.enable_kick", ConfigValue::from(false))],
    );
    let (relay, _store) = start_relay(snapshot, steady_tps());

    let dispatch = relay.notify(
        EventKind::Kick,
        payload(&[("player", "Ann"), ("reason", "afk")]),
    );
    assert_eq!(dispatch, Dispatch::Disabled);

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_endpoint_error_is_swallowed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Bad Request: chat not found"))
        .expect(1)
        .mount(&server)
        .await;

    let (relay, _store) = start_relay(configured(&server), steady_tps());

    assert_eq!(
        relay.notify(EventKind::Join, payload(&[("player", "Ann")])),
        Dispatch::Queued
    );

    let delivery = relay.dispatcher().delivery();
    delivery.flush().await.unwrap();
    let stats = delivery.stats().await.unwrap();
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.delivered, 0);

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_endpoint_is_swallowed() {
    // nothing listens on the discard port
    let (relay, _store) = start_relay(configured_for("http://127.0.0.1:9"), steady_tps());

    relay.notify(EventKind::Join, payload(&[("player", "Ann")]));

    let delivery = relay.dispatcher().delivery();
    delivery.flush().await.unwrap();
    assert_eq!(delivery.stats().await.unwrap().failed, 1);

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_slow_endpoint_does_not_block_notify() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let (relay, _store) = start_relay(configured(&server), steady_tps());

    let started = Instant::now();
    for _ in 0..10 {
        relay.notify(EventKind::Join, payload(&[("player", "Ann")]));
    }
    assert!(
        started.elapsed() < Duration::from_millis(100),
        "notify waited on the network: {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_start_with_placeholder_credentials_fails() {
    let store = Arc::new(telegram_relay::config::MemoryStore::default());
    let result = Relay::start(store, steady_tps());

    assert!(result.is_err());
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_settings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (relay, store) = start_relay(configured(&server), steady_tps());

    store.replace(with_values(
        configured(&server),
        &[(TOKEN_KEY, ConfigValue::from(TOKEN_PLACEHOLDER))],
    ));
    assert_matches!(
        relay.reload("admin"),
        Err(ConfigError::InvalidCredentials(_))
    );

    // the old credentials still deliver, and nothing announced the failed reload
    assert_eq!(
        relay.notify(EventKind::Join, payload(&[("player", "Ann")])),
        Dispatch::Queued
    );

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_malformed_config_file_fails_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ \"telegram\": { \"token\": ").unwrap();

    let store = Arc::new(JsonFileStore::new(&path));
    let error = Relay::start(store, steady_tps()).err().unwrap();

    assert!(
        format!("{error:#}").contains("invalid configuration document"),
        "unexpected error: {error:#}"
    );
}

#[tokio::test]
async fn test_missing_config_file_is_created_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    let store = Arc::new(JsonFileStore::new(&path));
    assert!(Relay::start(store, steady_tps()).is_err());

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains(TOKEN_PLACEHOLDER));
    assert!(written.contains("enable_low_tps"));
}
