//! End-to-end tests from host event to Telegram request
//!
//! A wiremock server stands in for the Bot API; every test drives the public
//! `Relay` surface the way a host would.

use pretty_assertions::assert_eq;
use telegram_relay::EventKind;
use telegram_relay::config::{ConfigValue, PARSE_MODE_KEY};
use telegram_relay::dispatcher::Dispatch;
use wiremock::matchers::{body_string, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_join_without_parse_mode() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TEST_TOKEN}/sendMessage")))
        .and(body_string(
            "chat_id=-100200&text=%5B%2B%5D+Ann+joined+the+server.",
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (relay, _store) = start_relay(configured(&server), steady_tps());

    let dispatch = relay.notify(EventKind::Join, payload(&[("player", "Ann")]));
    assert_eq!(dispatch, Dispatch::Queued);

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_join_with_markdown_parse_mode() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string(
            "chat_id=-100200&text=%5B%2B%5D+Ann+joined+the+server.&parse_mode=Markdown",
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = with_values(
        configured(&server),
        &[(PARSE_MODE_KEY, ConfigValue::from("Markdown"))],
    );
    let (relay, _store) = start_relay(snapshot, steady_tps());

    relay.notify(EventKind::Join, payload(&[("player", "Ann")]));

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unknown_placeholders_are_sent_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("text=Hello+Ann%2C+%7Bmystery%7D%21"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = with_values(
        configured(&server),
        &[(
            "messages.join",
            ConfigValue::from("Hello {player}, {mystery}!"),
        )],
    );
    let (relay, _store) = start_relay(snapshot, steady_tps());

    relay.notify(EventKind::Join, payload(&[("player", "Ann")]));

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_enabling_kick_at_runtime() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("text=%5BALERT%5D+Bob+was+kicked%3A+spam"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (relay, store) = start_relay(configured(&server), steady_tps());
    let kick = payload(&[("player", "Bob"), ("reason", "spam")]);

    assert_eq!(relay.notify(EventKind::Kick, kick.clone()), Dispatch::Disabled);

    relay.toggle("kick", "on").unwrap();
    assert_eq!(relay.notify(EventKind::Kick, kick), Dispatch::Queued);
    assert!(store.persisted().is_enabled(EventKind::Kick));

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_reload_switches_chat_and_announces() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("chat_id=777"))
        .and(body_string_contains("Configuration+reloaded+by+Steve."))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (relay, store) = start_relay(configured(&server), steady_tps());

    store.replace(with_values(
        configured(&server),
        &[("telegram.chat_id", ConfigValue::from("777"))],
    ));
    let report = relay.reload("Steve").unwrap();

    assert!(report.took < std::time::Duration::from_secs(1));
    assert_eq!(relay.config().get().get_str("telegram.chat_id"), Some("777"));

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_delivery_stats_after_burst() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(20)
        .mount(&server)
        .await;

    let (relay, _store) = start_relay(configured(&server), steady_tps());

    for i in 0..20 {
        let name = format!("player{i}");
        relay.notify(EventKind::Quit, payload(&[("player", &name)]));
    }

    let delivery = relay.dispatcher().delivery();
    delivery.flush().await.unwrap();
    let stats = delivery.stats().await.unwrap();
    assert_eq!(stats.delivered, 20);
    assert_eq!(stats.dropped, 0);

    relay.shutdown().await.unwrap();
}
