//! Concurrency and race condition tests
//!
//! These tests verify thread-safety and concurrent operation:
//! - Readers never observe a half-published snapshot
//! - Concurrent toggles are not lost
//! - Notify from many threads, including ones outside the runtime

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use telegram_relay::EventKind;
use telegram_relay::config::ConfigSnapshot;
use telegram_relay::dispatcher::Dispatch;
use telegram_relay::state::ConfigState;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

const KEYS: usize = 16;

fn generation(n: i64) -> ConfigSnapshot {
    (0..KEYS).fold(ConfigSnapshot::empty(), |snapshot, i| {
        snapshot.with_value(format!("test.key{i}"), n)
    })
}

#[test]
fn test_readers_never_see_mixed_snapshots() {
    let state = Arc::new(ConfigState::new(generation(0)));
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let state = state.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                let mut observed = 0;
                while !done.load(Ordering::Relaxed) {
                    let snapshot = state.get();
                    let first = snapshot.get_int("test.key0", -1);
                    for i in 1..KEYS {
                        assert_eq!(snapshot.get_int(&format!("test.key{i}"), -1), first);
                    }
                    observed += 1;
                }
                observed
            })
        })
        .collect();

    for n in 1..=500 {
        state.set(generation(n));
    }
    done.store(true, Ordering::Relaxed);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    assert_eq!(state.get().get_int("test.key7", -1), 500);
}

#[test]
fn test_concurrent_toggles_are_not_lost() {
    let state = Arc::new(ConfigState::new(ConfigSnapshot::defaults()));

    let writers: Vec<_> = EventKind::ALL
        .into_iter()
        .map(|kind| {
            let state = state.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    state.toggle(&kind.flag_key(), false);
                    state.toggle(&kind.flag_key(), true);
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }

    let snapshot = state.get();
    for kind in EventKind::ALL {
        assert!(snapshot.is_enabled(kind), "{kind} was lost");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_notify_from_threads_outside_runtime() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(40)
        .mount(&server)
        .await;

    let (relay, _store) = start_relay(configured(&server), steady_tps());

    // host threads hold only a dispatcher clone
    let producers: Vec<_> = (0..4)
        .map(|t| {
            let dispatcher = relay.dispatcher().clone();
            std::thread::spawn(move || {
                (0..10)
                    .map(|i| {
                        let name = format!("p{t}-{i}");
                        dispatcher.notify(EventKind::Join, payload(&[("player", &name)]))
                    })
                    .filter(|dispatch| *dispatch == Dispatch::Queued)
                    .count()
            })
        })
        .collect();

    let queued: usize = producers.into_iter().map(|p| p.join().unwrap()).sum();
    assert_eq!(queued, 40);

    let delivery = relay.dispatcher().delivery();
    delivery.flush().await.unwrap();
    assert_eq!(delivery.stats().await.unwrap().delivered, 40);

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_toggle_during_notify_burst() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (relay, _store) = start_relay(configured(&server), steady_tps());

    let mut queued = 0;
    for i in 0..50 {
        if i == 25 {
            relay.set_flag("join", false).unwrap();
        }
        if relay.notify(EventKind::Join, payload(&[("player", "Ann")])) == Dispatch::Queued {
            queued += 1;
        }
    }
    assert_eq!(queued, 25);

    relay.shutdown().await.unwrap();
}
