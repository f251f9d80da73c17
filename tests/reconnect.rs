mod common;

use common::{fast_config, wait_until, MockAxes, MockCapture, MockConnector, MockTransport};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use stickcast::joystick::Direction;
use stickcast::session::{Devices, ReconnectLoop};
use stickcast::transport::OutboundMessage;
use tokio_util::sync::CancellationToken;

fn devices() -> Devices<MockAxes, Arc<AtomicBool>> {
    Devices::new(
        MockAxes::centered(),
        Arc::new(AtomicBool::new(false)),
        Arc::new(MockCapture::unbounded()),
    )
}

#[tokio::test]
async fn retries_failed_connects_after_the_delay() {
    let config = fast_config();
    let delay = Duration::from_millis(config.server.reconnect_delay_ms);
    let transport = MockTransport::new();
    let connector = MockConnector::new(2, vec![transport.clone()]);
    let attempts = connector.attempts.clone();
    let shutdown = CancellationToken::new();

    let mut reconnect = ReconnectLoop::new(connector, devices(), config);
    let driver = async {
        wait_until(|| transport.count("direction") == 1).await;
        shutdown.cancel();
    };
    let ((), ()) = tokio::join!(reconnect.run(&shutdown), driver);

    let attempts = attempts.lock().unwrap().clone();
    assert_eq!(attempts.len(), 3);
    for pair in attempts.windows(2) {
        assert!(pair[1] - pair[0] >= delay);
    }
    assert_eq!(reconnect.attempts(), 3);
    assert_eq!(
        transport.messages(),
        vec![OutboundMessage::Direction(Direction::Neutral)]
    );
}

#[tokio::test]
async fn failed_session_is_followed_by_a_new_one() {
    let config = fast_config();
    let first = MockTransport::new();
    let second = MockTransport::new();
    let connector = MockConnector::new(0, vec![first.clone(), second.clone()]);
    let shutdown = CancellationToken::new();

    let mut reconnect = ReconnectLoop::new(connector, devices(), config);
    let driver = async {
        wait_until(|| first.count("direction") == 1).await;
        // peer goes away
        first.closed.cancel();
        wait_until(|| second.count("direction") == 1).await;
        shutdown.cancel();
    };
    let ((), ()) = tokio::join!(reconnect.run(&shutdown), driver);

    assert_eq!(reconnect.attempts(), 2);
    // every session recalibrates and reports its first direction
    assert_eq!(
        second.messages(),
        vec![OutboundMessage::Direction(Direction::Neutral)]
    );
}

#[tokio::test]
async fn shutdown_interrupts_the_reconnect_delay() {
    let mut config = fast_config();
    config.server.reconnect_delay_ms = 60_000;
    let connector = MockConnector::new(usize::MAX, Vec::new());
    let attempts = connector.attempts.clone();
    let shutdown = CancellationToken::new();

    let mut reconnect = ReconnectLoop::new(connector, devices(), config);
    let driver = async {
        wait_until(|| attempts.lock().unwrap().len() == 1).await;
        shutdown.cancel();
    };
    tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(reconnect.run(&shutdown), driver)
    })
    .await
    .expect("reconnect loop should stop promptly");

    assert_eq!(reconnect.attempts(), 1);
}

#[tokio::test]
async fn already_cancelled_shutdown_never_connects() {
    let connector = MockConnector::new(0, vec![MockTransport::new()]);
    let attempts = connector.attempts.clone();
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let mut reconnect = ReconnectLoop::new(connector, devices(), fast_config());
    reconnect.run(&shutdown).await;

    assert_eq!(reconnect.attempts(), 0);
    assert!(attempts.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unanswered_connect_times_out_and_is_retried() {
    let mut config = fast_config();
    config.server.connect_timeout_ms = 200;
    config.server.reconnect_delay_ms = 50;
    let connector = MockConnector::hanging();
    let attempts = connector.attempts.clone();
    let shutdown = CancellationToken::new();

    let mut reconnect = ReconnectLoop::new(connector, devices(), config);
    let driver = async {
        wait_until(|| attempts.lock().unwrap().len() >= 3).await;
        shutdown.cancel();
    };
    let ((), ()) = tokio::join!(reconnect.run(&shutdown), driver);

    assert!(reconnect.attempts() >= 3);
    let attempts = attempts.lock().unwrap().clone();
    for pair in attempts.windows(2) {
        // timeout plus the reconnect delay
        assert!(pair[1] - pair[0] >= Duration::from_millis(250));
    }
}

#[tokio::test(start_paused = true)]
async fn zero_connect_timeout_waits_for_the_peer() {
    let mut config = fast_config();
    config.server.connect_timeout_ms = 0;
    config.server.reconnect_delay_ms = 50;
    let connector = MockConnector::hanging();
    let attempts = connector.attempts.clone();
    let shutdown = CancellationToken::new();

    let mut reconnect = ReconnectLoop::new(connector, devices(), config);
    let driver = async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        shutdown.cancel();
    };
    let ((), ()) = tokio::join!(reconnect.run(&shutdown), driver);

    assert_eq!(reconnect.attempts(), 1);
    assert_eq!(attempts.lock().unwrap().len(), 1);
}
