//! Tracker validation against real sockets on localhost.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tokio::net::{TcpListener, UdpSocket};
use undertow_core::config::ValidatorConfig;
use undertow_core::{TrackerValidator, UdpRateLimiter, ValidationMode};

/// Validator with short budgets and its own UDP limiter.
fn validator() -> TrackerValidator {
    let config = ValidatorConfig {
        backoff_base: Duration::from_millis(10),
        dns_timeout: Duration::from_millis(500),
        http_timeout: Duration::from_millis(300),
        aggressive_http_timeout: Duration::from_millis(300),
        udp_timeout: Duration::from_millis(200),
        ..Default::default()
    };
    TrackerValidator::new(config)
        .with_rate_limiter(Arc::new(UdpRateLimiter::new(20, Duration::from_secs(60))))
}

async fn http_tracker() -> String {
    let router = Router::new()
        .route("/announce", get(|| async { "d14:failure reason4:nopee" }))
        .route("/gone", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Answers BEP 15 connect requests with a valid reply.
async fn udp_tracker() -> String {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 64];
        while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
            if len < 16 {
                continue;
            }
            let mut reply = [0u8; 16];
            reply[4..8].copy_from_slice(&buf[12..16]);
            reply[8..].copy_from_slice(&0x1234_5678_u64.to_be_bytes());
            let _ = socket.send_to(&reply, peer).await;
        }
    });
    format!("udp://{addr}/announce")
}

/// Bound UDP port that never answers.
async fn silent_udp_tracker() -> (UdpSocket, String) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let url = format!("udp://{}/announce", socket.local_addr().unwrap());
    (socket, url)
}

#[tokio::test]
async fn test_aggressive_filter_keeps_only_live_trackers() {
    let http = http_tracker().await;
    let live_udp = udp_tracker().await;
    let (_silent, dead_udp) = silent_udp_tracker().await;
    let urls = vec![
        format!("{http}/announce"),
        format!("{http}/gone"),
        live_udp.clone(),
        dead_udp,
        "gopher://tracker.example/announce".to_string(),
        format!("{http}/announce"),
    ];

    let mut healthy = validator()
        .filter_by_health(&urls, ValidationMode::Aggressive, 0)
        .await;
    healthy.sort();

    let mut expected = vec![format!("{http}/announce"), live_udp];
    expected.sort();
    assert_eq!(healthy, expected);
}

#[tokio::test]
async fn test_basic_mode_trusts_resolvable_udp_trackers() {
    let (_silent, dead_udp) = silent_udp_tracker().await;
    let validator = validator();

    let record = validator.check_tracker(&dead_udp, ValidationMode::Basic).await;
    assert!(record.ok);

    let record = validator
        .check_tracker("udp://:80/announce", ValidationMode::Basic)
        .await;
    assert!(!record.ok);
    assert!(record.last_error.is_some());
}

#[tokio::test]
async fn test_limit_stops_after_enough_healthy_trackers() {
    let http = http_tracker().await;
    let urls: Vec<String> = (0..6).map(|i| format!("{http}/announce?n={i}")).collect();

    let healthy = validator()
        .filter_by_health(&urls, ValidationMode::Basic, 2)
        .await;
    assert_eq!(healthy.len(), 2);
}
