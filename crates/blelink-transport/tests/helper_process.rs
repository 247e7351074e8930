//! Driving a real child process. `cat` stands in for the helper: it echoes
//! every line back and exits at end of input.

#![cfg(unix)]

use std::time::Duration;

use blelink_transport::{HelperConfig, HelperProcess, LineTransport, TransportError};

fn cat() -> HelperConfig {
    HelperConfig::new("cat").stop_grace(Duration::from_secs(5))
}

#[tokio::test]
async fn test_lines_round_trip_through_child() {
    let helper = HelperProcess::spawn(cat()).unwrap();
    assert!(helper.is_alive());
    assert!(helper.id().is_some());

    helper.write_line("rsp=$stat state=$disc\n").await.unwrap();
    assert_eq!(
        helper.read_line().await.unwrap().as_deref(),
        Some("rsp=$stat state=$disc")
    );

    helper.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_closes_input_and_reaps_child() {
    let helper = HelperProcess::spawn(cat()).unwrap();
    let status = helper.stop().await.unwrap();
    assert!(status.success());
    assert!(!helper.is_alive());

    // `cat` echoed the quit line before seeing end of input.
    assert_eq!(helper.read_line().await.unwrap().as_deref(), Some("quit"));
    assert!(helper.read_line().await.unwrap().is_none());
}

#[tokio::test]
async fn test_write_after_stop_fails() {
    let helper = HelperProcess::spawn(cat()).unwrap();
    helper.stop().await.unwrap();

    let err = helper.write_line("stat\n").await.unwrap_err();
    assert!(matches!(err, TransportError::Exited | TransportError::Closed));
    assert!(err.is_disconnect());
}

#[tokio::test]
async fn test_helper_ignoring_quit_is_killed() {
    // Ignores its input entirely and would run for a minute.
    let config = HelperConfig::new("sleep")
        .arg("60")
        .stop_grace(Duration::from_millis(200));
    let helper = HelperProcess::spawn(config).unwrap();

    let status = helper.stop().await.unwrap();
    assert!(!status.success());
}
