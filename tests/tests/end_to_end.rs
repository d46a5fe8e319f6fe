mod utils;
#[allow(unused)]
use utils::*;

use bytes::Bytes;
use mock_broker::MockBroker;
use ntest::timeout;
use stampede::{PublishMode, RunConfig};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[timeout(20000)]
async fn async_run_delivers_every_message() {
    init();
    let broker = MockBroker::new();
    let config = RunConfig::new("foo")
        .messages(10_000)
        .publishers(4)
        .subscribers(3)
        .message_size(32);

    let report = bench(&broker, config).run().await.unwrap();

    assert_eq!(report.publishers.msg_count(), 10_000);
    assert_eq!(report.subscribers.samples().len(), 3);
    for client in report.subscribers.samples() {
        assert_eq!(client.sample.msg_count, 10_000);
        assert_eq!(client.sample.msg_size, 32);
    }
    assert_eq!(broker.retained("foo"), 10_000);
    assert_eq!(broker.connected_clients(), 0);

    let text = report.to_string();
    assert!(text.starts_with("Stampede Pub/Sub stats: "));
    assert!(text.contains("\n Pub stats: "));
    assert!(text.contains("\n Sub stats: "));
    assert!(text.contains("  [4] "));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[timeout(20000)]
async fn sync_run_delivers_every_message() {
    init();
    let broker = MockBroker::new();
    let config = RunConfig::new("foo")
        .messages(2_000)
        .publishers(3)
        .subscribers(2)
        .publish_mode(PublishMode::Sync);

    let report = bench(&broker, config).run().await.unwrap();

    let shares: Vec<_> = report
        .publishers
        .samples()
        .iter()
        .map(|c| c.sample.msg_count)
        .collect();
    assert_eq!(shares, [667, 667, 666]);
    assert_eq!(report.subscribers.msg_count(), 4_000);
}

#[tokio::test]
#[timeout(10000)]
async fn publishers_only() {
    init();
    let broker = MockBroker::new();
    let config = RunConfig::new("foo").messages(1_000).publishers(2);

    let report = bench(&broker, config).run().await.unwrap();

    assert!(!report.subscribers.has_samples());
    assert!(report.to_string().starts_with("Pub stats: "));
    assert_eq!(broker.retained("foo"), 1_000);
}

#[tokio::test]
#[timeout(10000)]
async fn no_messages_still_completes() {
    init();
    let broker = MockBroker::new();
    let config = RunConfig::new("foo")
        .messages(0)
        .publishers(2)
        .subscribers(2);

    let report = bench(&broker, config).run().await.unwrap();

    assert_eq!(report.publishers.samples().len(), 2);
    assert_eq!(report.subscribers.samples().len(), 2);
    assert_eq!(report.subscribers.msg_count(), 0);
}

#[tokio::test]
#[timeout(10000)]
async fn empty_run() {
    init();
    let broker = MockBroker::new();
    let config = RunConfig::new("foo").publishers(0).subscribers(0);

    let report = bench(&broker, config).run().await.unwrap();

    assert!(report.is_empty());
    assert_eq!(
        report.to_string(),
        "No publisher or subscribers. Nothing to report.\n"
    );
}

#[tokio::test]
#[timeout(10000)]
async fn subscribers_replay_retained_messages() {
    init();
    let broker = MockBroker::new();
    broker.preload("foo", 50, Bytes::from_static(b"old"));
    let config = RunConfig::new("foo")
        .messages(100)
        .publishers(1)
        .subscribers(1);

    let report = bench(&broker, config).run().await.unwrap();

    // The old messages count towards the target, so the subscriber finishes early.
    let received = report.subscribers.msg_count();
    assert!((100..=150).contains(&received), "received {received}");
    assert_eq!(broker.retained("foo"), 150);
}

#[tokio::test]
#[timeout(10000)]
async fn ignore_old_skips_retained_messages() {
    init();
    let broker = MockBroker::new();
    broker.preload("foo", 50, Bytes::from_static(b"old"));
    let config = RunConfig::new("foo")
        .messages(100)
        .publishers(1)
        .subscribers(2)
        .ignore_old(true);

    let report = bench(&broker, config).run().await.unwrap();

    assert_eq!(report.subscribers.msg_count(), 200);
}

#[tokio::test]
#[timeout(10000)]
async fn csv_rows_follow_spawn_order() {
    init();
    let broker = MockBroker::new();
    let config = RunConfig::new("foo")
        .messages(90)
        .publishers(3)
        .subscribers(2)
        .message_size(8)
        .client_id("run");

    let report = bench(&broker, config).run().await.unwrap();
    let csv = report.csv();
    let mut lines = csv.lines();

    assert_eq!(
        lines.next(),
        Some("#Role,ClientID,MsgCount,MsgSize,StartTime,EndTime,MsgsPerSec")
    );
    let rows: Vec<Vec<&str>> = lines.map(|l| l.split(',').collect()).collect();
    let ids: Vec<_> = rows.iter().map(|r| (r[0], r[1])).collect();
    assert_eq!(
        ids,
        [
            ("P", "run-pub-0"),
            ("P", "run-pub-1"),
            ("P", "run-pub-2"),
            ("S", "run-sub-0"),
            ("S", "run-sub-1"),
        ]
    );
    assert!(rows.iter().all(|r| r.len() == 7 && r[3] == "8"));
    assert_eq!(csv, report.csv());

    let path = std::env::temp_dir().join(format!("stampede-{}.csv", std::process::id()));
    std::fs::write(&path, &csv).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), csv);
    std::fs::remove_file(&path).unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[timeout(20000)]
async fn independent_runs_share_a_broker() {
    init();
    let broker = MockBroker::new();
    let first = bench(
        &broker,
        RunConfig::new("foo")
            .messages(1_000)
            .publishers(2)
            .subscribers(3)
            .queue_group("workers")
            .client_id("first"),
    );
    let second = bench(
        &broker,
        RunConfig::new("bar")
            .messages(1_000)
            .publishers(2)
            .subscribers(3)
            .queue_group("workers")
            .client_id("second"),
    );

    let (a, b) = tokio::join!(first.run(), second.run());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.publishers.msg_count(), 1_000);
    assert_eq!(b.publishers.msg_count(), 1_000);
    assert!(a.subscribers.msg_count() >= 1_000);
    assert!(b.subscribers.msg_count() >= 1_000);
}
