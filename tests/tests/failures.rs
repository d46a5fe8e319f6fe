mod utils;
#[allow(unused)]
use utils::*;

use mock_broker::{BrokerConfig, MockBroker};
use ntest::timeout;
use stampede::{BenchError, Benchmark, ConnectOptions, PublishMode, RunConfig, TransportError};

#[tracing_test::traced_test]
#[tokio::test]
#[timeout(10000)]
async fn refused_publisher_fails_the_run() {
    let broker = MockBroker::new();
    broker.refuse("benchmark-pub-1");
    let config = RunConfig::new("foo").messages(100).publishers(3).subscribers(1);

    let err = bench(&broker, config).run().await.unwrap_err();

    match err {
        BenchError::Connect { client, source } => {
            assert_eq!(client, "benchmark-pub-1");
            assert!(matches!(source, TransportError::Connect(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tracing_test::traced_test]
#[tokio::test]
#[timeout(10000)]
async fn failed_ack_fails_the_run() {
    let broker = MockBroker::new();
    broker.fail_acks(true);
    let config = RunConfig::new("foo").messages(100).publishers(2).subscribers(1);

    let err = bench(&broker, config).run().await.unwrap_err();

    assert!(matches!(err, BenchError::Publish { .. }), "{err}");
}

#[tracing_test::traced_test]
#[tokio::test]
#[timeout(10000)]
async fn failed_sync_publish_fails_the_run() {
    let broker = MockBroker::new();
    broker.fail_publishes(true);
    let config = RunConfig::new("foo")
        .messages(100)
        .publishers(2)
        .publish_mode(PublishMode::Sync);

    let err = bench(&broker, config).run().await.unwrap_err();

    assert!(matches!(err, BenchError::Publish { .. }), "{err}");
    assert_eq!(broker.retained("foo"), 0);
}

#[tracing_test::traced_test]
#[tokio::test]
#[timeout(10000)]
async fn lost_connection_fails_the_run() {
    let broker = MockBroker::new();
    let config = RunConfig::new("foo").messages(10).publishers(0).subscribers(2);
    let run = bench(&broker, config);

    let handle = tokio::spawn(async move { run.run().await });
    wait_for_subscriptions(&broker, "foo", 2).await;
    assert!(broker.sever("benchmark-sub-0", "stale connection"));

    let err = handle.await.unwrap().unwrap_err();
    match err {
        BenchError::ConnectionLost { client, .. } => assert_eq!(client, "benchmark-sub-0"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(logs_contain("Severing connection for benchmark-sub-0"));
}

#[tracing_test::traced_test]
#[tokio::test]
#[timeout(10000)]
async fn unknown_cluster_fails_the_run() {
    let broker = MockBroker::with_config(BrokerConfig::default().cluster_id("prod"));
    let config = RunConfig::new("foo").messages(10).publishers(1);

    let err = bench(&broker, config).run().await.unwrap_err();

    assert!(matches!(err, BenchError::Connect { .. }), "{err}");
}

#[tracing_test::traced_test]
#[tokio::test]
#[timeout(10000)]
async fn bad_credentials_fail_the_run() {
    let broker = MockBroker::with_config(BrokerConfig::default().credentials("derek", "s3cr3t"));
    let config = RunConfig::new("foo").messages(10).publishers(1).subscribers(1);

    let options = ConnectOptions {
        user_password: Some(("derek".to_string(), "wrong".to_string())),
        ..ConnectOptions::default()
    };
    let err = Benchmark::new(broker.clone(), options, config.clone())
        .run()
        .await
        .unwrap_err();
    match err {
        BenchError::Connect { source, .. } => assert!(matches!(source, TransportError::Auth(_))),
        other => panic!("unexpected error: {other}"),
    }

    let options = ConnectOptions {
        user_password: Some(("derek".to_string(), "s3cr3t".to_string())),
        ..ConnectOptions::default()
    };
    let report = Benchmark::new(broker, options, config).run().await.unwrap();
    assert_eq!(report.subscribers.msg_count(), 10);
}
