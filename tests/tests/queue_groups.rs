mod utils;
#[allow(unused)]
use utils::*;

use mock_broker::{BrokerConfig, MockBroker, QueueRouting};
use ntest::timeout;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use stampede::{PublishMode, RunConfig};

fn grouped(msgs: u64, pubs: usize, subs: usize) -> RunConfig {
    RunConfig::new("foo")
        .messages(msgs)
        .publishers(pubs)
        .subscribers(subs)
        .queue_group("workers")
}

/// Every member finished; the group saw each message once plus at most one sentinel per
/// member that left while others were still active.
fn assert_group_finished(report: &stampede::Report, msgs: u64, subs: usize) {
    assert_eq!(report.subscribers.samples().len(), subs);
    let received = report.subscribers.msg_count();
    let max_sentinels = subs.saturating_sub(1) as u64;
    assert!(
        (msgs..=msgs + max_sentinels).contains(&received),
        "received {received} for {msgs} messages across {subs} members"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[timeout(20000)]
async fn round_robin_group() {
    init();
    let broker = MockBroker::new();
    let report = bench(&broker, grouped(9_000, 3, 3)).run().await.unwrap();

    assert_group_finished(&report, 9_000, 3);
    assert_eq!(broker.subscriptions("foo"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[timeout(20000)]
async fn sticky_group_needs_the_sentinel_cascade() {
    init();
    let broker = MockBroker::with_config(BrokerConfig::default().routing(QueueRouting::Sticky));
    let report = bench(&broker, grouped(2_000, 2, 5)).run().await.unwrap();

    assert_group_finished(&report, 2_000, 5);
    // Only the first member ever sees regular traffic.
    let lagging = report
        .subscribers
        .samples()
        .iter()
        .filter(|c| c.sample.msg_count <= 1)
        .count();
    assert_eq!(lagging, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[timeout(60000)]
async fn random_routing_always_terminates() {
    init();
    let mut rng = SmallRng::seed_from_u64(42);

    for _ in 0..10 {
        let seed = rng.gen();
        let subs = rng.gen_range(1..8);
        let pubs = rng.gen_range(1..4);
        let msgs = rng.gen_range(0..500);
        let mode = if rng.gen_bool(0.5) {
            PublishMode::Sync
        } else {
            PublishMode::Async
        };

        let broker =
            MockBroker::with_config(BrokerConfig::default().routing(QueueRouting::Random(seed)));
        let report = bench(&broker, grouped(msgs, pubs, subs).publish_mode(mode))
            .run()
            .await
            .unwrap();

        if msgs > 0 {
            assert_group_finished(&report, msgs, subs);
        } else {
            assert_eq!(report.subscribers.msg_count(), 0);
        }
    }
}

#[tokio::test]
#[timeout(10000)]
async fn single_member_sends_no_sentinel() {
    init();
    let broker = MockBroker::new();
    let report = bench(&broker, grouped(300, 2, 1)).run().await.unwrap();

    assert_eq!(report.subscribers.msg_count(), 300);
    assert_eq!(broker.retained("foo"), 300);
}

#[tokio::test]
#[timeout(10000)]
async fn more_members_than_messages() {
    init();
    let broker = MockBroker::new();
    let report = bench(&broker, grouped(2, 1, 6)).run().await.unwrap();

    assert_group_finished(&report, 2, 6);
}

#[tokio::test]
#[timeout(10000)]
async fn group_replays_history_once() {
    init();
    let broker = MockBroker::new();
    broker.preload("foo", 100, bytes::Bytes::from_static(b"old"));
    let report = bench(&broker, grouped(100, 1, 3)).run().await.unwrap();

    // The retained messages alone satisfy the group; live traffic only releases the rest.
    assert_eq!(report.subscribers.samples().len(), 3);
    let received = report.subscribers.msg_count();
    assert!((100..=202).contains(&received), "received {received}");
    // History, live traffic and at most two sentinels.
    assert!((200..=202).contains(&broker.retained("foo")));
}
