use mock_broker::MockBroker;
use stampede::{Benchmark, ConnectOptions, RunConfig};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_env_filter("stampede=debug,mock_broker=debug")
            .with_test_writer()
            .init();
    });
}

#[allow(unused)]
pub fn bench(broker: &MockBroker, config: RunConfig) -> Benchmark<MockBroker> {
    Benchmark::new(broker.clone(), ConnectOptions::default(), config)
}

/// Poll until `subject` has `count` open subscriptions.
#[allow(unused)]
pub async fn wait_for_subscriptions(broker: &MockBroker, subject: &str, count: usize) {
    while broker.subscriptions(subject) < count {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
