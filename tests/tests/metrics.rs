mod utils;
#[allow(unused)]
use utils::*;

use metrics_exporter_prometheus::PrometheusBuilder;
use mock_broker::MockBroker;
use ntest::timeout;
use stampede::RunConfig;

#[tokio::test]
#[timeout(10000)]
async fn counters_track_the_run() {
    init();
    let handle = PrometheusBuilder::new().install_recorder().unwrap();

    let broker = MockBroker::new();
    let config = RunConfig::new("foo")
        .messages(1_000)
        .publishers(2)
        .subscribers(2);
    bench(&broker, config).run().await.unwrap();

    let rendered = handle.render();
    assert!(rendered.contains("stampede_published 1000"), "{rendered}");
    assert!(rendered.contains("stampede_acked 1000"), "{rendered}");
    assert!(rendered.contains("stampede_received 2000"), "{rendered}");
}
