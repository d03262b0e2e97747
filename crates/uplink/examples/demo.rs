//! Demo: export a few spans and a stats snapshot to stdout.
//!
//! Run with `cargo run --example demo`.

use std::sync::Arc;
use std::time::{Duration, SystemTime};
use uplink::{
    Aggregation, AggregationData, AttributeValue, Exporter, ExporterConfig, Measure, Span,
    StdoutClient, View, ViewData,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let exporter = Exporter::with_client(
        ExporterConfig::new()
            .with_project_id("demo-project")
            .with_worker_count(2)
            .with_queue_capacity(64),
        Arc::new(StdoutClient::new(true)),
    );
    let guard = exporter.flush_guard();

    let now = SystemTime::now();
    let spans: Vec<Span> = (0..3u64)
        .map(|i| {
            Span::new(
                0xdeadbeef,
                i + 1,
                format!("handle-request-{i}"),
                now,
                now + Duration::from_millis(12 + i * 3),
            )
            .with_attribute("http.method", AttributeValue::string("GET"))
            .with_attribute("http.status_code", AttributeValue::Int(200))
            .with_status(0, "ok")
        })
        .collect();
    exporter.export_spans(spans).await.expect("exporter is running");

    let view = View {
        name: "request_latency".into(),
        description: "distribution of request latency".into(),
        measure: Measure::double("latency", "ms"),
        aggregation: Aggregation::Distribution {
            bounds: vec![5.0, 10.0, 25.0],
        },
        columns: vec!["route".into()],
    };
    exporter
        .create_metric_descriptor(&view)
        .await
        .expect("descriptor accepted");

    let view_data = ViewData {
        view,
        start_time: now,
        rows: vec![(
            vec!["/home".into()],
            AggregationData::distribution(
                4,
                9.5,
                12.25,
                vec![5.0, 10.0, 25.0],
                vec![1, 2, 1, 0],
                now + Duration::from_secs(1),
            ),
        )],
    };
    exporter
        .export_stats(vec![view_data])
        .await
        .expect("exporter is running");

    // Dropping the guard performs the final flush.
    drop(guard);
    println!("drained: {}", exporter.is_shutdown());
}
