use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use uplink::wire::{CreateDescriptorRequest, WriteSpansRequest, WriteTimeSeriesRequest};
use uplink::{
    Aggregation, AggregationData, AttributeValue, ExportError, Exporter, ExporterConfig,
    IngestClient, Measure, Span, StackFrame, StackTrace, View, ViewData,
};

/// Records every request for verification.
#[derive(Default)]
struct RecordingClient {
    span_requests: Mutex<Vec<WriteSpansRequest>>,
    series_requests: Mutex<Vec<WriteTimeSeriesRequest>>,
    delay: Option<Duration>,
}

impl RecordingClient {
    fn new() -> Self {
        Self::default()
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    fn exported_span_count(&self) -> usize {
        self.span_requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.spans.len())
            .sum()
    }

    fn request_count(&self) -> usize {
        self.span_requests.lock().unwrap().len() + self.series_requests.lock().unwrap().len()
    }
}

impl IngestClient for RecordingClient {
    async fn write_spans(&self, request: WriteSpansRequest) -> Result<(), ExportError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.span_requests.lock().unwrap().push(request);
        Ok(())
    }

    async fn write_time_series(
        &self,
        request: WriteTimeSeriesRequest,
    ) -> Result<(), ExportError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.series_requests.lock().unwrap().push(request);
        Ok(())
    }

    async fn create_descriptor(
        &self,
        _request: CreateDescriptorRequest,
    ) -> Result<(), ExportError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

fn config() -> ExporterConfig {
    ExporterConfig::new().with_project_id("itest-project")
}

fn span(i: u64) -> Span {
    let now = SystemTime::now();
    Span::new(0xabc, i, format!("op-{i}"), now, now + Duration::from_millis(1))
}

/// `wait_for_termination` blocks the calling thread, so run it off the
/// async workers.
async fn wait(exporter: &Exporter, timeout: Duration) -> bool {
    let exporter = exporter.clone();
    tokio::task::spawn_blocking(move || exporter.wait_for_termination(timeout))
        .await
        .unwrap()
}

#[tokio::test]
async fn concurrent_submissions_all_delivered() {
    let client = Arc::new(RecordingClient::new());
    let exporter = Exporter::with_client(
        config().with_worker_count(4).with_queue_capacity(64),
        client.clone(),
    );

    let mut tasks = Vec::new();
    for producer in 0..8u64 {
        let exporter = exporter.clone();
        tasks.push(tokio::spawn(async move {
            for seq in 0..50u64 {
                exporter
                    .export_spans(vec![span(producer << 16 | seq)])
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    exporter.shutdown();
    assert!(wait(&exporter, Duration::from_secs(10)).await);
    assert_eq!(client.exported_span_count(), 400);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn backpressure_runs_inline_and_drops_nothing() {
    // Pool of 2 workers, queue of 2: submitting 2+2+1 batches concurrently
    // must not drop any batch; overflow runs on the submitter.
    let client = Arc::new(RecordingClient::slow(Duration::from_millis(80)));
    let exporter = Exporter::with_client(
        config().with_worker_count(2).with_queue_capacity(2),
        client.clone(),
    );

    let mut tasks = Vec::new();
    for i in 0..5u64 {
        let exporter = exporter.clone();
        tasks.push(tokio::spawn(async move {
            exporter.export_spans(vec![span(i)]).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    exporter.shutdown();
    assert!(wait(&exporter, Duration::from_secs(10)).await);
    assert_eq!(client.exported_span_count(), 5, "no batch rejected or dropped");
}

#[tokio::test]
async fn shutdown_drains_then_refuses() {
    let client = Arc::new(RecordingClient::slow(Duration::from_millis(10)));
    let exporter = Exporter::with_client(
        config().with_worker_count(1).with_queue_capacity(100),
        client.clone(),
    );

    for i in 0..10u64 {
        exporter.export_spans(vec![span(i)]).await.unwrap();
    }
    exporter.shutdown();
    assert!(!exporter.is_running());

    assert!(wait(&exporter, Duration::from_secs(10)).await);
    assert!(exporter.is_shutdown());
    assert_eq!(client.exported_span_count(), 10);

    // No further network calls after termination.
    let before = client.request_count();
    assert!(matches!(
        exporter.export_spans(vec![span(99)]).await,
        Err(ExportError::NotRunning)
    ));
    assert_eq!(client.request_count(), before);
}

#[tokio::test]
async fn kill_discards_queued_but_not_started_work() {
    let client = Arc::new(RecordingClient::slow(Duration::from_millis(100)));
    let exporter = Exporter::with_client(
        config().with_worker_count(1).with_queue_capacity(100),
        client.clone(),
    );

    for i in 0..20u64 {
        exporter.export_spans(vec![span(i)]).await.unwrap();
    }
    // Let the single worker start the first batch.
    tokio::time::sleep(Duration::from_millis(30)).await;
    exporter.kill();
    assert!(exporter.is_killed());

    assert!(wait(&exporter, Duration::from_secs(10)).await);
    let delivered = client.exported_span_count();
    assert!(delivered >= 1, "in-flight batch ran to completion");
    assert!(delivered < 20, "queued batches discarded, delivered {delivered}");
}

#[tokio::test]
async fn wait_for_termination_times_out_while_draining() {
    let client = Arc::new(RecordingClient::slow(Duration::from_millis(300)));
    let exporter = Exporter::with_client(
        config().with_worker_count(1).with_queue_capacity(10),
        client.clone(),
    );

    exporter.export_spans(vec![span(1)]).await.unwrap();
    exporter.shutdown();
    assert!(!wait(&exporter, Duration::from_millis(20)).await);
    assert!(exporter.is_shutting_down());

    assert!(wait(&exporter, Duration::from_secs(10)).await);
}

#[tokio::test]
async fn stack_trace_dedup_is_per_export_call() {
    let client = Arc::new(RecordingClient::new());
    let exporter = Exporter::with_client(config(), client.clone());

    let trace = StackTrace {
        frames: vec![StackFrame {
            function_name: Some("serve".into()),
            line_number: 10,
            ..Default::default()
        }],
        dropped_frames_count: 0,
        hash_id: 41,
    };
    let make = |i: u64| span(i).with_stack_trace(trace.clone());

    // Same batch: second occurrence omits frames.
    exporter.export_spans(vec![make(1), make(2)]).await.unwrap();
    // New batch: fresh converter serializes frames again.
    exporter.export_spans(vec![make(3)]).await.unwrap();

    exporter.shutdown();
    assert!(wait(&exporter, Duration::from_secs(10)).await);

    let requests = client.span_requests.lock().unwrap();
    let batch_of = |spans: &[uplink::wire::WireSpan]| {
        spans
            .iter()
            .map(|s| s.stack_trace.as_ref().unwrap().stack_frames.is_some())
            .collect::<Vec<_>>()
    };
    let mut frames_present: Vec<Vec<bool>> =
        requests.iter().map(|r| batch_of(&r.spans)).collect();
    frames_present.sort_by_key(Vec::len);
    assert_eq!(frames_present, vec![vec![true], vec![true, false]]);
}

#[tokio::test]
async fn stats_round_trip_preserves_labels_and_buckets() {
    let client = Arc::new(RecordingClient::new());
    let exporter = Exporter::with_client(config(), client.clone());

    let view = View {
        name: "bytes_in".into(),
        description: String::new(),
        measure: Measure::int64("bytes", "By"),
        aggregation: Aggregation::Distribution {
            bounds: vec![5.0, 10.0, 15.0],
        },
        columns: vec!["a".into(), "b".into()],
    };
    let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1000);
    let data = ViewData {
        view,
        start_time: start,
        rows: vec![(
            vec!["x".into(), "y".into()],
            AggregationData::distribution(
                1,
                1.0,
                0.0,
                vec![5.0, 10.0, 15.0],
                vec![1, 0, 0, 0],
                start + Duration::from_secs(60),
            ),
        )],
    };

    exporter.export_stats(vec![data]).await.unwrap();
    exporter.shutdown();
    assert!(wait(&exporter, Duration::from_secs(10)).await);

    let requests = client.series_requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let series = &requests[0].time_series[0];
    assert_eq!(series.metric.labels.get("a").map(String::as_str), Some("x"));
    assert_eq!(series.metric.labels.get("b").map(String::as_str), Some("y"));
    match &series.points[0].value {
        uplink::wire::TypedValue::DistributionValue(d) => {
            assert_eq!(d.bucket_bounds, vec![0.0, 5.0, 10.0, 15.0]);
            assert_eq!(d.bucket_counts, vec![0, 1, 0, 0, 0]);
        }
        other => panic!("expected distribution, got {other:?}"),
    }
}

#[tokio::test]
async fn inline_exporter_configuration_works_end_to_end() {
    // worker_count 0: every export call runs synchronously inline.
    let client = Arc::new(RecordingClient::new());
    let exporter = Exporter::with_client(config().with_worker_count(0), client.clone());

    exporter.export_spans(vec![span(1)]).await.unwrap();
    assert_eq!(client.exported_span_count(), 1, "ran before submit returned");

    exporter.shutdown();
    assert!(exporter.is_shutdown());
}

#[tokio::test]
async fn lazy_client_factory_runs_on_first_export_only() {
    let resolutions = Arc::new(AtomicUsize::new(0));
    let resolutions_clone = Arc::clone(&resolutions);
    let client = Arc::new(RecordingClient::new());
    let client_clone = client.clone();

    let factory: uplink::ClientFactory = Arc::new(move |identity| {
        assert_eq!(identity.project_id, "itest-project");
        resolutions_clone.fetch_add(1, Ordering::SeqCst);
        Ok(client_clone.clone() as Arc<dyn uplink::IngestClientBoxed>)
    });
    let exporter = Exporter::new(config(), factory);
    assert_eq!(resolutions.load(Ordering::SeqCst), 0, "construction is lazy");

    exporter.export_spans(vec![span(1)]).await.unwrap();
    exporter.export_spans(vec![span(2)]).await.unwrap();
    exporter.shutdown();
    assert!(wait(&exporter, Duration::from_secs(10)).await);

    assert_eq!(resolutions.load(Ordering::SeqCst), 1, "resolved exactly once");
    assert_eq!(client.exported_span_count(), 2);
}

#[tokio::test]
async fn agent_attribute_present_on_the_wire() {
    let client = Arc::new(RecordingClient::new());
    let exporter = Exporter::with_client(config(), client.clone());

    exporter
        .export_spans(vec![span(1).with_attribute("http.path", AttributeValue::string("/"))])
        .await
        .unwrap();
    exporter.shutdown();
    assert!(wait(&exporter, Duration::from_secs(10)).await);

    let requests = client.span_requests.lock().unwrap();
    let map = &requests[0].spans[0].attributes.attribute_map;
    assert!(map.contains_key("uplink.dev/agent"));
    assert!(map.contains_key("/http/path"));
}
