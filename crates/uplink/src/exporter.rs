//! Public exporter facade.
//!
//! Wires the dispatcher, the client provisioner, and the converters
//! together. Created once at application wiring time; destroyed via
//! explicit [`Exporter::shutdown`] / [`Exporter::kill`] or through a
//! [`FlushGuard`] dropped at process exit.

use crate::client::IngestClientBoxed;
use crate::config::ExporterConfig;
use crate::convert::{default_agent_label, SpanConverter};
use crate::dispatcher::{Dispatcher, DispatcherConfig, ExportRequest, Processor};
use crate::error::ExportError;
use crate::metric::StatsConverter;
use crate::provision::{ClientFactory, ClientProvisioner};
use crate::span::Span;
use crate::stats::{View, ViewData};
use crate::wire::{CreateDescriptorRequest, WriteSpansRequest, WriteTimeSeriesRequest};
use std::sync::Arc;
use std::time::Duration;

/// Converts and transmits export requests on behalf of the dispatcher.
pub(crate) struct ExportProcessor {
    provisioner: ClientProvisioner,
    agent_label: String,
    stats: StatsConverter,
}

impl ExportProcessor {
    fn project_name(project_id: &str) -> String {
        format!("projects/{project_id}")
    }

    async fn process_spans(&self, spans: Vec<Span>) -> Result<(), ExportError> {
        let project_id = self.provisioner.project_id()?;
        let client = self.provisioner.client().await?;

        // Fresh converter per batch: the stack-trace dedup cache must not
        // leak across independent requests.
        let mut converter = SpanConverter::new(&project_id, &self.agent_label);
        let mut wire_spans = Vec::with_capacity(spans.len());
        for span in &spans {
            match converter.convert_span(span) {
                Ok(wire_span) => wire_spans.push(wire_span),
                // Per-record failure: skip the record, keep the batch.
                Err(e) => tracing::warn!(error = %e, "span dropped from batch"),
            }
        }
        if wire_spans.is_empty() {
            return Ok(());
        }

        client
            .write_spans_boxed(WriteSpansRequest {
                name: Self::project_name(&project_id),
                spans: wire_spans,
            })
            .await
    }

    async fn process_stats(&self, view_data: Vec<ViewData>) -> Result<(), ExportError> {
        let project_id = self.provisioner.project_id()?;
        let client = self.provisioner.client().await?;

        // All rows of all snapshots go into one write request; no chunking
        // against a backend batch-size limit.
        let time_series: Vec<_> = view_data
            .iter()
            .flat_map(|data| self.stats.time_series(data))
            .collect();
        if time_series.is_empty() {
            return Ok(());
        }

        client
            .write_time_series_boxed(WriteTimeSeriesRequest {
                name: Self::project_name(&project_id),
                time_series,
            })
            .await
    }
}

impl Processor for ExportProcessor {
    async fn process(&self, request: ExportRequest) -> Result<(), ExportError> {
        match request {
            ExportRequest::Spans(spans) => self.process_spans(spans).await,
            ExportRequest::Stats(view_data) => self.process_stats(view_data).await,
        }
    }
}

struct Inner {
    dispatcher: Dispatcher<ExportProcessor>,
    processor: Arc<ExportProcessor>,
    drain_timeout: Duration,
}

/// Export adapter for spans and stats views.
///
/// Cheap to clone; all clones share the same dispatcher and resolved
/// client. Construction never touches the network: client resolution is
/// deferred to the first export (see [`provision`](crate::provision)).
#[derive(Clone)]
pub struct Exporter {
    inner: Arc<Inner>,
}

impl Exporter {
    /// Creates an exporter whose client is built by `factory` on first use.
    pub fn new(config: ExporterConfig, factory: ClientFactory) -> Self {
        let provisioner = ClientProvisioner::new(
            config.project_id.clone(),
            config.credentials.clone(),
            config.request_timeout,
            factory,
        );
        Self::build(config, provisioner)
    }

    /// Creates an exporter around a pre-built client handle (test/override
    /// mode); credential and network resolution never runs.
    pub fn with_client(config: ExporterConfig, client: Arc<dyn IngestClientBoxed>) -> Self {
        let provisioner = ClientProvisioner::with_client(config.project_id.clone(), client);
        Self::build(config, provisioner)
    }

    fn build(config: ExporterConfig, provisioner: ClientProvisioner) -> Self {
        let processor = Arc::new(ExportProcessor {
            provisioner,
            agent_label: config.agent_label.clone().unwrap_or_else(default_agent_label),
            stats: StatsConverter::new(
                config.metric_prefix.clone(),
                config.resource_type.clone(),
                config.resource_labels.clone(),
            ),
        });
        let dispatcher = Dispatcher::new(
            DispatcherConfig {
                worker_count: config.worker_count,
                queue_capacity: config.queue_capacity,
            },
            Arc::clone(&processor),
        );
        Self {
            inner: Arc::new(Inner {
                dispatcher,
                processor,
                drain_timeout: config.drain_timeout,
            }),
        }
    }

    /// Submits a span batch for asynchronous export. Fire-and-forget:
    /// conversion and transport failures are logged, never returned here.
    pub async fn export_spans(&self, spans: Vec<Span>) -> Result<(), ExportError> {
        self.inner.dispatcher.submit(ExportRequest::Spans(spans)).await
    }

    /// Submits a batch of view-data snapshots for asynchronous export.
    pub async fn export_stats(&self, view_data: Vec<ViewData>) -> Result<(), ExportError> {
        self.inner.dispatcher.submit(ExportRequest::Stats(view_data)).await
    }

    /// Registers the metric descriptor for a view. Synchronous
    /// request/response: errors (including descriptor conflicts) propagate
    /// to the caller directly.
    pub async fn create_metric_descriptor(&self, view: &View) -> Result<(), ExportError> {
        let processor = &self.inner.processor;
        let project_id = processor.provisioner.project_id()?;
        let client = processor.provisioner.client().await?;
        client
            .create_descriptor_boxed(CreateDescriptorRequest {
                name: ExportProcessor::project_name(&project_id),
                descriptor: processor.stats.descriptor(view),
            })
            .await
    }

    /// Stops accepting new submissions and drains in the background.
    /// Non-blocking; pair with [`wait_for_termination`](Self::wait_for_termination).
    pub fn shutdown(&self) {
        self.inner.dispatcher.shutdown();
    }

    /// As [`shutdown`](Self::shutdown), but discards queued-not-started
    /// work. In-flight work still completes.
    pub fn kill(&self) {
        self.inner.dispatcher.kill();
    }

    /// Blocks the calling thread until fully drained or `timeout` elapses;
    /// returns `true` on termination. Call from outside the async runtime
    /// (or from a blocking section) to avoid stalling worker threads.
    pub fn wait_for_termination(&self, timeout: Duration) -> bool {
        self.inner.dispatcher.wait_for_termination(timeout)
    }

    /// Returns `true` while submissions are accepted.
    pub fn is_running(&self) -> bool {
        self.inner.dispatcher.is_running()
    }

    /// Returns `true` while draining after shutdown began.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.dispatcher.is_shutting_down()
    }

    /// Returns `true` once fully drained and stopped.
    pub fn is_shutdown(&self) -> bool {
        self.inner.dispatcher.is_shutdown()
    }

    /// Returns `true` if queued work was discarded by a kill.
    pub fn is_killed(&self) -> bool {
        self.inner.dispatcher.is_killed()
    }

    /// Returns a guard that performs a best-effort final flush when
    /// dropped: shutdown, wait up to the configured drain timeout, then
    /// kill and wait once more. Hold it for the life of the process and let
    /// it drop on exit. An explicit [`shutdown`](Self::shutdown) or
    /// [`kill`](Self::kill) disarms it.
    pub fn flush_guard(&self) -> FlushGuard {
        FlushGuard {
            exporter: self.clone(),
        }
    }
}

/// RAII handle that flushes the exporter on drop; see
/// [`Exporter::flush_guard`].
pub struct FlushGuard {
    exporter: Exporter,
}

impl FlushGuard {
    /// Consumes the guard without flushing.
    pub fn disarm(self) {
        std::mem::forget(self);
    }
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        // Already shut down explicitly: nothing to do.
        if !self.exporter.is_running() {
            return;
        }
        let drain_timeout = self.exporter.inner.drain_timeout;
        self.exporter.shutdown();
        if !self.exporter.wait_for_termination(drain_timeout) {
            self.exporter.kill();
            self.exporter.wait_for_termination(drain_timeout);
        }
    }
}
