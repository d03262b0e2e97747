//! Uplink telemetry export adapter
//!
//! Converts in-process tracing spans and stats aggregation views into the
//! wire records a remote telemetry ingestion API expects, and delivers them
//! asynchronously with bounded concurrency.
//!
//! # Architecture
//!
//! - [`convert`] / [`metric`]: deterministic conversion of spans and view
//!   data into wire records, with per-batch stack-trace deduplication.
//! - [`provision`]: lazy, resolve-once construction of the ingestion client
//!   (deferred past any process fork).
//! - [`dispatcher`]: bounded queue plus bounded parallelism, with
//!   run-inline backpressure when the queue is full.
//! - [`exporter`]: the facade tying it together, including graceful
//!   shutdown, kill, blocking termination wait, and an RAII flush guard for
//!   process exit.
//!
//! # Example
//!
//! ```ignore
//! use uplink::{Exporter, ExporterConfig, StdoutClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let exporter = Exporter::with_client(
//!         ExporterConfig::new().with_project_id("my-project"),
//!         Arc::new(StdoutClient::new(false)),
//!     );
//!     let _guard = exporter.flush_guard();
//!
//!     exporter.export_spans(spans).await.unwrap();
//! }
//! ```

pub mod client;
pub mod config;
pub mod convert;
pub mod dispatcher;
pub mod error;
pub mod exporter;
pub mod lifecycle;
pub mod metric;
pub mod provision;
pub mod span;
pub mod stats;
pub mod wire;

// Re-export main types
pub use client::{IngestClient, IngestClientBoxed, NullClient, StdoutClient};
pub use config::ExporterConfig;
pub use convert::SpanConverter;
pub use dispatcher::{Dispatcher, DispatcherConfig, ExportRequest, Processor};
pub use error::ExportError;
pub use exporter::{Exporter, FlushGuard};
pub use lifecycle::{Lifecycle, Phase};
pub use metric::StatsConverter;
pub use provision::{ClientFactory, ClientProvisioner, Identity};
pub use span::{
    AttributeValue, Link, LinkKind, MessageEventKind, Span, StackFrame, StackTrace, Status,
    TimeEvent, TruncatableString,
};
pub use stats::{Aggregation, AggregationData, Measure, MeasureKind, View, ViewData};
