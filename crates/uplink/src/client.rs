//! Ingestion client seam.
//!
//! The remote API client is an external collaborator; this module defines
//! the trait the dispatcher calls through, plus a few simple
//! implementations for demos, benchmarks, and tests.
//!
//! # Note on object safety
//!
//! [`IngestClient`] uses `impl Future` return types, which are not
//! object-safe. For dynamic dispatch, use `Arc<dyn IngestClientBoxed>`; the
//! blanket impl lifts any `IngestClient` into it.

use crate::error::ExportError;
use crate::wire::{CreateDescriptorRequest, WriteSpansRequest, WriteTimeSeriesRequest};
use std::future::Future;
use std::pin::Pin;

/// Client for the remote telemetry ingestion API.
pub trait IngestClient: Send + Sync {
    /// Writes a batch of converted spans.
    fn write_spans(
        &self,
        request: WriteSpansRequest,
    ) -> impl Future<Output = Result<(), ExportError>> + Send;

    /// Writes a batch of converted time series.
    fn write_time_series(
        &self,
        request: WriteTimeSeriesRequest,
    ) -> impl Future<Output = Result<(), ExportError>> + Send;

    /// Registers a metric descriptor. Request/response, never batched;
    /// conflicts with an existing incompatible descriptor surface as
    /// [`ExportError::Transport`].
    fn create_descriptor(
        &self,
        request: CreateDescriptorRequest,
    ) -> impl Future<Output = Result<(), ExportError>> + Send;

    /// Returns the client name for debugging.
    fn name(&self) -> &str;
}

/// Object-safe version of [`IngestClient`] for dynamic dispatch.
pub trait IngestClientBoxed: Send + Sync {
    /// Writes a batch of converted spans (boxed future for object safety).
    fn write_spans_boxed(
        &self,
        request: WriteSpansRequest,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExportError>> + Send + '_>>;

    /// Writes a batch of converted time series (boxed future).
    fn write_time_series_boxed(
        &self,
        request: WriteTimeSeriesRequest,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExportError>> + Send + '_>>;

    /// Registers a metric descriptor (boxed future).
    fn create_descriptor_boxed(
        &self,
        request: CreateDescriptorRequest,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExportError>> + Send + '_>>;

    /// Returns the client name for debugging.
    fn name(&self) -> &str;
}

impl std::fmt::Debug for dyn IngestClientBoxed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestClientBoxed")
            .field("name", &self.name())
            .finish()
    }
}

/// Blanket implementation: any `IngestClient` can be used boxed.
impl<T: IngestClient> IngestClientBoxed for T {
    fn write_spans_boxed(
        &self,
        request: WriteSpansRequest,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExportError>> + Send + '_>> {
        Box::pin(self.write_spans(request))
    }

    fn write_time_series_boxed(
        &self,
        request: WriteTimeSeriesRequest,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExportError>> + Send + '_>> {
        Box::pin(self.write_time_series(request))
    }

    fn create_descriptor_boxed(
        &self,
        request: CreateDescriptorRequest,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExportError>> + Send + '_>> {
        Box::pin(self.create_descriptor(request))
    }

    fn name(&self) -> &str {
        IngestClient::name(self)
    }
}

/// Stdout client for demos and debugging.
pub struct StdoutClient {
    verbose: bool,
}

impl StdoutClient {
    /// Creates a new stdout client; `verbose` pretty-prints full requests.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    fn dump<T: serde::Serialize>(&self, label: &str, request: &T) -> Result<(), ExportError> {
        if self.verbose {
            let json = serde_json::to_string_pretty(request)
                .map_err(|e| ExportError::Serialization(e.to_string()))?;
            println!("=== {label} ===\n{json}");
        }
        Ok(())
    }
}

impl IngestClient for StdoutClient {
    async fn write_spans(&self, request: WriteSpansRequest) -> Result<(), ExportError> {
        println!("writing {} spans to {}", request.spans.len(), request.name);
        self.dump("spans", &request)
    }

    async fn write_time_series(
        &self,
        request: WriteTimeSeriesRequest,
    ) -> Result<(), ExportError> {
        println!(
            "writing {} time series to {}",
            request.time_series.len(),
            request.name
        );
        self.dump("time series", &request)
    }

    async fn create_descriptor(
        &self,
        request: CreateDescriptorRequest,
    ) -> Result<(), ExportError> {
        println!("creating descriptor {}", request.descriptor.metric_type);
        self.dump("descriptor", &request)
    }

    fn name(&self) -> &str {
        "stdout"
    }
}

/// Null client that discards all requests (for benchmarking).
#[derive(Default)]
pub struct NullClient;

impl NullClient {
    pub fn new() -> Self {
        Self
    }
}

impl IngestClient for NullClient {
    async fn write_spans(&self, _request: WriteSpansRequest) -> Result<(), ExportError> {
        Ok(())
    }

    async fn write_time_series(
        &self,
        _request: WriteTimeSeriesRequest,
    ) -> Result<(), ExportError> {
        Ok(())
    }

    async fn create_descriptor(
        &self,
        _request: CreateDescriptorRequest,
    ) -> Result<(), ExportError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}
