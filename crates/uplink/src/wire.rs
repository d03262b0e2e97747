//! Wire-format records handed to the ingestion client.
//!
//! These are plain serde types mirroring the ingestion API's JSON schema.
//! The converter modules produce them; the [`IngestClient`](crate::client::IngestClient)
//! implementations decide how to put them on the wire.

use serde::Serialize;
use std::collections::BTreeMap;

/// Protocol timestamp: whole seconds since the epoch plus non-negative
/// nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WireTimestamp {
    /// Seconds since the Unix epoch; negative for pre-epoch times.
    pub seconds: i64,
    /// Nanosecond remainder, always in `0..1_000_000_000`.
    pub nanos: i32,
}

/// String value plus the byte count removed upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTruncatableString {
    /// The (possibly shortened) value.
    pub value: String,
    /// Bytes truncated from the original value.
    pub truncated_byte_count: u32,
}

/// Attribute value on the wire: string, integer, or boolean.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WireAttributeValue {
    /// String value.
    StringValue(WireTruncatableString),
    /// Integer value.
    IntValue(i64),
    /// Boolean value.
    BoolValue(bool),
}

/// Attribute map plus its drop counter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAttributes {
    /// Attribute key to value.
    pub attribute_map: BTreeMap<String, WireAttributeValue>,
    /// Attributes elided upstream.
    pub dropped_attributes_count: u32,
}

/// Span status on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireStatus {
    /// Canonical status code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
}

/// One frame of a serialized backtrace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireStackFrame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<WireTruncatableString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_function_name: Option<WireTruncatableString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<WireTruncatableString>,
    pub line_number: i64,
    pub column_number: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_module: Option<WireTruncatableString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_version: Option<WireTruncatableString>,
}

/// Frame list plus its drop counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireStackFrames {
    /// Serialized frames.
    pub frame: Vec<WireStackFrame>,
    /// Frames elided upstream.
    pub dropped_frames_count: u32,
}

/// Backtrace on the wire.
///
/// `stack_frames` is `None` when the converter has already serialized the
/// same `stack_trace_hash_id` within its lifetime; the backend keys frame
/// data off the hash id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireStackTrace {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_frames: Option<WireStackFrames>,
    pub stack_trace_hash_id: u64,
}

/// A single annotation or message event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WireTimeEventValue {
    /// Text annotation.
    Annotation {
        description: WireTruncatableString,
        attributes: WireAttributes,
    },
    /// Message send/receive event.
    MessageEvent {
        #[serde(rename = "type")]
        kind: WireMessageEventKind,
        id: u64,
        uncompressed_size_bytes: u64,
        compressed_size_bytes: u64,
    },
}

/// Message event direction on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireMessageEventKind {
    TypeUnspecified,
    Sent,
    Received,
}

/// A timestamped event on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTimeEvent {
    pub time: WireTimestamp,
    #[serde(flatten)]
    pub value: WireTimeEventValue,
}

/// Event list plus its drop counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTimeEvents {
    pub time_event: Vec<WireTimeEvent>,
    pub dropped_annotations_count: u32,
    pub dropped_message_events_count: u32,
}

/// Link relation on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireLinkKind {
    TypeUnspecified,
    ChildLinkedSpan,
    ParentLinkedSpan,
}

/// A single link to another span.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireLink {
    /// Hex-encoded 128-bit trace id.
    pub trace_id: String,
    /// Hex-encoded 64-bit span id.
    pub span_id: String,
    #[serde(rename = "type")]
    pub kind: WireLinkKind,
    pub attributes: WireAttributes,
}

/// Link list plus its drop counter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireLinks {
    pub link: Vec<WireLink>,
    pub dropped_links_count: u32,
}

/// A converted span record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSpan {
    /// Resource-qualified name:
    /// `projects/{project}/traces/{trace_id:032x}/spans/{span_id:016x}`.
    pub name: String,
    /// Hex-encoded 64-bit span id.
    pub span_id: String,
    /// Hex-encoded parent span id, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub display_name: WireTruncatableString,
    pub start_time: WireTimestamp,
    pub end_time: WireTimestamp,
    pub attributes: WireAttributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<WireStackTrace>,
    pub time_events: WireTimeEvents,
    pub links: WireLinks,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<WireStatus>,
}

/// Metric kind on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricKind {
    /// Instantaneous measurement.
    Gauge,
    /// Value accumulated since a fixed start time.
    Cumulative,
}

/// Value type on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    Int64,
    Double,
    Distribution,
}

/// Label schema entry of a metric descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelDescriptor {
    pub key: String,
    pub description: String,
}

/// Schema registration for a metric type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDescriptor {
    /// Namespaced metric type, `{prefix}/{view name}`.
    #[serde(rename = "type")]
    pub metric_type: String,
    pub display_name: String,
    pub description: String,
    pub metric_kind: MetricKind,
    pub value_type: ValueType,
    pub unit: String,
    pub labels: Vec<LabelDescriptor>,
}

/// Metric identity of a time series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMetric {
    #[serde(rename = "type")]
    pub metric_type: String,
    pub labels: BTreeMap<String, String>,
}

/// Monitored resource a time series is recorded against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub labels: BTreeMap<String, String>,
}

/// Time interval of a point. Gauge points carry `start_time == end_time`;
/// cumulative points span from collection start to last update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInterval {
    pub start_time: WireTimestamp,
    pub end_time: WireTimestamp,
}

/// Distribution statistics on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDistribution {
    pub count: u64,
    pub mean: f64,
    pub sum_of_squared_deviation: f64,
    /// Explicit bucket bounds, prefixed with the implicit zero lower bound.
    pub bucket_bounds: Vec<f64>,
    /// Per-bucket counts, prefixed with the implicit empty underflow bucket.
    pub bucket_counts: Vec<u64>,
}

/// A point's value, typed per the descriptor's value type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TypedValue {
    Int64Value(i64),
    DoubleValue(f64),
    DistributionValue(WireDistribution),
}

/// A single data point of a time series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub interval: TimeInterval,
    pub value: TypedValue,
}

/// One converted time series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeries {
    pub metric: WireMetric,
    pub resource: WireResource,
    pub metric_kind: MetricKind,
    pub value_type: ValueType,
    pub points: Vec<Point>,
}

/// Batched span write request for one project scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteSpansRequest {
    /// Project resource name, `projects/{project_id}`.
    pub name: String,
    pub spans: Vec<WireSpan>,
}

/// Batched time-series write request for one project scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteTimeSeriesRequest {
    /// Project resource name, `projects/{project_id}`.
    pub name: String,
    pub time_series: Vec<TimeSeries>,
}

/// Descriptor registration request; request/response, never batched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDescriptorRequest {
    /// Project resource name, `projects/{project_id}`.
    pub name: String,
    pub descriptor: MetricDescriptor,
}
