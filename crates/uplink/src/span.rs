//! Domain span model consumed by the exporter.
//!
//! Spans arrive from the instrumentation layer as immutable snapshots; the
//! exporter reads them and never mutates them. All `dropped_*` counters are
//! whatever the instrumentation layer already elided for size limits and are
//! propagated verbatim, never recomputed here.

use std::time::SystemTime;

/// A string that may have been truncated by the instrumentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncatableString {
    /// The (possibly shortened) value.
    pub value: String,
    /// Number of bytes removed from the original value.
    pub truncated_byte_count: u32,
}

impl TruncatableString {
    /// Creates an untruncated string.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            truncated_byte_count: 0,
        }
    }

    /// Creates a string with an explicit truncated-byte count.
    pub fn truncated(value: impl Into<String>, truncated_byte_count: u32) -> Self {
        Self {
            value: value.into(),
            truncated_byte_count,
        }
    }
}

impl From<&str> for TruncatableString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TruncatableString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Span attribute value.
///
/// `Double` exists because instrumentation layers record floating-point
/// attributes, but the wire schema has no representation for them; converting
/// one is a hard [`InvalidAttributeType`](crate::ExportError::InvalidAttributeType)
/// error rather than a silent fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// String value, possibly truncated upstream.
    String(TruncatableString),
    /// 64-bit signed integer value.
    Int(i64),
    /// Boolean value.
    Bool(bool),
    /// Floating-point value; unsupported by the wire schema.
    Double(f64),
}

impl AttributeValue {
    /// Convenience constructor for string attributes.
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(TruncatableString::new(value))
    }
}

/// Span status (code plus message).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Canonical status code.
    pub code: i32,
    /// Human-readable status message.
    pub message: String,
}

/// Direction of a message event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageEventKind {
    /// Direction unknown.
    Unspecified,
    /// Message sent by this span's process.
    Sent,
    /// Message received by this span's process.
    Received,
}

/// A timestamped event attached to a span.
///
/// Closed union: annotation or message event. The converter matches
/// exhaustively, so a new event kind is a compile-time-visible change.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeEvent {
    /// Free-form text annotation with attributes.
    Annotation {
        /// When the annotation was recorded.
        time: SystemTime,
        /// Annotation text.
        description: TruncatableString,
        /// Attributes attached to the annotation.
        attributes: Vec<(String, AttributeValue)>,
        /// Attributes elided upstream.
        dropped_attributes_count: u32,
    },
    /// A message send or receive event.
    MessageEvent {
        /// When the event occurred.
        time: SystemTime,
        /// Direction of the message.
        kind: MessageEventKind,
        /// Caller-assigned message id.
        id: u64,
        /// Uncompressed message size in bytes.
        uncompressed_size: u64,
        /// Compressed message size in bytes.
        compressed_size: u64,
    },
}

/// Relationship of a linked span to this span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Relationship unknown.
    Unspecified,
    /// The linked span is a child of this span.
    ChildLinkedSpan,
    /// The linked span is a parent of this span.
    ParentLinkedSpan,
}

/// A pointer from this span to a span in the same or another trace.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// Trace id of the linked span.
    pub trace_id: u128,
    /// Span id of the linked span.
    pub span_id: u64,
    /// Relationship of the linked span.
    pub kind: LinkKind,
    /// Attributes attached to the link.
    pub attributes: Vec<(String, AttributeValue)>,
}

/// A single frame of a captured backtrace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackFrame {
    /// Fully-qualified function name.
    pub function_name: Option<TruncatableString>,
    /// Un-mangled function name, if different.
    pub original_function_name: Option<TruncatableString>,
    /// Source file name.
    pub file_name: Option<TruncatableString>,
    /// Line number within the source file.
    pub line_number: i64,
    /// Column number within the line.
    pub column_number: i64,
    /// Binary module the frame belongs to.
    pub load_module: Option<TruncatableString>,
    /// Version of the source code.
    pub source_version: Option<TruncatableString>,
}

/// A captured backtrace with a caller-supplied deduplication hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackTrace {
    /// Ordered frames, outermost last.
    pub frames: Vec<StackFrame>,
    /// Frames elided upstream for size limits.
    pub dropped_frames_count: u32,
    /// Caller-supplied hash of the full frame sequence. Zero means "no
    /// hash": the frames are serialized on every occurrence and nothing is
    /// cached. The converter never recomputes this value.
    pub hash_id: u64,
}

/// A single timed operation in a distributed trace.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    /// 128-bit trace identifier.
    pub trace_id: u128,
    /// 64-bit span identifier, unique within the trace.
    pub span_id: u64,
    /// Parent span id, if this is not a root span.
    pub parent_span_id: Option<u64>,
    /// Display name of the operation.
    pub name: TruncatableString,
    /// Start of the operation.
    pub start_time: SystemTime,
    /// End of the operation.
    pub end_time: SystemTime,
    /// Attributes in recording order.
    pub attributes: Vec<(String, AttributeValue)>,
    /// Attributes elided upstream.
    pub dropped_attributes_count: u32,
    /// Annotations and message events in time order.
    pub time_events: Vec<TimeEvent>,
    /// Annotations elided upstream.
    pub dropped_annotations_count: u32,
    /// Message events elided upstream.
    pub dropped_message_events_count: u32,
    /// Links to related spans.
    pub links: Vec<Link>,
    /// Links elided upstream.
    pub dropped_links_count: u32,
    /// Backtrace captured at span creation, if any.
    pub stack_trace: Option<StackTrace>,
    /// Status recorded at span end, if any.
    pub status: Option<Status>,
}

impl Span {
    /// Creates a span with the given identity and timing; all collections
    /// start empty and all drop counters start at zero.
    pub fn new(
        trace_id: u128,
        span_id: u64,
        name: impl Into<TruncatableString>,
        start_time: SystemTime,
        end_time: SystemTime,
    ) -> Self {
        Self {
            trace_id,
            span_id,
            parent_span_id: None,
            name: name.into(),
            start_time,
            end_time,
            attributes: Vec::new(),
            dropped_attributes_count: 0,
            time_events: Vec::new(),
            dropped_annotations_count: 0,
            dropped_message_events_count: 0,
            links: Vec::new(),
            dropped_links_count: 0,
            stack_trace: None,
            status: None,
        }
    }

    /// Sets the parent span id.
    pub fn with_parent(mut self, parent_span_id: u64) -> Self {
        self.parent_span_id = Some(parent_span_id);
        self
    }

    /// Appends an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.push((key.into(), value));
        self
    }

    /// Sets the status.
    pub fn with_status(mut self, code: i32, message: impl Into<String>) -> Self {
        self.status = Some(Status {
            code,
            message: message.into(),
        });
        self
    }

    /// Attaches a stack trace.
    pub fn with_stack_trace(mut self, stack_trace: StackTrace) -> Self {
        self.stack_trace = Some(stack_trace);
        self
    }

    /// Appends a time event.
    pub fn with_time_event(mut self, event: TimeEvent) -> Self {
        self.time_events.push(event);
        self
    }

    /// Appends a link.
    pub fn with_link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }
}
