//! Span conversion: domain [`Span`] snapshots to wire records.
//!
//! A [`SpanConverter`] is created fresh for every export batch. Its only
//! state is the stack-trace dedup cache, so conversion is a pure function of
//! the input plus that cache, and the cache never leaks across batches.

use crate::error::ExportError;
use crate::span::{
    AttributeValue, Link, LinkKind, MessageEventKind, Span, StackFrame, StackTrace, TimeEvent,
    TruncatableString,
};
use crate::wire::{
    WireAttributeValue, WireAttributes, WireLink, WireLinkKind, WireLinks, WireMessageEventKind,
    WireSpan, WireStackFrame, WireStackFrames, WireStackTrace, WireStatus, WireTimeEvent,
    WireTimeEventValue, WireTimeEvents, WireTimestamp, WireTruncatableString,
};
use std::collections::{BTreeMap, HashSet};
use std::time::SystemTime;

/// Reserved attribute key identifying the exporting agent. Added to every
/// span, never counted against the caller's drop counters.
pub const AGENT_KEY: &str = "uplink.dev/agent";

/// Default agent label, `uplink-rust [{version}]`.
pub fn default_agent_label() -> String {
    format!("uplink-rust [{}]", env!("CARGO_PKG_VERSION"))
}

/// Fixed remap table from conventional instrumentation keys to the wire
/// schema's namespaced equivalents. Unmapped keys pass through unchanged.
const ATTRIBUTE_REMAP: &[(&str, &str)] = &[
    ("http.host", "/http/host"),
    ("http.method", "/http/method"),
    ("http.path", "/http/path"),
    ("http.route", "/http/route"),
    ("http.user_agent", "/http/user_agent"),
    ("http.status_code", "/http/status_code"),
];

fn remap_key(key: &str) -> &str {
    ATTRIBUTE_REMAP
        .iter()
        .find(|(from, _)| *from == key)
        .map_or(key, |(_, to)| *to)
}

/// Converts a `SystemTime` to the protocol's seconds+nanos pair at
/// nanosecond granularity, including pre-epoch times.
pub fn timestamp(time: SystemTime) -> WireTimestamp {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(d) => WireTimestamp {
            seconds: d.as_secs() as i64,
            nanos: d.subsec_nanos() as i32,
        },
        Err(e) => {
            // Pre-epoch: borrow one second so nanos stays in 0..1e9.
            let d = e.duration();
            let nanos = d.subsec_nanos();
            if nanos == 0 {
                WireTimestamp {
                    seconds: -(d.as_secs() as i64),
                    nanos: 0,
                }
            } else {
                WireTimestamp {
                    seconds: -(d.as_secs() as i64) - 1,
                    nanos: (1_000_000_000 - nanos) as i32,
                }
            }
        }
    }
}

fn truncatable(s: &TruncatableString) -> WireTruncatableString {
    WireTruncatableString {
        value: s.value.clone(),
        truncated_byte_count: s.truncated_byte_count,
    }
}

fn attribute_value(key: &str, value: &AttributeValue) -> Result<WireAttributeValue, ExportError> {
    match value {
        AttributeValue::String(s) => Ok(WireAttributeValue::StringValue(truncatable(s))),
        AttributeValue::Int(i) => Ok(WireAttributeValue::IntValue(*i)),
        AttributeValue::Bool(b) => Ok(WireAttributeValue::BoolValue(*b)),
        AttributeValue::Double(_) => Err(ExportError::InvalidAttributeType {
            key: key.to_string(),
            kind: "double",
        }),
    }
}

/// Per-batch span converter.
///
/// The stack-trace cache is keyed by the caller-supplied `hash_id`; the
/// converter never recomputes hashes, so a colliding hash would cause frame
/// data to be omitted incorrectly. Hash quality is the caller's concern.
pub struct SpanConverter {
    project_id: String,
    agent_label: String,
    seen_stack_traces: HashSet<u64>,
}

impl SpanConverter {
    /// Creates a converter scoped to one project and one export batch.
    pub fn new(project_id: impl Into<String>, agent_label: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            agent_label: agent_label.into(),
            seen_stack_traces: HashSet::new(),
        }
    }

    /// Converts one span. Fails only on an attribute value the wire schema
    /// cannot represent; the error aborts this record, not the batch.
    pub fn convert_span(&mut self, span: &Span) -> Result<WireSpan, ExportError> {
        let attributes = self.span_attributes(span)?;
        let stack_trace = span.stack_trace.as_ref().map(|st| self.stack_trace(st));

        Ok(WireSpan {
            name: format!(
                "projects/{}/traces/{:032x}/spans/{:016x}",
                self.project_id, span.trace_id, span.span_id
            ),
            span_id: format!("{:016x}", span.span_id),
            parent_span_id: span.parent_span_id.map(|id| format!("{id:016x}")),
            display_name: truncatable(&span.name),
            start_time: timestamp(span.start_time),
            end_time: timestamp(span.end_time),
            attributes,
            stack_trace,
            time_events: Self::time_events(span)?,
            links: Self::links(span)?,
            status: span.status.as_ref().map(|s| WireStatus {
                code: s.code,
                message: s.message.clone(),
            }),
        })
    }

    /// Span-level attributes: remapped caller attributes plus the reserved
    /// agent attribute. The agent entry does not touch the drop counter.
    fn span_attributes(&self, span: &Span) -> Result<WireAttributes, ExportError> {
        let mut attributes =
            Self::attributes(&span.attributes, span.dropped_attributes_count)?;
        attributes.attribute_map.insert(
            AGENT_KEY.to_string(),
            WireAttributeValue::StringValue(WireTruncatableString {
                value: self.agent_label.clone(),
                truncated_byte_count: 0,
            }),
        );
        Ok(attributes)
    }

    fn attributes(
        attributes: &[(String, AttributeValue)],
        dropped: u32,
    ) -> Result<WireAttributes, ExportError> {
        let mut attribute_map = BTreeMap::new();
        for (key, value) in attributes {
            attribute_map.insert(remap_key(key).to_string(), attribute_value(key, value)?);
        }
        Ok(WireAttributes {
            attribute_map,
            dropped_attributes_count: dropped,
        })
    }

    /// Serializes a stack trace, omitting frame data for hash ids already
    /// seen by this converter. A zero hash id disables caching entirely.
    fn stack_trace(&mut self, stack_trace: &StackTrace) -> WireStackTrace {
        let dedup = stack_trace.hash_id != 0;
        let already_seen = dedup && !self.seen_stack_traces.insert(stack_trace.hash_id);

        let stack_frames = if already_seen {
            None
        } else {
            Some(WireStackFrames {
                frame: stack_trace.frames.iter().map(Self::stack_frame).collect(),
                dropped_frames_count: stack_trace.dropped_frames_count,
            })
        };

        WireStackTrace {
            stack_frames,
            stack_trace_hash_id: stack_trace.hash_id,
        }
    }

    fn stack_frame(frame: &StackFrame) -> WireStackFrame {
        WireStackFrame {
            function_name: frame.function_name.as_ref().map(truncatable),
            original_function_name: frame.original_function_name.as_ref().map(truncatable),
            file_name: frame.file_name.as_ref().map(truncatable),
            line_number: frame.line_number,
            column_number: frame.column_number,
            load_module: frame.load_module.as_ref().map(truncatable),
            source_version: frame.source_version.as_ref().map(truncatable),
        }
    }

    fn time_events(span: &Span) -> Result<WireTimeEvents, ExportError> {
        let mut time_event = Vec::with_capacity(span.time_events.len());
        for event in &span.time_events {
            time_event.push(match event {
                TimeEvent::Annotation {
                    time,
                    description,
                    attributes,
                    dropped_attributes_count,
                } => WireTimeEvent {
                    time: timestamp(*time),
                    value: WireTimeEventValue::Annotation {
                        description: truncatable(description),
                        attributes: Self::attributes(attributes, *dropped_attributes_count)?,
                    },
                },
                TimeEvent::MessageEvent {
                    time,
                    kind,
                    id,
                    uncompressed_size,
                    compressed_size,
                } => WireTimeEvent {
                    time: timestamp(*time),
                    value: WireTimeEventValue::MessageEvent {
                        kind: match kind {
                            MessageEventKind::Unspecified => WireMessageEventKind::TypeUnspecified,
                            MessageEventKind::Sent => WireMessageEventKind::Sent,
                            MessageEventKind::Received => WireMessageEventKind::Received,
                        },
                        id: *id,
                        uncompressed_size_bytes: *uncompressed_size,
                        compressed_size_bytes: *compressed_size,
                    },
                },
            });
        }
        Ok(WireTimeEvents {
            time_event,
            dropped_annotations_count: span.dropped_annotations_count,
            dropped_message_events_count: span.dropped_message_events_count,
        })
    }

    fn links(span: &Span) -> Result<WireLinks, ExportError> {
        let mut link = Vec::with_capacity(span.links.len());
        for l in &span.links {
            link.push(Self::link(l)?);
        }
        Ok(WireLinks {
            link,
            dropped_links_count: span.dropped_links_count,
        })
    }

    fn link(link: &Link) -> Result<WireLink, ExportError> {
        Ok(WireLink {
            trace_id: format!("{:032x}", link.trace_id),
            span_id: format!("{:016x}", link.span_id),
            kind: match link.kind {
                LinkKind::Unspecified => WireLinkKind::TypeUnspecified,
                LinkKind::ChildLinkedSpan => WireLinkKind::ChildLinkedSpan,
                LinkKind::ParentLinkedSpan => WireLinkKind::ParentLinkedSpan,
            },
            attributes: Self::attributes(&link.attributes, 0)?,
        })
    }
}
