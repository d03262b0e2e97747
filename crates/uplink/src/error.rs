//! Error types for export operations.

use thiserror::Error;

/// Errors that can occur while converting or delivering telemetry.
#[derive(Debug, Clone, Error)]
pub enum ExportError {
    /// No usable identity or credentials could be resolved.
    #[error("configuration error: {0}")]
    Config(String),

    /// A span attribute value has no wire representation.
    #[error("invalid attribute type for key `{key}`: {kind}")]
    InvalidAttributeType {
        /// Attribute key as supplied by the caller.
        key: String,
        /// Human-readable name of the offending value kind.
        kind: &'static str,
    },

    /// The exporter no longer accepts submissions.
    #[error("exporter is not running")]
    NotRunning,

    /// Transport-layer error (network, gRPC, HTTP).
    #[error("transport error: {0}")]
    Transport(String),

    /// Wire-record serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ExportError {
    /// Returns `true` if this error is non-fatal to the exporter (the batch
    /// is dropped but later submissions may succeed).
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns `true` if this error indicates the exporter is permanently
    /// unusable for the affected path.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::NotRunning)
    }
}
