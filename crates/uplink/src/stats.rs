//! Domain stats model: views, measures, and aggregated data snapshots.
//!
//! A [`ViewData`] snapshot pairs a view definition with the accumulated
//! [`AggregationData`] per tag-value tuple. Tag tuples align positionally
//! with the view's declared columns; the converter zips them to build
//! time-series labels.

use std::time::SystemTime;

/// Numeric kind of a measure's recorded values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureKind {
    /// Values are 64-bit integers.
    Int64,
    /// Values are 64-bit floats.
    Double,
}

/// A named quantity that measurements are recorded against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measure {
    /// Unique measure name.
    pub name: String,
    /// Unit string, e.g. `"ms"` or `"By"`.
    pub unit: String,
    /// Numeric kind of recorded values.
    pub kind: MeasureKind,
}

impl Measure {
    /// Creates an integer-valued measure.
    pub fn int64(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            kind: MeasureKind::Int64,
        }
    }

    /// Creates a float-valued measure.
    pub fn double(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            kind: MeasureKind::Double,
        }
    }
}

/// Aggregation rule declared by a view.
///
/// Closed union over the four supported kinds; the converter matches
/// exhaustively, so an unrecognized kind cannot exist at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Count of recorded measurements.
    Count,
    /// Sum of recorded values.
    Sum,
    /// Most recently recorded value.
    LastValue,
    /// Histogram over explicit bucket bounds.
    Distribution {
        /// Ordered bucket boundaries (exclusive upper bounds).
        bounds: Vec<f64>,
    },
}

/// A named aggregation rule over a measure, grouped by tag columns.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    /// Unique view name; becomes the metric type suffix on the wire.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// The measure this view aggregates.
    pub measure: Measure,
    /// How measurements are aggregated.
    pub aggregation: Aggregation,
    /// Tag column names; tag tuples in [`ViewData`] rows align with these
    /// positionally.
    pub columns: Vec<String>,
}

/// Accumulated result for one tag tuple under a view.
///
/// Every variant carries the time the value was last updated.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationData {
    /// Running count.
    Count {
        /// Number of measurements recorded.
        value: u64,
        /// Last update time.
        time: SystemTime,
    },
    /// Running sum.
    Sum {
        /// Sum of recorded values.
        value: f64,
        /// Last update time.
        time: SystemTime,
    },
    /// Latest recorded value.
    LastValue {
        /// The value.
        value: f64,
        /// Time the value was recorded.
        time: SystemTime,
    },
    /// Histogram statistics.
    Distribution {
        /// Total number of recorded values.
        count: u64,
        /// Mean of recorded values.
        mean: f64,
        /// Sum of squared deviations from the mean.
        sum_of_squared_deviation: f64,
        /// Ordered bucket boundaries.
        bucket_bounds: Vec<f64>,
        /// Per-bucket counts; invariant: `len == bucket_bounds.len() + 1`.
        bucket_counts: Vec<u64>,
        /// Last update time.
        time: SystemTime,
    },
}

impl AggregationData {
    /// Creates distribution data, checking the bucket invariant in debug
    /// builds.
    pub fn distribution(
        count: u64,
        mean: f64,
        sum_of_squared_deviation: f64,
        bucket_bounds: Vec<f64>,
        bucket_counts: Vec<u64>,
        time: SystemTime,
    ) -> Self {
        debug_assert_eq!(
            bucket_counts.len(),
            bucket_bounds.len() + 1,
            "bucket_counts must have one more entry than bucket_bounds"
        );
        Self::Distribution {
            count,
            mean,
            sum_of_squared_deviation,
            bucket_bounds,
            bucket_counts,
            time,
        }
    }

    /// Returns the last-update time of this data.
    pub fn time(&self) -> SystemTime {
        match self {
            Self::Count { time, .. }
            | Self::Sum { time, .. }
            | Self::LastValue { time, .. }
            | Self::Distribution { time, .. } => *time,
        }
    }
}

/// A snapshot of a view's accumulated data at export time.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewData {
    /// The view definition.
    pub view: View,
    /// When collection under this view began; cumulative intervals start
    /// here.
    pub start_time: SystemTime,
    /// One row per tag tuple. Tuple entries align positionally with
    /// `view.columns`.
    pub rows: Vec<(Vec<String>, AggregationData)>,
}
