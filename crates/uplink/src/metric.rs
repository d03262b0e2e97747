//! Stats conversion: [`ViewData`] snapshots to metric descriptors and
//! time series.
//!
//! Unlike span conversion there is no per-batch cache; the converter is a
//! pure function of the view data plus the exporter's resource identity.

use crate::stats::{Aggregation, AggregationData, MeasureKind, View, ViewData};
use crate::wire::{
    LabelDescriptor, MetricDescriptor, MetricKind, Point, TimeInterval, TimeSeries, TypedValue,
    ValueType, WireDistribution, WireMetric, WireResource,
};
use crate::convert::timestamp;
use std::collections::BTreeMap;

/// Stats converter scoped to one exporter's resource identity.
#[derive(Debug, Clone)]
pub struct StatsConverter {
    metric_prefix: String,
    resource_type: String,
    resource_labels: BTreeMap<String, String>,
}

impl StatsConverter {
    /// Creates a converter with the exporter's metric prefix and monitored
    /// resource identity.
    pub fn new(
        metric_prefix: impl Into<String>,
        resource_type: impl Into<String>,
        resource_labels: BTreeMap<String, String>,
    ) -> Self {
        Self {
            metric_prefix: metric_prefix.into(),
            resource_type: resource_type.into(),
            resource_labels,
        }
    }

    /// Namespaced metric type for a view, `{prefix}/{view name}`.
    pub fn metric_type(&self, view: &View) -> String {
        format!("{}/{}", self.metric_prefix, view.name)
    }

    /// LastValue is the only instantaneous aggregation; everything else
    /// accumulates from the view's collection start.
    pub fn metric_kind(view: &View) -> MetricKind {
        match view.aggregation {
            Aggregation::LastValue => MetricKind::Gauge,
            Aggregation::Count | Aggregation::Sum | Aggregation::Distribution { .. } => {
                MetricKind::Cumulative
            }
        }
    }

    /// Value type per aggregation kind; Sum and LastValue follow the
    /// measure's declared numeric kind.
    pub fn value_type(view: &View) -> ValueType {
        match view.aggregation {
            Aggregation::Distribution { .. } => ValueType::Distribution,
            Aggregation::Count => ValueType::Int64,
            Aggregation::Sum | Aggregation::LastValue => match view.measure.kind {
                MeasureKind::Int64 => ValueType::Int64,
                MeasureKind::Double => ValueType::Double,
            },
        }
    }

    /// Builds the schema registration for a view's metric type.
    pub fn descriptor(&self, view: &View) -> MetricDescriptor {
        MetricDescriptor {
            metric_type: self.metric_type(view),
            display_name: view.name.clone(),
            description: view.description.clone(),
            metric_kind: Self::metric_kind(view),
            value_type: Self::value_type(view),
            unit: view.measure.unit.clone(),
            labels: view
                .columns
                .iter()
                .map(|column| LabelDescriptor {
                    key: column.clone(),
                    description: String::new(),
                })
                .collect(),
        }
    }

    /// Converts one view-data snapshot into one time series per row.
    /// Row order is preserved.
    pub fn time_series(&self, view_data: &ViewData) -> Vec<TimeSeries> {
        let view = &view_data.view;
        let metric_type = self.metric_type(view);
        let metric_kind = Self::metric_kind(view);
        let value_type = Self::value_type(view);

        view_data
            .rows
            .iter()
            .map(|(tag_values, data)| TimeSeries {
                metric: WireMetric {
                    metric_type: metric_type.clone(),
                    labels: Self::labels(&view.columns, tag_values),
                },
                resource: WireResource {
                    resource_type: self.resource_type.clone(),
                    labels: self.resource_labels.clone(),
                },
                metric_kind,
                value_type,
                points: vec![Self::point(view, view_data, data)],
            })
            .collect()
    }

    /// Labels built positionally: column i maps to tag value i.
    fn labels(columns: &[String], tag_values: &[String]) -> BTreeMap<String, String> {
        columns
            .iter()
            .zip(tag_values)
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect()
    }

    fn point(view: &View, view_data: &ViewData, data: &AggregationData) -> Point {
        match data {
            AggregationData::LastValue { value, time } => {
                // Instantaneous: start == end == recorded time.
                let at = timestamp(*time);
                Point {
                    interval: TimeInterval {
                        start_time: at,
                        end_time: at,
                    },
                    value: Self::numeric_value(view, *value),
                }
            }
            AggregationData::Count { value, time } => Point {
                interval: TimeInterval {
                    start_time: timestamp(view_data.start_time),
                    end_time: timestamp(*time),
                },
                value: TypedValue::Int64Value(*value as i64),
            },
            AggregationData::Sum { value, time } => Point {
                interval: TimeInterval {
                    start_time: timestamp(view_data.start_time),
                    end_time: timestamp(*time),
                },
                value: Self::numeric_value(view, *value),
            },
            AggregationData::Distribution {
                count,
                mean,
                sum_of_squared_deviation,
                bucket_bounds,
                bucket_counts,
                time,
            } => Point {
                interval: TimeInterval {
                    start_time: timestamp(view_data.start_time),
                    end_time: timestamp(*time),
                },
                value: TypedValue::DistributionValue(Self::distribution(
                    *count,
                    *mean,
                    *sum_of_squared_deviation,
                    bucket_bounds,
                    bucket_counts,
                )),
            },
        }
    }

    fn numeric_value(view: &View, value: f64) -> TypedValue {
        match view.measure.kind {
            MeasureKind::Int64 => TypedValue::Int64Value(value as i64),
            MeasureKind::Double => TypedValue::DoubleValue(value),
        }
    }

    /// Prefixes the implicit zero lower bound and the empty underflow
    /// bucket the backend expects below it.
    fn distribution(
        count: u64,
        mean: f64,
        sum_of_squared_deviation: f64,
        bucket_bounds: &[f64],
        bucket_counts: &[u64],
    ) -> WireDistribution {
        let mut bounds = Vec::with_capacity(bucket_bounds.len() + 1);
        bounds.push(0.0);
        bounds.extend_from_slice(bucket_bounds);

        let mut counts = Vec::with_capacity(bucket_counts.len() + 1);
        counts.push(0);
        counts.extend_from_slice(bucket_counts);

        WireDistribution {
            count,
            mean,
            sum_of_squared_deviation,
            bucket_bounds: bounds,
            bucket_counts: counts,
        }
    }
}
