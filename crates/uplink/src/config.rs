//! Exporter configuration.

use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration recognized at exporter construction.
///
/// `project_id` and `credentials` may be left unset; resolution then falls
/// back to the environment on first export (see
/// [`provision`](crate::provision)), so a misconfiguration surfaces at first
/// use rather than at construction.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// Target project/resource identifier.
    pub project_id: Option<String>,
    /// Credentials blob or path for the transport.
    pub credentials: Option<String>,
    /// Per-request timeout handed to the transport.
    pub request_timeout: Duration,
    /// Maximum concurrently executing export requests; `0` runs everything
    /// inline on the caller.
    pub worker_count: usize,
    /// Admission queue capacity; `0` means unbounded.
    pub queue_capacity: usize,
    /// How long the drop guard waits for a drain before killing.
    pub drain_timeout: Duration,
    /// Namespace prefix for metric types.
    pub metric_prefix: String,
    /// Monitored resource type stamped on every time series.
    pub resource_type: String,
    /// Monitored resource labels.
    pub resource_labels: BTreeMap<String, String>,
    /// Agent label override; defaults to `uplink-rust [{version}]`.
    pub agent_label: Option<String>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            credentials: None,
            request_timeout: Duration::from_secs(12),
            worker_count: 2,
            queue_capacity: 1000,
            drain_timeout: Duration::from_secs(5),
            metric_prefix: "custom.uplink.dev/stats".to_string(),
            resource_type: "global".to_string(),
            resource_labels: BTreeMap::new(),
            agent_label: None,
        }
    }
}

impl ExporterConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the target project id.
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Sets the transport credentials.
    pub fn with_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    /// Sets the per-request transport timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the worker count; `0` disables backgrounding.
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Sets the queue capacity; `0` means unbounded.
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Sets the drop-guard drain timeout.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Sets the metric type prefix.
    pub fn with_metric_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.metric_prefix = prefix.into();
        self
    }

    /// Sets the monitored resource type.
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = resource_type.into();
        self
    }

    /// Adds a monitored resource label.
    pub fn with_resource_label(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.resource_labels.insert(key.into(), value.into());
        self
    }

    /// Overrides the agent label attached to every span.
    pub fn with_agent_label(mut self, label: impl Into<String>) -> Self {
        self.agent_label = Some(label.into());
        self
    }
}
