//! Lazy, resolve-once client provisioning.
//!
//! Some transports must not be initialized before the process forks, so the
//! client handle is never built at exporter construction time. Resolution
//! runs exactly once, on first demand, and the outcome (success or failure)
//! is memoized for the exporter's lifetime; concurrent first-touch from
//! multiple workers observes the same resolved handle or the same failure.

use crate::client::IngestClientBoxed;
use crate::error::ExportError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Environment variable consulted when no project id is configured.
pub const ENV_PROJECT_ID: &str = "UPLINK_PROJECT_ID";
/// Environment variable consulted when no credentials are configured.
pub const ENV_CREDENTIALS: &str = "UPLINK_CREDENTIALS";

/// Resolved identity handed to the client factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Target project id.
    pub project_id: String,
    /// Credentials blob or path, if any. A factory whose target requires
    /// authentication fails resolution when this is `None`.
    pub credentials: Option<String>,
    /// Per-request timeout the transport should apply.
    pub request_timeout: Duration,
}

/// Builds a client handle from a resolved identity. Supplied at wiring
/// time, since the real transport is an external collaborator.
pub type ClientFactory = Arc<
    dyn Fn(&Identity) -> Result<Arc<dyn IngestClientBoxed>, ExportError> + Send + Sync,
>;

enum Source {
    /// Pre-built handle; resolution is bypassed entirely.
    Override(Arc<dyn IngestClientBoxed>),
    /// Factory invoked once with the resolved identity.
    Factory(ClientFactory),
}

/// Lazily resolves the ingestion client exactly once per exporter instance.
pub struct ClientProvisioner {
    project_id: Option<String>,
    credentials: Option<String>,
    request_timeout: Duration,
    source: Source,
    cell: OnceCell<Result<Arc<dyn IngestClientBoxed>, ExportError>>,
}

impl ClientProvisioner {
    /// Creates a provisioner that will invoke `factory` on first demand.
    pub fn new(
        project_id: Option<String>,
        credentials: Option<String>,
        request_timeout: Duration,
        factory: ClientFactory,
    ) -> Self {
        Self {
            project_id,
            credentials,
            request_timeout,
            source: Source::Factory(factory),
            cell: OnceCell::new(),
        }
    }

    /// Creates a provisioner around a pre-built handle (test/override mode);
    /// credential and network resolution never runs.
    pub fn with_client(
        project_id: Option<String>,
        client: Arc<dyn IngestClientBoxed>,
    ) -> Self {
        Self {
            project_id,
            credentials: None,
            request_timeout: Duration::from_secs(0),
            source: Source::Override(client),
            cell: OnceCell::new(),
        }
    }

    /// Project id after fallback, without forcing client resolution.
    /// Needed by the converters before any network activity.
    pub fn project_id(&self) -> Result<String, ExportError> {
        self.project_id
            .clone()
            .or_else(|| std::env::var(ENV_PROJECT_ID).ok())
            .ok_or_else(|| {
                ExportError::Config(format!(
                    "no project id configured and {ENV_PROJECT_ID} is unset"
                ))
            })
    }

    /// Returns the resolved client, resolving it on first call.
    pub async fn client(&self) -> Result<Arc<dyn IngestClientBoxed>, ExportError> {
        self.cell.get_or_init(|| async { self.resolve() }).await.clone()
    }

    fn resolve(&self) -> Result<Arc<dyn IngestClientBoxed>, ExportError> {
        match &self.source {
            Source::Override(client) => Ok(Arc::clone(client)),
            Source::Factory(factory) => {
                let identity = Identity {
                    project_id: self.project_id()?,
                    credentials: self
                        .credentials
                        .clone()
                        .or_else(|| std::env::var(ENV_CREDENTIALS).ok()),
                    request_timeout: self.request_timeout,
                };
                factory(&identity)
            }
        }
    }
}
