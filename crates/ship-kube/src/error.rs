//! Error types for ship-kube

use std::time::Duration;
use thiserror::Error;

/// Result type for ship-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while installing a bundle
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Kubeconfig could not be loaded
    #[error("failed to load kubeconfig: {0}")]
    Kubeconfig(String),

    /// Reading a resource status failed
    #[error("failed to read status of {resource}: {message}")]
    ClusterRead { resource: String, message: String },

    /// External tool is not installed
    #[error("{program} is not installed\nHint: {hint}")]
    ToolMissing { program: String, hint: String },

    /// External tool could not be started
    #[error("failed to run {program}: {source}")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// External tool exited unsuccessfully
    #[error("`{program} {args}` failed: {output}")]
    CommandFailed {
        program: String,
        args: String,
        output: String,
    },

    /// Chart install failed (fatal under the abort policy)
    #[error("failed to install release '{release}': {source}")]
    ChartInstallFailed {
        release: String,
        #[source]
        source: Box<KubeError>,
    },

    /// Resource kind not usable for the requested wait
    #[error(transparent)]
    UnsupportedKind(#[from] ship_core::CoreError),

    /// Wait exceeded its deadline
    #[error("timed out after {}s waiting for {resource} ({waiting_for})", .after.as_secs())]
    Timeout {
        resource: String,
        waiting_for: String,
        after: Duration,
    },

    /// Resource reached a terminal failure state
    #[error("{resource} {reason}")]
    ResourceFailed { resource: String, reason: String },

    /// Run was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl KubeError {
    /// Whether the error belongs to a single component step
    ///
    /// Component-scoped errors are recorded in the report and the run continues.
    /// Everything else stops the run.
    pub fn is_component_scoped(&self) -> bool {
        matches!(
            self,
            KubeError::UnsupportedKind(_) | KubeError::Timeout { .. } | KubeError::ResourceFailed { .. }
        )
    }
}
