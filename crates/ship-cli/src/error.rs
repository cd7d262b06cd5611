//! CLI error types with exit code handling
//!
//! Library errors are mapped onto a small set of diagnostics, each with its own
//! exit code.

use miette::Diagnostic;
use ship_core::CoreError;
use ship_kube::KubeError;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Bundle missing, unreadable or invalid
    #[error("{message}")]
    #[diagnostic(code(ship::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// helm or kubectl not installed
    #[error("{message}")]
    #[diagnostic(code(ship::cli::tool_missing))]
    ToolMissing {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Cluster access or external command failure
    #[error("{message}")]
    #[diagnostic(code(ship::cli::cluster))]
    Cluster { message: String },

    /// A chart install stopped the run
    #[error("{message}")]
    #[diagnostic(
        code(ship::cli::chart),
        help("rerun with --on-chart-failure continue to install the remaining components anyway")
    )]
    Chart { message: String },

    /// Some components recorded errors
    #[error("Install finished with errors in {failed} component(s)")]
    #[diagnostic(code(ship::cli::partial_failure))]
    PartialFailure { failed: usize },

    /// Invalid arguments or a missing confirmation
    #[error("{message}")]
    #[diagnostic(code(ship::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Interrupted
    #[error("Interrupted")]
    #[diagnostic(code(ship::cli::cancelled))]
    Cancelled,

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(ship::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::ToolMissing { .. } => exit_codes::TOOL_MISSING,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::Chart { .. } => exit_codes::CHART_ERROR,
            CliError::PartialFailure { .. } => exit_codes::PARTIAL_FAILURE,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Cancelled => exit_codes::CANCELLED,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a usage error with help text
    pub fn usage_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let help = match &err {
            CoreError::BundleNotFound { .. } => {
                Some("create ship.yaml, or pass --config / set SHIP_CONFIG".to_string())
            }
            CoreError::DuplicateRelease { .. } => {
                Some("each component needs its own releaseName".to_string())
            }
            _ => None,
        };
        CliError::Config {
            message: err.to_string(),
            help,
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        match err {
            KubeError::ToolMissing { program, hint } => CliError::ToolMissing {
                message: format!("{} is not installed", program),
                help: Some(hint),
            },
            KubeError::ChartInstallFailed { .. } => CliError::Chart {
                message: err.to_string(),
            },
            KubeError::Cancelled => CliError::Cancelled,
            KubeError::Kubeconfig(_) => CliError::Config {
                message: err.to_string(),
                help: Some("check KUBECONFIG or pass --kube-context".to_string()),
            },
            other => CliError::Cluster {
                message: other.to_string(),
            },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_exit_codes() {
        let missing: CliError = KubeError::ToolMissing {
            program: "helm".to_string(),
            hint: "install helm".to_string(),
        }
        .into();
        assert_eq!(missing.exit_code(), exit_codes::TOOL_MISSING);

        let chart: CliError = KubeError::ChartInstallFailed {
            release: "inggw".to_string(),
            source: Box::new(KubeError::Cancelled),
        }
        .into();
        assert_eq!(chart.exit_code(), exit_codes::CHART_ERROR);

        let timeout: CliError = KubeError::Timeout {
            resource: "pod infra/x".to_string(),
            waiting_for: "completion".to_string(),
            after: Duration::from_secs(1),
        }
        .into();
        assert_eq!(timeout.exit_code(), exit_codes::CLUSTER_ERROR);

        assert_eq!(CliError::from(KubeError::Cancelled).exit_code(), exit_codes::CANCELLED);
        assert_eq!(CliError::PartialFailure { failed: 2 }.exit_code(), exit_codes::PARTIAL_FAILURE);
    }

    #[test]
    fn test_missing_bundle_has_help() {
        let err = CliError::from(CoreError::BundleNotFound {
            searched: "ship.yaml".to_string(),
        });
        assert_eq!(err.exit_code(), exit_codes::CONFIG_ERROR);
        assert!(matches!(err, CliError::Config { help: Some(_), .. }));
    }
}
