//! Component definitions: a chart plus the manifests applied around it
//!
//! A component is installed in three phases:
//! - **pre-install**: lifecycle resources applied before the chart
//! - **chart**: the chart release itself (skipped when already installed)
//! - **post-install**: lifecycle resources applied after the chart
//!
//! Each lifecycle resource can wait for another resource to become ready before it is
//! applied, wait for a pod to complete afterwards, and be removed again once its work
//! is done.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CoreError, Result};

/// A single installable unit of the bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// Chart to install
    pub chart: ChartSpec,

    /// Resources applied before the chart is installed
    #[serde(default)]
    pub pre_install: Vec<LifecycleResource>,

    /// Resources applied after the chart is installed
    #[serde(default)]
    pub post_install: Vec<LifecycleResource>,
}

impl Component {
    /// Release name, which identifies the component within a bundle
    pub fn release_name(&self) -> &str {
        &self.chart.release_name
    }

    /// Namespace used for lifecycle resources that don't set their own
    pub fn namespace(&self) -> &str {
        &self.chart.namespace
    }
}

/// Everything needed to install a chart release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    /// Chart coordinate, e.g. `stable/grafana`
    #[serde(alias = "chartPath")]
    pub path: String,

    /// Namespace the release is installed into
    pub namespace: String,

    /// Release name (unique within a bundle)
    pub release_name: String,

    /// `key=value` overrides, may contain `${domain}`
    #[serde(default)]
    pub overrides: Vec<String>,

    /// Optional values file passed to the chart installer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values_path: Option<PathBuf>,
}

/// A one-off manifest applied around a chart installation (e.g. a configuration pod)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleResource {
    /// Resource that must be ready before the manifest is applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precondition: Option<ReadinessCondition>,

    /// Manifest file to apply
    pub manifest_path: PathBuf,

    /// Pod that must reach the `Succeeded` phase after the manifest is applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for_completion: Option<ResourceRef>,

    /// Overrides the bundle wait timeout for the completion wait (`0s` waits forever)
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub completion_timeout: Option<Duration>,

    /// Keep the applied resources once the phase is done
    #[serde(default)]
    pub persist_after_wait: bool,

    /// Namespace to apply into (defaults to the chart namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl LifecycleResource {
    /// Namespace this resource is applied into
    pub fn target_namespace<'a>(&'a self, component: &'a Component) -> &'a str {
        self.namespace.as_deref().unwrap_or(component.namespace())
    }
}

/// Wait until a resource has at least `min_replicas` ready
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessCondition {
    pub resource: ResourceRef,

    #[serde(default = "default_min_replicas")]
    pub min_replicas: u32,

    /// Overrides the bundle wait timeout for this condition (`0s` waits forever)
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

fn default_min_replicas() -> u32 {
    1
}

/// Identifies a namespaced Kubernetes resource
///
/// `kind` is kept as configured and only checked when a wait needs it, so a bad kind
/// fails the step that uses it rather than the whole bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub name: String,

    #[serde(alias = "type")]
    pub kind: String,

    pub namespace: String,
}

impl ResourceRef {
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            namespace: namespace.into(),
        }
    }

    /// Kind and ready-count status field for a readiness wait
    pub fn readiness_target(&self) -> Result<(ResourceKind, &'static str)> {
        let unsupported = || CoreError::UnsupportedKind {
            kind: self.kind.clone(),
            operation: "readiness wait",
            supported: "deployment, daemonset, statefulset",
        };

        let kind: ResourceKind = self.kind.parse().map_err(|_| unsupported())?;
        let field = kind.ready_count_field().ok_or_else(unsupported)?;
        Ok((kind, field))
    }

    /// Kind for a completion wait (only pods have a phase)
    pub fn completion_target(&self) -> Result<ResourceKind> {
        match self.kind.parse::<ResourceKind>() {
            Ok(kind) if kind.has_phase() => Ok(kind),
            _ => Err(CoreError::UnsupportedKind {
                kind: self.kind.clone(),
                operation: "completion wait",
                supported: "pod",
            }),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// Resource kinds the poller knows how to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Deployment,
    DaemonSet,
    StatefulSet,
    Pod,
}

impl ResourceKind {
    /// Status field holding the ready count, if the kind has one
    pub fn ready_count_field(&self) -> Option<&'static str> {
        match self {
            ResourceKind::Deployment | ResourceKind::StatefulSet => Some("readyReplicas"),
            ResourceKind::DaemonSet => Some("numberReady"),
            ResourceKind::Pod => None,
        }
    }

    /// Whether the kind reports a lifecycle phase
    pub fn has_phase(&self) -> bool {
        matches!(self, ResourceKind::Pod)
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "deployment" | "deployments" | "deploy" => Ok(ResourceKind::Deployment),
            "daemonset" | "daemonsets" | "ds" => Ok(ResourceKind::DaemonSet),
            "statefulset" | "statefulsets" | "sts" => Ok(ResourceKind::StatefulSet),
            "pod" | "pods" | "po" => Ok(ResourceKind::Pod),
            _ => Err(CoreError::UnsupportedKind {
                kind: s.to_string(),
                operation: "cluster read",
                supported: "deployment, daemonset, statefulset, pod",
            }),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Deployment => "deployment",
            ResourceKind::DaemonSet => "daemonset",
            ResourceKind::StatefulSet => "statefulset",
            ResourceKind::Pod => "pod",
        };
        write!(f, "{}", s)
    }
}
