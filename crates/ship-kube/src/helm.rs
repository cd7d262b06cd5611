//! Chart installer adapter
//!
//! The orchestrator only sequences chart operations; [`ChartInstaller`] is the
//! boundary, and [`HelmCli`] drives the `helm` binary behind it.

use async_trait::async_trait;
use ship_core::{ChartSpec, resolve_overrides};
use std::collections::BTreeSet;

use crate::error::Result;
use crate::process::{run, tool_path};

/// Installs and removes chart releases
///
/// `install` is not expected to be idempotent; callers check
/// [`list_release_names`](ChartInstaller::list_release_names) first.
#[async_trait]
pub trait ChartInstaller: Send + Sync {
    /// Names of every release currently installed, across namespaces
    async fn list_release_names(&self) -> Result<BTreeSet<String>>;

    /// Install `chart` with `${domain}` substituted into its overrides
    async fn install(&self, chart: &ChartSpec, domain: &str) -> Result<()>;

    /// Remove a release
    async fn uninstall(&self, release: &str, namespace: &str) -> Result<()>;

    /// Register a chart repository
    async fn add_repository(&self, name: &str, url: &str) -> Result<()>;
}

/// [`ChartInstaller`] backed by the helm v3 CLI
#[derive(Debug, Clone)]
pub struct HelmCli {
    program: String,
    kube_context: Option<String>,
}

impl HelmCli {
    pub fn new() -> Self {
        Self {
            program: tool_path("helm"),
            kube_context: None,
        }
    }

    /// Target a kubeconfig context instead of the current one
    pub fn with_kube_context(mut self, context: Option<String>) -> Self {
        self.kube_context = context;
        self
    }

    /// Check that helm can be run, returning its version
    pub async fn verify(&self) -> Result<String> {
        let output = run(&self.program, &["version".to_string(), "--short".to_string()]).await?;
        let version = output.trim().to_string();
        tracing::info!(%version, "found helm");
        Ok(version)
    }

    async fn helm(&self, mut args: Vec<String>) -> Result<String> {
        if let Some(context) = &self.kube_context {
            args.push("--kube-context".to_string());
            args.push(context.clone());
        }
        run(&self.program, &args).await
    }
}

impl Default for HelmCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChartInstaller for HelmCli {
    async fn list_release_names(&self) -> Result<BTreeSet<String>> {
        let output = self.helm(list_args()).await?;
        Ok(parse_release_list(&output))
    }

    async fn install(&self, chart: &ChartSpec, domain: &str) -> Result<()> {
        self.helm(install_args(chart, domain)).await?;
        Ok(())
    }

    async fn uninstall(&self, release: &str, namespace: &str) -> Result<()> {
        self.helm(vec![
            "uninstall".to_string(),
            release.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
        ])
        .await?;
        Ok(())
    }

    async fn add_repository(&self, name: &str, url: &str) -> Result<()> {
        self.helm(vec![
            "repo".to_string(),
            "add".to_string(),
            name.to_string(),
            url.to_string(),
        ])
        .await?;
        Ok(())
    }
}

/// Arguments for `helm install`
pub fn install_args(chart: &ChartSpec, domain: &str) -> Vec<String> {
    let mut args = vec![
        "install".to_string(),
        chart.release_name.clone(),
        chart.path.clone(),
        "--namespace".to_string(),
        chart.namespace.clone(),
        "--create-namespace".to_string(),
    ];

    for value in resolve_overrides(chart, domain) {
        args.push("--set".to_string());
        args.push(value);
    }

    if let Some(values) = &chart.values_path {
        args.push("--values".to_string());
        args.push(values.display().to_string());
    }

    args
}

/// Arguments listing every release name in the cluster
///
/// Includes pending and failed releases and lifts helm's default result cap.
pub fn list_args() -> Vec<String> {
    ["list", "--all-namespaces", "--all", "--max", "0", "--short"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Release names from `helm list --short` output, one per line
pub fn parse_release_list(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .map(|line| line.trim().trim_matches('"'))
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
