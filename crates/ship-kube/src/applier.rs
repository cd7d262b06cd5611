//! Resource applier adapter

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::process::{run, tool_path};

/// Creates and deletes the resources of a manifest file
#[async_trait]
pub trait ResourceApplier: Send + Sync {
    /// Create or update the resources in `manifest`
    async fn apply(&self, manifest: &Path, namespace: &str) -> Result<()>;

    /// Delete the resources in `manifest`
    async fn remove(&self, manifest: &Path, namespace: &str) -> Result<()>;
}

/// [`ResourceApplier`] backed by kubectl
#[derive(Debug, Clone)]
pub struct KubectlApplier {
    program: String,
    context: Option<String>,
}

impl KubectlApplier {
    pub fn new() -> Self {
        Self {
            program: tool_path("kubectl"),
            context: None,
        }
    }

    /// Target a kubeconfig context instead of the current one
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    fn args(&self, verb: &str, manifest: &Path, namespace: &str) -> Vec<String> {
        let mut args = vec![
            verb.to_string(),
            "-f".to_string(),
            manifest.display().to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
        ];
        if verb == "delete" {
            args.push("--ignore-not-found".to_string());
        }
        if let Some(context) = &self.context {
            args.push("--context".to_string());
            args.push(context.clone());
        }
        args
    }
}

impl Default for KubectlApplier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceApplier for KubectlApplier {
    async fn apply(&self, manifest: &Path, namespace: &str) -> Result<()> {
        run(&self.program, &self.args("apply", manifest, namespace)).await?;
        Ok(())
    }

    async fn remove(&self, manifest: &Path, namespace: &str) -> Result<()> {
        run(&self.program, &self.args("delete", manifest, namespace)).await?;
        Ok(())
    }
}
