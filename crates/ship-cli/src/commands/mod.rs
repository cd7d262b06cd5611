//! CLI commands

use console::style;
use ship_core::Bundle;
use std::path::PathBuf;

use crate::error::Result;

pub mod components;
pub mod install;
pub mod uninstall;

/// Global options shared by every command
pub struct Context {
    pub config: Option<PathBuf>,
    pub kube_context: Option<String>,
}

impl Context {
    /// Find and load the bundle, reporting where it came from
    pub fn load_bundle(&self) -> Result<Bundle> {
        let (path, bundle) = Bundle::discover(self.config.as_deref())?;
        tracing::debug!(path = %path.display(), components = bundle.components.len(), "loaded bundle");
        eprintln!(
            "{} Using bundle {}",
            style("→").blue().bold(),
            style(path.display()).cyan()
        );
        Ok(bundle)
    }
}
