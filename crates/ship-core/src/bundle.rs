//! Bundle configuration: the ordered component list and install settings
//!
//! Stored as YAML (`ship.yaml`). The component order is the dependency order: it is
//! preserved exactly as authored and never re-sorted.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::component::Component;
use crate::error::{CoreError, Result};
use crate::values::validate_override;

/// Default bundle file name looked up in the working directory
pub const BUNDLE_FILE_NAME: &str = "ship.yaml";

/// Bundle file looked up in the home directory
pub const HOME_BUNDLE_FILE_NAME: &str = ".ship.yaml";

/// Bundle configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Install settings
    #[serde(default)]
    pub settings: BundleSettings,

    /// Chart repositories registered before installing
    #[serde(default)]
    pub repositories: Vec<ChartRepository>,

    /// Components in install order
    #[serde(default)]
    pub components: Vec<Component>,
}

fn default_api_version() -> String {
    "ship.sprinthive.com/v1".to_string()
}

impl Bundle {
    /// Parse and validate a bundle from YAML
    pub fn from_yaml(content: &str) -> Result<Self> {
        let bundle: Self = serde_yaml::from_str(content)?;
        bundle.validate()?;
        Ok(bundle)
    }

    /// Load a bundle from a file
    ///
    /// Relative manifest and values paths are resolved against the bundle's directory.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::BundleRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut bundle = Self::from_yaml(&content)?;

        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            bundle.resolve_paths(base);
        }

        Ok(bundle)
    }

    /// Find and load the bundle
    ///
    /// An explicit path is used as-is. Otherwise `./ship.yaml` then `~/.ship.yaml`.
    pub fn discover(explicit: Option<&Path>) -> Result<(PathBuf, Self)> {
        if let Some(path) = explicit {
            return Ok((path.to_path_buf(), Self::load_from(path)?));
        }

        let candidates = Self::default_paths();
        match candidates.iter().find(|p| p.is_file()) {
            Some(path) => Ok((path.clone(), Self::load_from(path)?)),
            None => Err(CoreError::BundleNotFound {
                searched: candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    /// Default lookup locations, in priority order
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(BUNDLE_FILE_NAME)];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(HOME_BUNDLE_FILE_NAME));
        }
        paths
    }

    /// Validate the bundle
    pub fn validate(&self) -> Result<()> {
        let mut releases = HashSet::new();

        for component in &self.components {
            let chart = &component.chart;
            let release = chart.release_name.as_str();

            if release.trim().is_empty() {
                return Err(invalid(format!(
                    "chart '{}' has an empty release name",
                    chart.path
                )));
            }
            if !releases.insert(release) {
                return Err(CoreError::DuplicateRelease {
                    release: release.to_string(),
                });
            }
            if chart.path.trim().is_empty() {
                return Err(invalid(format!("release '{}' has an empty chart path", release)));
            }
            if chart.namespace.trim().is_empty() {
                return Err(invalid(format!("release '{}' has an empty namespace", release)));
            }
            for value in &chart.overrides {
                validate_override(release, value)?;
            }

            for resource in component.pre_install.iter().chain(&component.post_install) {
                if resource.manifest_path.as_os_str().is_empty() {
                    return Err(invalid(format!(
                        "release '{}' has a lifecycle resource without manifestPath",
                        release
                    )));
                }
                if let Some(condition) = &resource.precondition
                    && condition.min_replicas == 0
                {
                    return Err(invalid(format!(
                        "precondition on {} in release '{}' must require at least 1 replica",
                        condition.resource, release
                    )));
                }
            }
        }

        let mut repositories = HashSet::new();
        for repo in &self.repositories {
            if !repositories.insert(repo.name.as_str()) {
                return Err(invalid(format!("repository '{}' is listed twice", repo.name)));
            }
        }

        Ok(())
    }

    /// Get a component by release name
    pub fn get(&self, release: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.release_name() == release)
    }

    /// Release names in install order
    pub fn release_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.release_name()).collect()
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };

        for component in &mut self.components {
            if let Some(values) = component.chart.values_path.as_mut() {
                resolve(values);
            }
            for resource in component
                .pre_install
                .iter_mut()
                .chain(component.post_install.iter_mut())
            {
                resolve(&mut resource.manifest_path);
            }
        }
    }
}

fn invalid(message: String) -> CoreError {
    CoreError::InvalidBundle { message }
}

/// Install settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleSettings {
    /// Interval between status reads while waiting
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Default limit for each wait (`0s` waits forever)
    #[serde(default = "default_wait_timeout", with = "humantime_serde")]
    pub wait_timeout: Duration,

    /// What to do when a chart fails to install
    #[serde(default)]
    pub chart_failure: ChartFailurePolicy,
}

impl Default for BundleSettings {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            wait_timeout: default_wait_timeout(),
            chart_failure: ChartFailurePolicy::default(),
        }
    }
}

impl BundleSettings {
    /// Wait timeout, `None` when waits are unbounded
    pub fn wait_timeout(&self) -> Option<Duration> {
        (!self.wait_timeout.is_zero()).then_some(self.wait_timeout)
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_wait_timeout() -> Duration {
    Duration::from_secs(600)
}

/// What happens to the run when a chart install fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartFailurePolicy {
    /// Stop the whole run immediately
    #[default]
    Abort,

    /// Record the failure against the component and move on to the next one
    Continue,
}

impl FromStr for ChartFailurePolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "abort" => Ok(Self::Abort),
            "continue" => Ok(Self::Continue),
            other => Err(invalid(format!(
                "unknown chart failure policy '{}' (expected abort or continue)",
                other
            ))),
        }
    }
}

impl fmt::Display for ChartFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Continue => write!(f, "continue"),
        }
    }
}

/// Chart repository registered with the chart installer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartRepository {
    pub name: String,
    pub url: String,
}
