//! Install run report
//!
//! Component-scoped failures never stop a run; they are collected here together
//! with the final state of every component so the caller can print them and pick
//! an exit status.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::error::KubeError;

/// Which list of lifecycle resources a step belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecyclePhase {
    PreInstall,
    PostInstall,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecyclePhase::PreInstall => write!(f, "pre-install"),
            LifecyclePhase::PostInstall => write!(f, "post-install"),
        }
    }
}

/// Where a component is in its install
///
/// `Pending -> (Skipped | Installing) -> PreResources -> ChartInstalled -> PostResources -> Done`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentState {
    Pending,
    /// Release already present; chart install skipped
    Skipped,
    Installing,
    PreResources,
    ChartInstalled,
    PostResources,
    Done { success: bool },
}

impl ComponentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ComponentState::Done { .. })
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentState::Pending => write!(f, "pending"),
            ComponentState::Skipped => write!(f, "skipped"),
            ComponentState::Installing => write!(f, "installing"),
            ComponentState::PreResources => write!(f, "pre-resources"),
            ComponentState::ChartInstalled => write!(f, "chart-installed"),
            ComponentState::PostResources => write!(f, "post-resources"),
            ComponentState::Done { success: true } => write!(f, "done"),
            ComponentState::Done { success: false } => write!(f, "done (errors)"),
        }
    }
}

/// Classification of a recorded component error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentErrorKind {
    /// Unsupported resource kind for the requested wait
    Configuration,
    Timeout,
    /// Resource reached a failed terminal state
    ResourceFailed,
    /// Chart install failed under the `continue` policy
    ChartInstall,
}

/// One component-scoped failure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentError {
    pub release: String,
    /// `None` for chart install failures
    pub phase: Option<LifecyclePhase>,
    pub kind: ComponentErrorKind,
    pub message: String,
}

impl ComponentError {
    /// Record a component-scoped [`KubeError`] from a lifecycle step
    pub fn from_step(release: &str, phase: LifecyclePhase, error: &KubeError) -> Self {
        let kind = match error {
            KubeError::Timeout { .. } => ComponentErrorKind::Timeout,
            KubeError::ResourceFailed { .. } => ComponentErrorKind::ResourceFailed,
            _ => ComponentErrorKind::Configuration,
        };
        Self {
            release: release.to_string(),
            phase: Some(phase),
            kind,
            message: error.to_string(),
        }
    }

    /// Record a failed chart install
    pub fn chart_install(release: &str, error: &KubeError) -> Self {
        Self {
            release: release.to_string(),
            phase: None,
            kind: ComponentErrorKind::ChartInstall,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.phase {
            Some(phase) => write!(f, "{} ({}): {}", self.release, phase, self.message),
            None => write!(f, "{} (chart): {}", self.release, self.message),
        }
    }
}

/// Final result for one component
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentOutcome {
    pub release: String,
    pub state: ComponentState,
    /// Every state the component went through, in order
    pub history: Vec<ComponentState>,
    pub errors: Vec<ComponentError>,
}

impl ComponentOutcome {
    pub fn new(release: impl Into<String>) -> Self {
        Self {
            release: release.into(),
            state: ComponentState::Pending,
            history: vec![ComponentState::Pending],
            errors: Vec::new(),
        }
    }

    /// Move to `state`; terminal states are final
    pub fn advance(&mut self, state: ComponentState) {
        if self.state.is_terminal() {
            return;
        }
        self.state = state;
        self.history.push(state);
    }

    /// Move to `Done`, successful when no error was recorded
    pub fn finish(&mut self) {
        let success = self.errors.is_empty();
        self.advance(ComponentState::Done { success });
    }

    pub fn was_skipped(&self) -> bool {
        self.history.contains(&ComponentState::Skipped)
    }

    /// Whether this run installed the component's chart
    pub fn chart_installed(&self) -> bool {
        !self.was_skipped() && self.history.contains(&ComponentState::ChartInstalled)
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Outcome of an install run
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub components: Vec<ComponentOutcome>,
    /// Swallowed apply and remove failures
    pub warnings: Vec<String>,
}

impl InstallReport {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            components: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Stamp the finish time
    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
    }

    /// Every recorded component error, in run order
    pub fn errors(&self) -> Vec<&ComponentError> {
        self.components.iter().flat_map(|c| c.errors.iter()).collect()
    }

    pub fn is_success(&self) -> bool {
        self.components.iter().all(ComponentOutcome::is_success)
    }

    pub fn component(&self, release: &str) -> Option<&ComponentOutcome> {
        self.components.iter().find(|c| c.release == release)
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// One-line summary of the run
    pub fn summary(&self) -> String {
        let total = self.components.len();
        let installed = self.components.iter().filter(|c| c.chart_installed()).count();
        let skipped = self.components.iter().filter(|c| c.was_skipped()).count();
        let failed = self.components.iter().filter(|c| !c.is_success()).count();

        let mut summary = format!(
            "{} component{} processed ({} installed, {} already present)",
            total,
            if total == 1 { "" } else { "s" },
            installed,
            skipped
        );
        if failed > 0 {
            summary.push_str(&format!(", {} with errors", failed));
        }
        if !self.warnings.is_empty() {
            summary.push_str(&format!(", {} warning(s)", self.warnings.len()));
        }
        summary
    }
}

impl Default for InstallReport {
    fn default() -> Self {
        Self::new()
    }
}
