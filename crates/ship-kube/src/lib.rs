//! SHIP Kube - Kubernetes integration for SHIP
//!
//! This crate provides:
//! - **Resource Poller**: Wait for readiness thresholds and pod completion, with timeouts
//! - **Chart Installer**: `helm` adapter behind the [`ChartInstaller`] trait
//! - **Resource Applier**: `kubectl` adapter behind the [`ResourceApplier`] trait
//! - **Cluster Reader**: kube-rs status reads behind the [`ClusterReader`] trait
//! - **Installer**: The component install orchestrator and its report
//! - **Progress Reporting**: Console feedback while a bundle is installed
//! - **Mocks**: In-memory adapters for tests without a cluster

pub mod applier;
pub mod cluster;
pub mod error;
pub mod helm;
pub mod installer;
pub mod mock;
pub mod poller;
mod process;
pub mod progress;
pub mod report;

pub use applier::{KubectlApplier, ResourceApplier};
pub use cluster::{ClusterReader, KubeStatusReader};
pub use error::{KubeError, Result};
pub use helm::{ChartInstaller, HelmCli};
pub use installer::{InstallOptions, Installer, PlannedStep, plan, removal_order, uninstall};
pub use mock::{CallLog, MockChartInstaller, MockClusterReader, MockResourceApplier, RecordedCall};
pub use poller::{CancelHandle, CancelSignal, PollConfig, ResourcePoller};
pub use progress::ProgressReporter;
pub use report::{
    ComponentError, ComponentErrorKind, ComponentOutcome, ComponentState, InstallReport, LifecyclePhase,
};
