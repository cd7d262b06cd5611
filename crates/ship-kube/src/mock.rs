//! In-memory adapters for testing
//!
//! These adapters record every call in a [`CallLog`] instead of talking to a
//! cluster. Sharing one log between the three mocks gives the exact call sequence
//! an install run produced, which is what most orchestrator tests assert on.

use async_trait::async_trait;
use serde_json::Value;
use ship_core::{ChartSpec, ResourceKind, resolve_overrides};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::applier::ResourceApplier;
use crate::cluster::ClusterReader;
use crate::error::{KubeError, Result};
use crate::helm::ChartInstaller;
use crate::poller::SUCCEEDED_PHASE;

/// Ready count reported for unscripted resources by [`MockClusterReader::ready`]
const ALWAYS_READY_COUNT: u32 = 1000;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One adapter call observed by a mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    ListReleases,
    AddRepository { name: String, url: String },
    Install { release: String, overrides: Vec<String> },
    Uninstall { release: String, namespace: String },
    Apply { manifest: String, namespace: String },
    Remove { manifest: String, namespace: String },
    ReadStatus { kind: ResourceKind, name: String, field: String },
}

impl fmt::Display for RecordedCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordedCall::ListReleases => write!(f, "list_releases"),
            RecordedCall::AddRepository { name, .. } => write!(f, "add_repository({})", name),
            RecordedCall::Install { release, .. } => write!(f, "install({})", release),
            RecordedCall::Uninstall { release, .. } => write!(f, "uninstall({})", release),
            RecordedCall::Apply { manifest, .. } => write!(f, "apply({})", manifest),
            RecordedCall::Remove { manifest, .. } => write!(f, "remove({})", manifest),
            RecordedCall::ReadStatus { kind, name, field } => {
                write!(f, "read({} {}.{})", kind, name, field)
            }
        }
    }
}

/// Ordered record of adapter calls, shareable between mocks
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<RecordedCall>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: RecordedCall) {
        lock(&self.0).push(call);
    }

    /// All calls so far, oldest first
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.0).clone()
    }

    /// Calls rendered one per line, for snapshots
    pub fn render(&self) -> String {
        lock(&self.0)
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Calls other than status reads
    pub fn mutations(&self) -> Vec<RecordedCall> {
        lock(&self.0)
            .iter()
            .filter(|c| !matches!(c, RecordedCall::ReadStatus { .. }))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.0).clear();
    }
}

fn mock_failure(program: &str, args: String) -> KubeError {
    KubeError::CommandFailed {
        program: program.to_string(),
        args,
        output: "mock failure".to_string(),
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

/// In-memory chart installer
#[derive(Clone, Default)]
pub struct MockChartInstaller {
    log: CallLog,
    installed: Arc<Mutex<BTreeSet<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    fail_list: Arc<Mutex<bool>>,
}

impl MockChartInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record calls in a shared log
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    /// Start with releases already present in the cluster
    pub fn with_installed<I, S>(self, releases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.installed).extend(releases.into_iter().map(Into::into));
        self
    }

    /// Make `install` fail for a release
    pub fn fail_install(&self, release: &str) {
        lock(&self.failing).insert(release.to_string());
    }

    /// Make `list_release_names` fail
    pub fn fail_list(&self) {
        *lock(&self.fail_list) = true;
    }

    /// Releases currently installed
    pub fn installed(&self) -> BTreeSet<String> {
        lock(&self.installed).clone()
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }
}

#[async_trait]
impl ChartInstaller for MockChartInstaller {
    async fn list_release_names(&self) -> Result<BTreeSet<String>> {
        self.log.record(RecordedCall::ListReleases);
        if *lock(&self.fail_list) {
            return Err(mock_failure("helm", "list --all-namespaces --short".to_string()));
        }
        Ok(self.installed())
    }

    async fn install(&self, chart: &ChartSpec, domain: &str) -> Result<()> {
        self.log.record(RecordedCall::Install {
            release: chart.release_name.clone(),
            overrides: resolve_overrides(chart, domain),
        });
        if lock(&self.failing).contains(&chart.release_name) {
            return Err(mock_failure("helm", format!("install {}", chart.release_name)));
        }
        lock(&self.installed).insert(chart.release_name.clone());
        Ok(())
    }

    async fn uninstall(&self, release: &str, namespace: &str) -> Result<()> {
        self.log.record(RecordedCall::Uninstall {
            release: release.to_string(),
            namespace: namespace.to_string(),
        });
        lock(&self.installed).remove(release);
        Ok(())
    }

    async fn add_repository(&self, name: &str, url: &str) -> Result<()> {
        self.log.record(RecordedCall::AddRepository {
            name: name.to_string(),
            url: url.to_string(),
        });
        Ok(())
    }
}

/// In-memory resource applier
#[derive(Clone, Default)]
pub struct MockResourceApplier {
    log: CallLog,
    failing_apply: Arc<Mutex<HashSet<String>>>,
    failing_remove: Arc<Mutex<HashSet<String>>>,
}

impl MockResourceApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record calls in a shared log
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    /// Make `apply` fail for a manifest path
    pub fn fail_apply(&self, manifest: &str) {
        lock(&self.failing_apply).insert(manifest.to_string());
    }

    /// Make `remove` fail for a manifest path
    pub fn fail_remove(&self, manifest: &str) {
        lock(&self.failing_remove).insert(manifest.to_string());
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }
}

#[async_trait]
impl ResourceApplier for MockResourceApplier {
    async fn apply(&self, manifest: &Path, namespace: &str) -> Result<()> {
        let manifest = display_path(manifest);
        self.log.record(RecordedCall::Apply {
            manifest: manifest.clone(),
            namespace: namespace.to_string(),
        });
        if lock(&self.failing_apply).contains(&manifest) {
            return Err(mock_failure("kubectl", format!("apply -f {}", manifest)));
        }
        Ok(())
    }

    async fn remove(&self, manifest: &Path, namespace: &str) -> Result<()> {
        let manifest = display_path(manifest);
        self.log.record(RecordedCall::Remove {
            manifest: manifest.clone(),
            namespace: namespace.to_string(),
        });
        if lock(&self.failing_remove).contains(&manifest) {
            return Err(mock_failure("kubectl", format!("delete -f {}", manifest)));
        }
        Ok(())
    }
}

/// Scripted cluster status reader
///
/// Each scripted resource answers its reads from a queue; once only one value is
/// left it keeps answering with it. Unscripted resources are absent, unless the
/// reader was built with [`MockClusterReader::ready`].
#[derive(Clone, Default)]
pub struct MockClusterReader {
    log: CallLog,
    scripts: Arc<Mutex<HashMap<(ResourceKind, String), VecDeque<Option<Value>>>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    all_ready: bool,
}

impl MockClusterReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reader where every unscripted resource is ready or succeeded on first read
    pub fn ready() -> Self {
        Self {
            all_ready: true,
            ..Self::default()
        }
    }

    /// Record calls in a shared log
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    /// Queue status values for a resource
    pub fn script(&self, kind: ResourceKind, name: &str, values: Vec<Option<Value>>) {
        lock(&self.scripts).insert((kind, name.to_string()), values.into());
    }

    /// Make every read of `name` fail
    pub fn fail_reads(&self, name: &str) {
        lock(&self.failing).insert(name.to_string());
    }

    /// Number of status reads of `name`
    pub fn reads_of(&self, name: &str) -> usize {
        self.log
            .calls()
            .iter()
            .filter(|c| matches!(c, RecordedCall::ReadStatus { name: n, .. } if n == name))
            .count()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.log.calls()
    }

    fn next_value(&self, kind: ResourceKind, name: &str, field: &str) -> Option<Value> {
        let mut scripts = lock(&self.scripts);
        match scripts.get_mut(&(kind, name.to_string())) {
            Some(queue) if queue.len() > 1 => queue.pop_front().flatten(),
            Some(queue) => queue.front().cloned().flatten(),
            None if self.all_ready && field == "phase" => Some(Value::from(SUCCEEDED_PHASE)),
            None if self.all_ready => Some(Value::from(ALWAYS_READY_COUNT)),
            None => None,
        }
    }
}

#[async_trait]
impl ClusterReader for MockClusterReader {
    async fn status_field(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
        field: &str,
    ) -> Result<Option<Value>> {
        self.log.record(RecordedCall::ReadStatus {
            kind,
            name: name.to_string(),
            field: field.to_string(),
        });
        if lock(&self.failing).contains(name) {
            return Err(KubeError::ClusterRead {
                resource: format!("{} {}/{}", kind, namespace, name),
                message: "connection refused".to_string(),
            });
        }
        Ok(self.next_value(kind, name, field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_script_repeats_last_value() {
        let reader = MockClusterReader::new();
        reader.script(ResourceKind::Deployment, "x", vec![None, Some(json!(1))]);

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(
                reader
                    .status_field(ResourceKind::Deployment, "x", "ns", "readyReplicas")
                    .await
                    .unwrap(),
            );
        }

        assert_eq!(seen, vec![None, Some(json!(1)), Some(json!(1))]);
        assert_eq!(reader.reads_of("x"), 3);
    }

    #[tokio::test]
    async fn test_ready_reader_defaults() {
        let reader = MockClusterReader::ready();
        let phase = reader
            .status_field(ResourceKind::Pod, "p", "ns", "phase")
            .await
            .unwrap();
        assert_eq!(phase, Some(json!("Succeeded")));

        let unscripted = MockClusterReader::new()
            .status_field(ResourceKind::Pod, "p", "ns", "phase")
            .await
            .unwrap();
        assert_eq!(unscripted, None);
    }

    #[tokio::test]
    async fn test_shared_log_orders_calls() {
        let log = CallLog::new();
        let charts = MockChartInstaller::new().with_log(log.clone());
        let applier = MockResourceApplier::new().with_log(log.clone());

        charts.list_release_names().await.unwrap();
        applier.apply(Path::new("m.yaml"), "infra").await.unwrap();
        applier.remove(Path::new("m.yaml"), "infra").await.unwrap();

        assert_eq!(log.render(), "list_releases\napply(m.yaml)\nremove(m.yaml)");
    }

    #[tokio::test]
    async fn test_failed_install_leaves_release_absent() {
        let charts = MockChartInstaller::new();
        charts.fail_install("kong");
        let chart = ChartSpec {
            path: "stable/kong".to_string(),
            namespace: "infra".to_string(),
            release_name: "kong".to_string(),
            overrides: vec![],
            values_path: None,
        };

        assert!(charts.install(&chart, "ship.local").await.is_err());
        assert!(charts.installed().is_empty());
        assert_eq!(charts.log().calls().len(), 1);
    }
}
