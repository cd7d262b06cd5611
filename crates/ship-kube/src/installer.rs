//! Component install orchestrator
//!
//! Components are installed strictly in the order given. For each one:
//!
//! 1. pre-install resources: wait for the precondition, apply the manifest, wait
//!    for completion, then remove every non-persistent resource of the phase
//! 2. the chart, unless its release was already installed when the run started
//! 3. post-install resources, handled like the pre-install ones
//!
//! Unsupported kinds, timeouts and failed pods are recorded against the component
//! and the run moves on. Apply and remove failures only produce warnings. Cluster
//! read failures, cancellation and (under the abort policy) chart install failures
//! stop the run.

use ship_core::{ChartFailurePolicy, ChartRepository, Component, LifecycleResource, ResourceRef, resolve_overrides};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use crate::applier::ResourceApplier;
use crate::cluster::ClusterReader;
use crate::error::{KubeError, Result};
use crate::helm::ChartInstaller;
use crate::poller::{CancelSignal, PollConfig, ResourcePoller};
use crate::progress::ProgressReporter;
use crate::report::{ComponentError, ComponentOutcome, ComponentState, InstallReport, LifecyclePhase};

/// Options for an install run
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Substituted for `${domain}` in chart overrides
    pub domain: String,
    pub chart_failure: ChartFailurePolicy,
    pub poll: PollConfig,
}

impl InstallOptions {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            chart_failure: ChartFailurePolicy::default(),
            poll: PollConfig::default(),
        }
    }
}

/// One step an install run would perform
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedStep {
    InstallChart {
        release: String,
        chart: String,
        namespace: String,
        overrides: Vec<String>,
    },
    SkipChart {
        release: String,
    },
    WaitReady {
        release: String,
        phase: LifecyclePhase,
        resource: ResourceRef,
        min_replicas: u32,
    },
    Apply {
        release: String,
        phase: LifecyclePhase,
        manifest: PathBuf,
        namespace: String,
    },
    WaitCompleted {
        release: String,
        phase: LifecyclePhase,
        resource: ResourceRef,
    },
    Remove {
        release: String,
        phase: LifecyclePhase,
        manifest: PathBuf,
        namespace: String,
    },
}

impl fmt::Display for PlannedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannedStep::InstallChart {
                release,
                chart,
                namespace,
                overrides,
            } => {
                write!(f, "[{}] install chart {} into {}", release, chart, namespace)?;
                for value in overrides {
                    write!(f, " --set {}", value)?;
                }
                Ok(())
            }
            PlannedStep::SkipChart { release } => {
                write!(f, "[{}] skip chart (release already installed)", release)
            }
            PlannedStep::WaitReady {
                release,
                phase,
                resource,
                min_replicas,
            } => write!(
                f,
                "[{}] {}: wait for {} ({} ready)",
                release, phase, resource, min_replicas
            ),
            PlannedStep::Apply {
                release,
                phase,
                manifest,
                namespace,
            } => write!(
                f,
                "[{}] {}: apply {} in {}",
                release,
                phase,
                manifest.display(),
                namespace
            ),
            PlannedStep::WaitCompleted {
                release,
                phase,
                resource,
            } => write!(f, "[{}] {}: wait for {} to complete", release, phase, resource),
            PlannedStep::Remove {
                release,
                phase,
                manifest,
                namespace,
            } => write!(
                f,
                "[{}] {}: remove {} from {}",
                release,
                phase,
                manifest.display(),
                namespace
            ),
        }
    }
}

/// Installs an ordered list of components
///
/// Holds no component catalog of its own: the components, the two adapters and
/// the cluster reader are all supplied by the caller.
pub struct Installer<C, A, R> {
    charts: C,
    applier: A,
    poller: ResourcePoller<R>,
    options: InstallOptions,
    progress: ProgressReporter,
    cancel: Option<CancelSignal>,
}

impl<C, A, R> Installer<C, A, R>
where
    C: ChartInstaller,
    A: ResourceApplier,
    R: ClusterReader,
{
    /// Create an installer that prints nothing
    pub fn new(charts: C, applier: A, reader: R, options: InstallOptions) -> Self {
        let poller = ResourcePoller::new(reader, options.poll);
        Self {
            charts,
            applier,
            poller,
            options,
            progress: ProgressReporter::hidden(),
            cancel: None,
        }
    }

    /// Report progress to the console
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Stop the run when `signal` is cancelled
    ///
    /// Checked before every component, chart install and apply, and while waiting.
    pub fn with_cancel(mut self, signal: CancelSignal) -> Self {
        self.poller = self.poller.with_cancel(signal.clone());
        self.cancel = Some(signal);
        self
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(signal) if signal.is_cancelled() => Err(KubeError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Register chart repositories, in order
    pub async fn add_repositories(&self, repositories: &[ChartRepository]) -> Result<()> {
        for repo in repositories {
            self.progress
                .step(&format!("Adding chart repository {} ({})", repo.name, repo.url));
            self.charts.add_repository(&repo.name, &repo.url).await?;
        }
        Ok(())
    }

    /// Install `components` in order
    ///
    /// Returns `Err` only for errors that stop the run; component-scoped failures
    /// are in the report.
    pub async fn install(&self, components: &[Component]) -> Result<InstallReport> {
        let mut report = InstallReport::new();

        let installed = self.charts.list_release_names().await?;
        tracing::info!(count = installed.len(), "listed installed releases");

        for (index, component) in components.iter().enumerate() {
            self.check_cancelled()?;
            self.progress
                .component_start(index, components.len(), component.release_name());

            let outcome = self
                .install_component(component, &installed, &mut report.warnings)
                .await?;

            tracing::info!(
                release = %outcome.release,
                state = %outcome.state,
                errors = outcome.errors.len(),
                "component finished"
            );
            report.components.push(outcome);
        }

        report.finish();
        Ok(report)
    }

    async fn install_component(
        &self,
        component: &Component,
        installed: &BTreeSet<String>,
        warnings: &mut Vec<String>,
    ) -> Result<ComponentOutcome> {
        let release = component.release_name();
        let mut outcome = ComponentOutcome::new(release);
        let skip_chart = installed.contains(release);

        outcome.advance(if skip_chart {
            ComponentState::Skipped
        } else {
            ComponentState::Installing
        });

        outcome.advance(ComponentState::PreResources);
        self.run_phase(component, LifecyclePhase::PreInstall, &component.pre_install, &mut outcome, warnings)
            .await?;

        if skip_chart {
            tracing::info!(release, "release already installed, skipping chart");
            self.progress.chart_skipped(release);
        } else {
            self.check_cancelled()?;
            self.progress.chart_installing(release, &component.chart.path);

            if let Err(source) = self.charts.install(&component.chart, &self.options.domain).await {
                match self.options.chart_failure {
                    ChartFailurePolicy::Abort => {
                        return Err(KubeError::ChartInstallFailed {
                            release: release.to_string(),
                            source: Box::new(source),
                        });
                    }
                    ChartFailurePolicy::Continue => {
                        tracing::warn!(release, error = %source, "chart install failed, continuing");
                        let error = ComponentError::chart_install(release, &source);
                        self.progress.error(&error.to_string());
                        outcome.errors.push(error);
                        outcome.finish();
                        return Ok(outcome);
                    }
                }
            }

            self.progress.success(&format!("Installed {}", release));
        }

        outcome.advance(ComponentState::ChartInstalled);
        outcome.advance(ComponentState::PostResources);
        self.run_phase(component, LifecyclePhase::PostInstall, &component.post_install, &mut outcome, warnings)
            .await?;

        outcome.finish();
        Ok(outcome)
    }

    /// Run one list of lifecycle resources, then clean up the phase
    async fn run_phase<'c>(
        &self,
        component: &'c Component,
        phase: LifecyclePhase,
        resources: &'c [LifecycleResource],
        outcome: &mut ComponentOutcome,
        warnings: &mut Vec<String>,
    ) -> Result<()> {
        let release = component.release_name();
        let mut applied: Vec<&'c LifecycleResource> = Vec::new();

        for resource in resources {
            let namespace = resource.target_namespace(component);
            let manifest = resource.manifest_path.display();

            if let Some(condition) = &resource.precondition {
                let spinner = self.progress.wait(format!(
                    "Waiting for {} ({} ready)",
                    condition.resource, condition.min_replicas
                ));
                let waited = self
                    .poller
                    .wait_ready(&condition.resource, condition.min_replicas, condition.timeout)
                    .await;
                drop(spinner);

                if let Err(e) = waited {
                    self.record(outcome, phase, e)?;
                    continue;
                }
            }

            self.check_cancelled()?;
            self.progress.step(&format!("Applying {}", manifest));
            applied.push(resource);
            if let Err(e) = self.applier.apply(&resource.manifest_path, namespace).await {
                tracing::warn!(release, %manifest, error = %e, "apply failed");
                let warning = format!("{}: failed to apply {}: {}", release, manifest, e);
                self.progress.warn(&warning);
                warnings.push(warning);
            }

            if let Some(target) = &resource.wait_for_completion {
                let spinner = self.progress.wait(format!("Waiting for {} to complete", target));
                let waited = self
                    .poller
                    .wait_completed(target, resource.completion_timeout)
                    .await;
                drop(spinner);

                if let Err(e) = waited {
                    self.record(outcome, phase, e)?;
                }
            }
        }

        for resource in applied.into_iter().filter(|r| !r.persist_after_wait) {
            let namespace = resource.target_namespace(component);
            let manifest = resource.manifest_path.display();

            tracing::debug!(release, %manifest, "removing non-persistent resource");
            if let Err(e) = self.applier.remove(&resource.manifest_path, namespace).await {
                tracing::warn!(release, %manifest, error = %e, "remove failed");
                let warning = format!("{}: failed to remove {}: {}", release, manifest, e);
                self.progress.warn(&warning);
                warnings.push(warning);
            }
        }

        Ok(())
    }

    /// Record a component-scoped wait error, or hand back a fatal one
    fn record(&self, outcome: &mut ComponentOutcome, phase: LifecyclePhase, error: KubeError) -> Result<()> {
        if !error.is_component_scoped() {
            return Err(error);
        }
        tracing::warn!(release = %outcome.release, %phase, error = %error, "lifecycle step failed");
        let error = ComponentError::from_step(&outcome.release, phase, &error);
        self.progress.error(&error.to_string());
        outcome.errors.push(error);
        Ok(())
    }
}

/// Uninstall every configured release that is present, last component first
///
/// Only the chart installer is involved. Returns the removed release names, in
/// removal order.
pub async fn uninstall<C: ChartInstaller>(
    charts: &C,
    components: &[Component],
    progress: &ProgressReporter,
) -> Result<Vec<String>> {
    let installed = charts.list_release_names().await?;
    let mut removed = Vec::new();

    for component in removal_order(components, &installed) {
        let release = component.release_name();
        progress.step(&format!("Removing release {}", release));
        charts.uninstall(release, component.namespace()).await?;
        tracing::info!(release, "release removed");
        removed.push(release.to_string());
    }

    Ok(removed)
}

/// Steps an install run would perform, given the releases already installed
///
/// Mirrors [`Installer::install`] step for step without touching the cluster.
pub fn plan(components: &[Component], installed: &BTreeSet<String>, domain: &str) -> Vec<PlannedStep> {
    let mut steps = Vec::new();

    for component in components {
        let release = component.release_name();

        plan_phase(&mut steps, component, LifecyclePhase::PreInstall, &component.pre_install);

        if installed.contains(release) {
            steps.push(PlannedStep::SkipChart {
                release: release.to_string(),
            });
        } else {
            steps.push(PlannedStep::InstallChart {
                release: release.to_string(),
                chart: component.chart.path.clone(),
                namespace: component.namespace().to_string(),
                overrides: resolve_overrides(&component.chart, domain),
            });
        }

        plan_phase(&mut steps, component, LifecyclePhase::PostInstall, &component.post_install);
    }

    steps
}

/// Installed components in the order they would be uninstalled
pub fn removal_order<'a>(components: &'a [Component], installed: &BTreeSet<String>) -> Vec<&'a Component> {
    components
        .iter()
        .rev()
        .filter(|c| installed.contains(c.release_name()))
        .collect()
}

fn plan_phase(
    steps: &mut Vec<PlannedStep>,
    component: &Component,
    phase: LifecyclePhase,
    resources: &[LifecycleResource],
) {
    let release = component.release_name().to_string();

    for resource in resources {
        if let Some(condition) = &resource.precondition {
            steps.push(PlannedStep::WaitReady {
                release: release.clone(),
                phase,
                resource: condition.resource.clone(),
                min_replicas: condition.min_replicas,
            });
        }
        steps.push(PlannedStep::Apply {
            release: release.clone(),
            phase,
            manifest: resource.manifest_path.clone(),
            namespace: resource.target_namespace(component).to_string(),
        });
        if let Some(target) = &resource.wait_for_completion {
            steps.push(PlannedStep::WaitCompleted {
                release: release.clone(),
                phase,
                resource: target.clone(),
            });
        }
    }

    for resource in resources.iter().filter(|r| !r.persist_after_wait) {
        steps.push(PlannedStep::Remove {
            release: release.clone(),
            phase,
            manifest: resource.manifest_path.clone(),
            namespace: resource.target_namespace(component).to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{CallLog, MockChartInstaller, MockClusterReader, MockResourceApplier, RecordedCall};
    use crate::report::ComponentErrorKind;
    use serde_json::json;
    use ship_core::{ChartSpec, ReadinessCondition, ResourceKind};
    use std::time::Duration;

    type MockInstaller = Installer<MockChartInstaller, MockResourceApplier, MockClusterReader>;

    fn chart(release: &str) -> ChartSpec {
        ChartSpec {
            path: format!("sprinthive-dev-charts/{}", release),
            namespace: "infra".to_string(),
            release_name: release.to_string(),
            overrides: vec![],
            values_path: None,
        }
    }

    fn component(release: &str) -> Component {
        Component {
            chart: chart(release),
            pre_install: vec![],
            post_install: vec![],
        }
    }

    fn resource(manifest: &str, persist: bool) -> LifecycleResource {
        LifecycleResource {
            precondition: None,
            manifest_path: PathBuf::from(manifest),
            wait_for_completion: None,
            completion_timeout: None,
            persist_after_wait: persist,
            namespace: None,
        }
    }

    fn ready(kind: &str, name: &str, min_replicas: u32) -> ReadinessCondition {
        ReadinessCondition {
            resource: ResourceRef::new(kind, name, "infra"),
            min_replicas,
            timeout: None,
        }
    }

    fn fast() -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(1),
            timeout: Some(Duration::from_millis(50)),
        }
    }

    struct Harness {
        log: CallLog,
        charts: MockChartInstaller,
        applier: MockResourceApplier,
        reader: MockClusterReader,
    }

    impl Harness {
        fn new(reader: MockClusterReader) -> Self {
            let log = CallLog::new();
            Self {
                charts: MockChartInstaller::new().with_log(log.clone()),
                applier: MockResourceApplier::new().with_log(log.clone()),
                reader: reader.with_log(log.clone()),
                log,
            }
        }

        fn ready() -> Self {
            Self::new(MockClusterReader::ready())
        }

        fn installer(&self, options: InstallOptions) -> MockInstaller {
            Installer::new(
                self.charts.clone(),
                self.applier.clone(),
                self.reader.clone(),
                InstallOptions { poll: fast(), ..options },
            )
        }

        fn default_installer(&self) -> MockInstaller {
            self.installer(InstallOptions::new("ship.local"))
        }
    }

    #[tokio::test]
    async fn test_scenario_call_sequence() {
        let h = Harness::ready();
        let mut b = component("B");
        b.post_install = vec![LifecycleResource {
            precondition: Some(ready("deployment", "x", 1)),
            wait_for_completion: Some(ResourceRef::new("pod", "y", "infra")),
            ..resource("m.yaml", false)
        }];

        let report = h
            .default_installer()
            .install(&[component("A"), b])
            .await
            .unwrap();

        assert!(report.is_success());
        insta::assert_snapshot!(h.log.render(), @r"
        list_releases
        install(A)
        install(B)
        read(deployment x.readyReplicas)
        apply(m.yaml)
        read(pod y.phase)
        remove(m.yaml)
        ");
    }

    #[tokio::test]
    async fn test_installed_release_skips_chart_but_runs_resources() {
        let h = Harness::ready();
        let charts = h.charts.clone().with_installed(["inggw"]);
        let mut kong = component("inggw");
        kong.pre_install = vec![resource("resources/kong/pre.yaml", false)];
        kong.post_install = vec![resource("resources/kong/post.yaml", true)];

        let installer = Installer::new(charts, h.applier.clone(), h.reader.clone(), InstallOptions::new("d"));
        let report = installer.install(&[kong]).await.unwrap();

        assert!(
            !h.log
                .calls()
                .iter()
                .any(|c| matches!(c, RecordedCall::Install { .. }))
        );
        insta::assert_snapshot!(h.log.render(), @r"
        list_releases
        apply(resources/kong/pre.yaml)
        remove(resources/kong/pre.yaml)
        apply(resources/kong/post.yaml)
        ");

        let outcome = report.component("inggw").unwrap();
        assert_eq!(
            outcome.history,
            vec![
                ComponentState::Pending,
                ComponentState::Skipped,
                ComponentState::PreResources,
                ComponentState::ChartInstalled,
                ComponentState::PostResources,
                ComponentState::Done { success: true },
            ]
        );
    }

    #[tokio::test]
    async fn test_install_order_preserved() {
        let h = Harness::ready();
        let releases = ["heapster", "inggwdb", "repo", "metricdb", "tracing", "cicd"];
        let components: Vec<_> = releases.iter().map(|r| component(r)).collect();

        h.default_installer().install(&components).await.unwrap();

        let installs: Vec<_> = h
            .log
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                RecordedCall::Install { release, .. } => Some(release),
                _ => None,
            })
            .collect();
        assert_eq!(installs, releases);
    }

    #[tokio::test]
    async fn test_domain_substituted_into_overrides() {
        let h = Harness::ready();
        let mut cicd = component("cicd");
        cicd.chart.overrides = vec![
            "Master.HostName=jenkins.${domain}".to_string(),
            "Master.Ingress.TLS[0].secretName=cicd-jenkins-tls".to_string(),
            "Master.Ingress.TLS[0].hosts[0]=jenkins.${domain}".to_string(),
        ];

        h.installer(InstallOptions::new("example.com"))
            .install(&[cicd])
            .await
            .unwrap();

        let overrides = h
            .log
            .calls()
            .into_iter()
            .find_map(|c| match c {
                RecordedCall::Install { overrides, .. } => Some(overrides),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            overrides,
            vec![
                "Master.HostName=jenkins.example.com",
                "Master.Ingress.TLS[0].secretName=cicd-jenkins-tls",
                "Master.Ingress.TLS[0].hosts[0]=jenkins.example.com",
            ]
        );
    }

    #[tokio::test]
    async fn test_cleanup_runs_after_all_waits_of_phase() {
        let h = Harness::ready();
        let mut grafana = component("metricviz");
        grafana.pre_install = vec![
            resource("datasource.yaml", true),
            LifecycleResource {
                wait_for_completion: Some(ResourceRef::new("pod", "seed", "infra")),
                ..resource("seed.yaml", false)
            },
            LifecycleResource {
                precondition: Some(ready("deployment", "db", 1)),
                ..resource("migrate.yaml", false)
            },
        ];

        h.default_installer().install(&[grafana]).await.unwrap();

        insta::assert_snapshot!(h.log.render(), @r"
        list_releases
        apply(datasource.yaml)
        apply(seed.yaml)
        read(pod seed.phase)
        read(deployment db.readyReplicas)
        apply(migrate.yaml)
        remove(seed.yaml)
        remove(migrate.yaml)
        install(metricviz)
        ");
    }

    #[tokio::test]
    async fn test_unsupported_precondition_isolated_to_component() {
        let h = Harness::ready();
        let mut a = component("A");
        a.post_install = vec![
            LifecycleResource {
                precondition: Some(ready("job", "setup", 1)),
                ..resource("a.yaml", false)
            },
            resource("a2.yaml", true),
        ];
        let mut b = component("B");
        b.post_install = vec![resource("b.yaml", true)];

        let report = h.default_installer().install(&[a, b]).await.unwrap();

        let errors = report.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].release, "A");
        assert_eq!(errors[0].kind, ComponentErrorKind::Configuration);
        assert_eq!(errors[0].phase, Some(LifecyclePhase::PostInstall));
        assert!(!report.is_success());

        // the skipped resource is never applied nor removed
        insta::assert_snapshot!(h.log.render(), @r"
        list_releases
        install(A)
        apply(a2.yaml)
        install(B)
        apply(b.yaml)
        ");
        assert_eq!(
            report.component("A").unwrap().state,
            ComponentState::Done { success: false }
        );
        assert_eq!(
            report.component("B").unwrap().state,
            ComponentState::Done { success: true }
        );
    }

    #[tokio::test]
    async fn test_completion_timeout_recorded_and_resource_removed() {
        let h = Harness::new(MockClusterReader::new());
        h.reader.script(ResourceKind::Pod, "kong-configure", vec![Some(json!("Running"))]);
        let mut kong = component("inggw");
        kong.post_install = vec![LifecycleResource {
            wait_for_completion: Some(ResourceRef::new("pod", "kong-configure", "infra")),
            completion_timeout: Some(Duration::from_millis(10)),
            ..resource("configure.yaml", false)
        }];

        let report = h.default_installer().install(&[kong]).await.unwrap();

        let errors = report.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ComponentErrorKind::Timeout);
        assert_eq!(
            h.log.mutations().last(),
            Some(&RecordedCall::Remove {
                manifest: "configure.yaml".to_string(),
                namespace: "infra".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_readiness_below_threshold_times_out() {
        let h = Harness::new(MockClusterReader::new());
        h.reader.script(ResourceKind::DaemonSet, "inggw-kong", vec![Some(json!(1))]);
        let mut kong = component("inggw");
        kong.post_install = vec![LifecycleResource {
            precondition: Some(ready("daemonset", "inggw-kong", 2)),
            ..resource("configure.yaml", false)
        }];

        let report = h.default_installer().install(&[kong]).await.unwrap();

        assert_eq!(report.errors()[0].kind, ComponentErrorKind::Timeout);
        assert!(
            !h.log
                .calls()
                .iter()
                .any(|c| matches!(c, RecordedCall::Apply { .. }))
        );
    }

    #[tokio::test]
    async fn test_apply_and_remove_failures_are_warnings() {
        let h = Harness::ready();
        h.applier.fail_apply("broken.yaml");
        h.applier.fail_remove("sticky.yaml");
        let mut a = component("A");
        a.pre_install = vec![resource("broken.yaml", true), resource("sticky.yaml", false)];

        let report = h.default_installer().install(&[a]).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings[0].contains("failed to apply broken.yaml"));
        assert!(report.warnings[1].contains("failed to remove sticky.yaml"));
        assert_eq!(h.charts.installed().len(), 1);
    }

    #[tokio::test]
    async fn test_persistent_resources_never_removed() {
        let h = Harness::ready();
        let mut certman = component("certman");
        certman.post_install = vec![
            resource("clusterissuer.yaml", true),
            LifecycleResource {
                wait_for_completion: Some(ResourceRef::new("pod", "issuer-check", "infra")),
                ..resource("check.yaml", true)
            },
        ];

        h.default_installer().install(&[certman]).await.unwrap();

        assert!(
            !h.log
                .calls()
                .iter()
                .any(|c| matches!(c, RecordedCall::Remove { .. }))
        );
    }

    #[tokio::test]
    async fn test_resource_namespace_override() {
        let h = Harness::ready();
        let mut a = component("A");
        a.pre_install = vec![LifecycleResource {
            namespace: Some("kube-system".to_string()),
            ..resource("rbac.yaml", true)
        }];

        h.default_installer().install(&[a]).await.unwrap();

        assert!(h.log.calls().contains(&RecordedCall::Apply {
            manifest: "rbac.yaml".to_string(),
            namespace: "kube-system".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_chart_failure_aborts_by_default() {
        let h = Harness::ready();
        h.charts.fail_install("B");

        let err = h
            .default_installer()
            .install(&[component("A"), component("B"), component("C")])
            .await
            .unwrap_err();

        assert!(matches!(err, KubeError::ChartInstallFailed { ref release, .. } if release == "B"));
        insta::assert_snapshot!(h.log.render(), @r"
        list_releases
        install(A)
        install(B)
        ");
    }

    #[tokio::test]
    async fn test_chart_failure_continue_policy() {
        let h = Harness::ready();
        h.charts.fail_install("B");
        let mut b = component("B");
        b.post_install = vec![resource("b-post.yaml", false)];
        let options = InstallOptions {
            chart_failure: ChartFailurePolicy::Continue,
            ..InstallOptions::new("d")
        };

        let report = h
            .installer(options)
            .install(&[component("A"), b, component("C")])
            .await
            .unwrap();

        let errors = report.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ComponentErrorKind::ChartInstall);
        assert_eq!(errors[0].phase, None);
        assert!(!report.component("B").unwrap().chart_installed());
        assert!(report.component("C").unwrap().chart_installed());
        insta::assert_snapshot!(h.log.render(), @r"
        list_releases
        install(A)
        install(B)
        install(C)
        ");
    }

    #[tokio::test]
    async fn test_cluster_read_failure_is_fatal() {
        let h = Harness::ready();
        h.reader.fail_reads("kong-postgres");
        let mut kong = component("inggw");
        kong.pre_install = vec![LifecycleResource {
            precondition: Some(ready("deployment", "kong-postgres", 1)),
            ..resource("pre.yaml", false)
        }];

        let err = h
            .default_installer()
            .install(&[kong, component("ingcontrol")])
            .await
            .unwrap_err();

        assert!(matches!(err, KubeError::ClusterRead { .. }));
        assert!(
            !h.log
                .calls()
                .iter()
                .any(|c| matches!(c, RecordedCall::Install { .. }))
        );
    }

    #[tokio::test]
    async fn test_release_listing_failure_is_fatal() {
        let h = Harness::ready();
        h.charts.fail_list();

        let result = h.default_installer().install(&[component("A")]).await;

        assert!(result.is_err());
        assert_eq!(h.log.render(), "list_releases");
    }

    #[tokio::test]
    async fn test_cancel_stops_run() {
        let h = Harness::new(MockClusterReader::new());
        let (handle, signal) = CancelSignal::pair();
        let mut a = component("A");
        a.pre_install = vec![LifecycleResource {
            wait_for_completion: Some(ResourceRef::new("pod", "never", "infra")),
            ..resource("a.yaml", false)
        }];
        let installer = Installer::new(
            h.charts.clone(),
            h.applier.clone(),
            h.reader.clone(),
            InstallOptions {
                poll: PollConfig {
                    interval: Duration::from_millis(2),
                    timeout: None,
                },
                ..InstallOptions::new("d")
            },
        )
        .with_cancel(signal);

        handle.cancel();
        let err = installer.install(&[a]).await.unwrap_err();

        assert!(matches!(err, KubeError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_before_run_installs_nothing() {
        let h = Harness::ready();
        let (handle, signal) = CancelSignal::pair();
        let installer = h.default_installer().with_cancel(signal);

        handle.cancel();
        let err = installer
            .install(&[component("A"), component("B"), component("C")])
            .await
            .unwrap_err();

        assert!(matches!(err, KubeError::Cancelled));
        assert_eq!(h.log.render(), "list_releases");
    }

    #[tokio::test]
    async fn test_cancel_between_components_stops_run() {
        let h = Harness::ready();
        let (handle, signal) = CancelSignal::pair();
        let installer = h.default_installer().with_cancel(signal);

        let first = installer.install(&[component("A")]).await;
        assert!(first.is_ok());

        handle.cancel();
        let err = installer
            .install(&[component("B"), component("C")])
            .await
            .unwrap_err();

        assert!(matches!(err, KubeError::Cancelled));
        assert!(
            !h.log
                .calls()
                .iter()
                .any(|c| matches!(c, RecordedCall::Install { release, .. } if release != "A"))
        );
    }

    #[tokio::test]
    async fn test_zero_completion_timeout_waits_until_done() {
        let h = Harness::new(MockClusterReader::new());
        let mut phases = vec![Some(json!("Running")); 80];
        phases.push(Some(json!("Succeeded")));
        h.reader.script(ResourceKind::Pod, "kong-configure", phases);
        let mut kong = component("inggw");
        kong.pre_install = vec![LifecycleResource {
            wait_for_completion: Some(ResourceRef::new("pod", "kong-configure", "infra")),
            completion_timeout: Some(Duration::ZERO),
            ..resource("configure.yaml", false)
        }];

        let report = h.default_installer().install(&[kong]).await.unwrap();

        assert!(report.is_success(), "{:?}", report.errors());
        assert_eq!(h.reader.reads_of("kong-configure"), 81);
    }

    #[test]
    fn test_plan_mirrors_install_order() {
        let mut kong = component("inggw");
        kong.chart.overrides = vec!["proxy.host=api.${domain}".to_string()];
        kong.pre_install = vec![LifecycleResource {
            precondition: Some(ready("deployment", "kong-postgres", 1)),
            wait_for_completion: Some(ResourceRef::new("pod", "kong-pre-configure", "infra")),
            ..resource("resources/kong/pod-kong-pre-configure.yaml", false)
        }];
        let installed: BTreeSet<String> = ["heapster".to_string()].into();

        let steps = plan(&[component("heapster"), kong], &installed, "ship.local");
        let rendered: Vec<_> = steps.iter().map(ToString::to_string).collect();

        insta::assert_snapshot!(rendered.join("\n"), @r"
        [heapster] skip chart (release already installed)
        [inggw] pre-install: wait for deployment infra/kong-postgres (1 ready)
        [inggw] pre-install: apply resources/kong/pod-kong-pre-configure.yaml in infra
        [inggw] pre-install: wait for pod infra/kong-pre-configure to complete
        [inggw] pre-install: remove resources/kong/pod-kong-pre-configure.yaml from infra
        [inggw] install chart sprinthive-dev-charts/inggw into infra --set proxy.host=api.ship.local
        ");
    }

    #[tokio::test]
    async fn test_uninstall_reverse_order_installed_only() {
        let h = Harness::ready();
        let charts = h.charts.clone().with_installed(["A", "C"]);

        let removed = uninstall(
            &charts,
            &[component("A"), component("B"), component("C")],
            &ProgressReporter::hidden(),
        )
        .await
        .unwrap();

        assert_eq!(removed, vec!["C", "A"]);
        assert!(charts.installed().is_empty());
        assert!(h.log.calls().iter().all(|c| !matches!(
            c,
            RecordedCall::ReadStatus { .. } | RecordedCall::Apply { .. } | RecordedCall::Remove { .. }
        )));
    }

    #[tokio::test]
    async fn test_add_repositories_in_order() {
        let h = Harness::ready();
        let repos = vec![
            ChartRepository {
                name: "sprinthive-dev-charts".to_string(),
                url: "https://s3.eu-west-2.amazonaws.com/sprinthive-dev-charts".to_string(),
            },
            ChartRepository {
                name: "stable".to_string(),
                url: "https://charts.helm.sh/stable".to_string(),
            },
        ];

        h.default_installer().add_repositories(&repos).await.unwrap();

        assert_eq!(
            h.log.render(),
            "add_repository(sprinthive-dev-charts)\nadd_repository(stable)"
        );
    }
}
