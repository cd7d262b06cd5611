//! Install command - install the bundle's components into the cluster

use console::style;
use ship_core::{BundleSettings, ChartFailurePolicy};
use ship_kube::{
    CancelSignal, ChartInstaller, HelmCli, InstallOptions, Installer, KubeStatusReader, KubectlApplier,
    PollConfig, ProgressReporter, plan,
};
use std::time::Duration;

use super::Context;
use crate::error::{CliError, Result};

/// Arguments of the install command
pub struct InstallArgs {
    pub domain: String,
    pub timeout: Option<u64>,
    pub poll_interval: Option<u64>,
    pub on_chart_failure: Option<ChartFailurePolicy>,
    pub skip_repositories: bool,
    pub dry_run: bool,
    pub json: bool,
}

/// Merge command-line flags over the bundle settings
fn install_options(settings: &BundleSettings, args: &InstallArgs) -> InstallOptions {
    let timeout = match args.timeout {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => settings.wait_timeout(),
    };
    let interval = args
        .poll_interval
        .map(Duration::from_millis)
        .unwrap_or(settings.poll_interval);

    InstallOptions {
        domain: args.domain.clone(),
        chart_failure: args.on_chart_failure.unwrap_or(settings.chart_failure),
        poll: PollConfig { interval, timeout },
    }
}

/// Run the install command
pub async fn run(ctx: &Context, args: &InstallArgs, cancel: CancelSignal) -> Result<()> {
    let bundle = ctx.load_bundle()?;
    let options = install_options(&bundle.settings, args);
    tracing::debug!(?options, "install options");

    let charts = HelmCli::new().with_kube_context(ctx.kube_context.clone());
    charts.verify().await?;

    if args.dry_run {
        let installed = charts.list_release_names().await?;
        let steps = plan(&bundle.components, &installed, &options.domain);

        println!(
            "{} Dry run - {} step(s) for {} component(s)",
            style("✓").green().bold(),
            steps.len(),
            bundle.components.len()
        );
        for step in &steps {
            println!("  {}", step);
        }
        return Ok(());
    }

    let reader = KubeStatusReader::connect(ctx.kube_context.as_deref()).await?;
    let applier = KubectlApplier::new().with_context(ctx.kube_context.clone());
    let installer = Installer::new(charts, applier, reader, options)
        .with_progress(ProgressReporter::new())
        .with_cancel(cancel);

    if !args.skip_repositories {
        installer.add_repositories(&bundle.repositories).await?;
    }

    let report = installer.install(&bundle.components).await?;
    ProgressReporter::new().print_report(&report);

    if args.json {
        let json = serde_json::to_string_pretty(&report).map_err(|e| CliError::internal(e.to_string()))?;
        println!("{}", json);
    }

    if !report.is_success() {
        let failed = report.components.iter().filter(|c| !c.is_success()).count();
        return Err(CliError::PartialFailure { failed });
    }

    Ok(())
}
