//! Uninstall command - remove the bundle's releases from the cluster

use console::style;
use ship_kube::{ChartInstaller, HelmCli, ProgressReporter, removal_order, uninstall};

use super::Context;
use crate::error::{CliError, Result};

/// Run the uninstall command
pub async fn run(ctx: &Context, yes: bool) -> Result<()> {
    let bundle = ctx.load_bundle()?;

    let charts = HelmCli::new().with_kube_context(ctx.kube_context.clone());
    charts.verify().await?;

    let installed = charts.list_release_names().await?;
    let targets = removal_order(&bundle.components, &installed);

    if targets.is_empty() {
        println!("{} No configured release is installed", style("✓").green().bold());
        return Ok(());
    }

    if !yes {
        println!(
            "{} {} release(s) would be removed, in this order:",
            style("⚠").yellow(),
            targets.len()
        );
        for component in &targets {
            println!(
                "  {} ({})",
                style(component.release_name()).cyan(),
                component.namespace()
            );
        }
        return Err(CliError::usage_with_help(
            "Uninstall requires confirmation",
            "rerun with --yes to remove these releases",
        ));
    }

    let removed = uninstall(&charts, &bundle.components, &ProgressReporter::new()).await?;

    println!(
        "{} Removed {} release(s): {}",
        style("✓").green().bold(),
        removed.len(),
        removed.join(", ")
    );

    Ok(())
}
