//! Components command - show the configured install order

use console::style;

use super::Context;
use crate::error::Result;

/// Run the components command
pub fn run(ctx: &Context) -> Result<()> {
    let bundle = ctx.load_bundle()?;

    if bundle.components.is_empty() {
        println!("No components configured");
        return Ok(());
    }

    println!(
        "{:<4} {:<16} {:<44} {:<12} {:>4} {:>4}",
        style("#").bold(),
        style("RELEASE").bold(),
        style("CHART").bold(),
        style("NAMESPACE").bold(),
        style("PRE").bold(),
        style("POST").bold()
    );

    for (index, component) in bundle.components.iter().enumerate() {
        println!(
            "{:<4} {:<16} {:<44} {:<12} {:>4} {:>4}",
            index + 1,
            component.release_name(),
            component.chart.path,
            component.namespace(),
            component.pre_install.len(),
            component.post_install.len()
        );
    }

    Ok(())
}
