//! Chart value overrides and `${domain}` substitution

use crate::component::ChartSpec;
use crate::error::{CoreError, Result};

/// Placeholder replaced by the install domain in chart overrides
pub const DOMAIN_PLACEHOLDER: &str = "${domain}";

/// Replace every occurrence of `${domain}` in `value`
pub fn substitute_domain(value: &str, domain: &str) -> String {
    value.replace(DOMAIN_PLACEHOLDER, domain)
}

/// Overrides of a chart with the domain substituted, in configured order
pub fn resolve_overrides(chart: &ChartSpec, domain: &str) -> Vec<String> {
    chart
        .overrides
        .iter()
        .map(|o| substitute_domain(o, domain))
        .collect()
}

/// Check that an override has the `key=value` form
pub(crate) fn validate_override(release: &str, value: &str) -> Result<()> {
    match value.split_once('=') {
        Some((key, _)) if !key.trim().is_empty() => Ok(()),
        _ => Err(CoreError::InvalidOverride {
            release: release.to_string(),
            value: value.to_string(),
        }),
    }
}
