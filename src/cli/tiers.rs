//! `diagnose tiers` handler

use crate::cli::{load_config, output, TiersArgs};
use crate::tier::TierPolicies;

/// Handle `diagnose tiers`. Returns the rendered output.
pub fn handle_tiers(args: &TiersArgs) -> anyhow::Result<String> {
    let config = load_config(&args.config, None)?;
    let views = output::tier_views(&TierPolicies::from_config(&config.tiers));

    if args.json {
        Ok(output::format_tiers_json(&views)?)
    } else {
        Ok(output::format_tiers_table(&views))
    }
}
