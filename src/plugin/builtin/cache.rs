//! Cache headers for deployed files.

use crate::deploy::DeployFile;
use crate::plugin::{HookResult, Plugin};
use crate::site::Site;

/// One year, for files whose name changes with their content.
const FINGERPRINTED_MAX_AGE: u64 = 365 * 24 * 60 * 60;

/// Sets `Cache-Control` on every deployed file.
///
/// Fingerprinted static files are cached for a year, everything else for
/// the configured `cache-duration`. A value set by an earlier plugin wins.
pub struct CacheDurationPlugin;

impl Plugin for CacheDurationPlugin {
    fn pre_deploy_file(&self, site: &Site, file: &mut DeployFile) -> HookResult {
        if file.cache_control.is_some() {
            return Ok(());
        }

        let max_age = if site.is_fingerprinted(&file.url) {
            FINGERPRINTED_MAX_AGE
        } else {
            site.config().cache_duration
        };
        file.cache_control = Some(format!("max-age={max_age}"));
        Ok(())
    }
}
