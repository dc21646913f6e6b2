//! Command handler modules for the `xck` CLI.

pub mod config;
pub mod replay;

use anyhow::Result;
use xck_config::{load_layered_yaml, MonitorConfig};

/// Load the typed config from layered paths, or the defaults when none given.
///
/// Returns the config hash alongside when files were loaded.
pub fn load_monitor_config(paths: &[String]) -> Result<(MonitorConfig, Option<String>)> {
    if paths.is_empty() {
        let cfg = MonitorConfig::default();
        cfg.validate()?;
        return Ok((cfg, None));
    }
    let loaded = load_layered_yaml(paths)?;
    let cfg = loaded.monitor()?;
    Ok((cfg, Some(loaded.config_hash)))
}
