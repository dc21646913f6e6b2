use anyhow::Result;
use xck_config::{load_layered_yaml, report_unused_keys, UnusedKeyPolicy};

/// `xck config-check`: typed validation plus the unused-key report.
pub fn check(paths: &[String], fail_unused: bool) -> Result<()> {
    let loaded = load_layered_yaml(paths)?;
    let cfg = loaded.monitor()?;

    let policy = if fail_unused {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(&loaded.config_json, policy)?;

    let required: Vec<&str> = cfg
        .reconcile
        .required_channels
        .iter()
        .map(|c| c.as_str())
        .collect();
    println!("config_hash={}", loaded.config_hash);
    println!("required_channels={}", required.join(","));
    println!("settlement_window_ms={}", cfg.reconcile.settlement_window_ms);
    println!("mode={:?}", cfg.reconcile.mode);
    println!("unused_keys={}", report.unused_leaf_pointers.len());
    for p in &report.unused_leaf_pointers {
        println!("unused={p}");
    }
    Ok(())
}
