//! `xck replay`: drive the engine from a recorded JSONL feed.
//!
//! Each verdict is printed as one JSON line on stdout, followed by a single
//! summary line. A malformed line or an invalid sighting aborts the replay
//! with the offending line number.

use std::fs::File;
use std::io::{BufRead, BufReader};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tracing::{debug, warn};
use xck_reconcile::{FeedEvent, Reconciler, Verdict, VerdictKind};

use super::load_monitor_config;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ReplayLine<'a> {
    Verdict {
        line: usize,
        block_number: u64,
        verdict: &'a Verdict,
    },
    Summary(&'a ReplaySummary),
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub config_hash: Option<String>,
    pub sightings: usize,
    pub ticks: usize,
    pub verdicts: usize,
    pub missing: usize,
    pub mismatched: usize,
    pub consistent: usize,
    pub open_records: usize,
}

pub fn run(config_paths: &[String], input: &str) -> Result<ReplaySummary> {
    let (cfg, config_hash) = load_monitor_config(config_paths)?;
    let mut engine = Reconciler::new(cfg.reconcile).map_err(|e| anyhow!("CONFIG_INVALID: {e}"))?;

    let file = File::open(input).with_context(|| format!("open replay input {input}"))?;
    let mut summary = ReplaySummary {
        config_hash,
        ..ReplaySummary::default()
    };

    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("read {input} line {line_no}"))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let ev: FeedEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("line {line_no}: malformed feed event"))?;

        let is_sighting = matches!(ev, FeedEvent::Sighting(_));
        let block_number = match &ev {
            FeedEvent::Tick { block_number, .. } => Some(*block_number),
            FeedEvent::Sighting(_) => None,
        };

        let outcome = engine
            .apply(ev)
            .map_err(|e| anyhow!("line {line_no}: {e}"))?;

        if is_sighting {
            summary.sightings += 1;
        }

        let (Some(outcome), Some(block_number)) = (outcome, block_number) else {
            continue;
        };
        summary.ticks += 1;
        summary.consistent += outcome.consistent.len();
        summary.missing += outcome.count(VerdictKind::Missing);
        summary.mismatched += outcome.count(VerdictKind::Mismatched);
        summary.verdicts += outcome.verdicts.len();
        debug!(
            block_number,
            verdicts = outcome.verdicts.len(),
            pending = outcome.pending,
            "tick replayed"
        );

        for verdict in &outcome.verdicts {
            warn!(
                kind = verdict.kind.as_str(),
                key = %verdict.key,
                block_number,
                "anomaly"
            );
            let out = ReplayLine::Verdict {
                line: line_no,
                block_number,
                verdict,
            };
            println!("{}", serde_json::to_string(&out)?);
        }
    }

    summary.open_records = engine.store().len();
    println!("{}", serde_json::to_string(&ReplayLine::Summary(&summary))?);
    Ok(summary)
}
