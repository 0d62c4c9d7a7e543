//! Unit test coverage gate.
//!
//! Reads the istanbul `json-summary` report (the format Jest writes with
//! `--coverageReporters=json-summary`) and compares `total.<metric>.pct`
//! against the configured minimum.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::config::CoverageMetric;
use crate::error::{PromoteError, Result};
use crate::steps::Stage;

#[derive(Debug, Deserialize)]
struct Summary {
    total: HashMap<String, MetricTotals>,
}

#[derive(Debug, Deserialize)]
struct MetricTotals {
    pct: serde_json::Value,
}

fn unreadable(message: String) -> PromoteError {
    PromoteError::StageFailed {
        stage: Stage::UnitTests.name().to_string(),
        message,
    }
}

/// Extract the percentage for `metric` from a summary document.
pub fn parse_coverage(json: &str, metric: CoverageMetric) -> Result<f64> {
    let summary: Summary = serde_json::from_str(json)
        .map_err(|e| unreadable(format!("coverage summary is not valid: {}", e)))?;

    let totals = summary
        .total
        .get(metric.key())
        .ok_or_else(|| unreadable(format!("coverage summary has no '{}' total", metric.key())))?;

    totals.pct.as_f64().ok_or_else(|| {
        unreadable(format!(
            "coverage summary has no {} percentage ({})",
            metric.key(),
            totals.pct
        ))
    })
}

/// Read and parse the summary at `path`.
pub fn read_coverage(path: &Path, metric: CoverageMetric) -> Result<f64> {
    let content = fs::read_to_string(path).map_err(|e| {
        unreadable(format!(
            "coverage summary {} could not be read: {}",
            path.display(),
            e
        ))
    })?;
    parse_coverage(&content, metric)
}

/// Fail with `CoverageBelowThreshold` when `measured < minimum`.
pub fn check_coverage(measured: f64, minimum: f64) -> Result<()> {
    if measured < minimum {
        Err(PromoteError::CoverageBelowThreshold { measured, minimum })
    } else {
        Ok(())
    }
}
