//! Org limit quota check after deploying.

use serde::Deserialize;

use crate::error::{PromoteError, Result};
use crate::shell::extract_json;
use crate::steps::Stage;

/// One entry of `sf org list limits --json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrgLimit {
    pub name: String,
    pub max: i64,
    pub remaining: i64,
}

impl OrgLimit {
    /// A limit with capacity that has none left.
    pub fn is_breached(&self) -> bool {
        self.max > 0 && self.remaining <= 0
    }

    /// Share of the limit consumed, 0-100.
    pub fn used_pct(&self) -> f64 {
        if self.max <= 0 {
            return 0.0;
        }
        (self.max - self.remaining) as f64 * 100.0 / self.max as f64
    }
}

#[derive(Debug, Deserialize)]
struct LimitsPayload {
    result: Vec<OrgLimit>,
}

/// Parse limits from CLI output, tolerating text around the JSON.
pub fn parse_limits(output: &str) -> Result<Vec<OrgLimit>> {
    let json = extract_json(output).ok_or_else(|| PromoteError::StageFailed {
        stage: Stage::PostDeployValidation.name().to_string(),
        message: "org limits output contains no JSON".to_string(),
    })?;

    let payload: LimitsPayload =
        serde_json::from_str(json).map_err(|e| PromoteError::StageFailed {
            stage: Stage::PostDeployValidation.name().to_string(),
            message: format!("org limits JSON is not valid: {}", e),
        })?;

    Ok(payload.result)
}

/// Limits with no remaining capacity.
pub fn breaches(limits: &[OrgLimit]) -> Vec<&OrgLimit> {
    limits.iter().filter(|l| l.is_breached()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = r#"Warning: a newer CLI is available
{
  "status": 0,
  "result": [
    {"name": "DailyApiRequests", "max": 15000, "remaining": 14990},
    {"name": "DataStorageMB", "max": 5, "remaining": 0},
    {"name": "HourlyODataCallout", "max": 0, "remaining": 0}
  ]
}"#;

    #[test]
    fn parses_limits_behind_warnings() {
        let limits = parse_limits(OUTPUT).unwrap();
        assert_eq!(limits.len(), 3);
        assert_eq!(limits[0].name, "DailyApiRequests");
    }

    #[test]
    fn exhausted_limit_is_breach() {
        let limits = parse_limits(OUTPUT).unwrap();
        let breached = breaches(&limits);

        assert_eq!(breached.len(), 1);
        assert_eq!(breached[0].name, "DataStorageMB");
    }

    #[test]
    fn zero_max_is_not_breach() {
        let limit = OrgLimit {
            name: "Unused".to_string(),
            max: 0,
            remaining: 0,
        };
        assert!(!limit.is_breached());
        assert_eq!(limit.used_pct(), 0.0);
    }

    #[test]
    fn used_pct_reports_consumption() {
        let limit = OrgLimit {
            name: "DailyApiRequests".to_string(),
            max: 200,
            remaining: 50,
        };
        assert_eq!(limit.used_pct(), 75.0);
    }

    #[test]
    fn garbage_output_is_error() {
        assert!(parse_limits("ERROR running org list limits").is_err());
        assert!(parse_limits("{\"status\": 1}").is_err());
    }
}
