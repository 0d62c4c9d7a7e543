//! Run identification.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::environment::Environment;
use crate::error::PromoteError;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a run: `run_<unix-ms>_<8 hex>`.
///
/// Ids sort chronologically and are safe to use as directory names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh id for a run against `environment`.
    pub fn generate(environment: Environment) -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);

        let mut hasher = Sha256::new();
        hasher.update(millis.to_le_bytes());
        hasher.update(std::process::id().to_le_bytes());
        hasher.update(sequence.to_le_bytes());
        hasher.update(environment.name().as_bytes());
        let digest = hasher.finalize();

        Self(format!("run_{}_{}", millis, hex::encode(&digest[..4])))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unix time in milliseconds encoded in the id.
    pub fn timestamp_millis(&self) -> i64 {
        self.0
            .split('_')
            .nth(1)
            .and_then(|ms| ms.parse().ok())
            .unwrap_or_default()
    }
}

fn is_well_formed(value: &str) -> bool {
    let mut parts = value.split('_');
    matches!(
        (parts.next(), parts.next(), parts.next(), parts.next()),
        (Some("run"), Some(ms), Some(suffix), None)
            if !ms.is_empty()
                && ms.chars().all(|c| c.is_ascii_digit())
                && suffix.len() == 8
                && suffix.chars().all(|c| c.is_ascii_hexdigit())
    )
}

impl FromStr for RunId {
    type Err = PromoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if is_well_formed(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(PromoteError::RunNotFound {
                run_id: trimmed.to_string(),
            })
        }
    }
}

impl TryFrom<String> for RunId {
    type Error = PromoteError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
