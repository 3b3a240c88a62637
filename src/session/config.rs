use std::path::Path;
use std::time::Duration;

use crate::cache::preview::DEFAULT_CACHE_CAPACITY;
use crate::foundation::core::Tier;
use crate::foundation::error::{ParamcadError, ParamcadResult};
use crate::schema::value::{ParamSnapshot, ParamValue};

/// Which side of a resolution cap is enforced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapBound {
    /// Values above the cap are lowered to it.
    Max,
    /// Values below the cap are raised to it.
    Min,
}

/// Limit applied to one resolution-affecting parameter before a request is issued.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionCap {
    /// Parameter id, e.g. `$fn`.
    pub param: String,
    /// Enforced side.
    pub bound: CapBound,
    /// Cap value.
    pub value: f64,
}

impl ResolutionCap {
    /// Cap `param` from above.
    pub fn max(param: impl Into<String>, value: f64) -> Self {
        Self {
            param: param.into(),
            bound: CapBound::Max,
            value,
        }
    }

    /// Cap `param` from below.
    pub fn min(param: impl Into<String>, value: f64) -> Self {
        Self {
            param: param.into(),
            bound: CapBound::Min,
            value,
        }
    }
}

/// Per-tier request settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierConfig {
    /// Deadline for one request.
    pub timeout_ms: u64,
    /// Caps applied to the snapshot before hashing and submission.
    #[serde(default)]
    pub resolution_caps: Vec<ResolutionCap>,
}

impl TierConfig {
    /// Request deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Apply the caps to numeric values present in `snapshot`. Absent or non-numeric values are
    /// left alone; integers stay integers.
    pub fn apply_caps(&self, snapshot: &mut ParamSnapshot) {
        for cap in &self.resolution_caps {
            let Some(v) = snapshot.get_mut(&cap.param) else {
                continue;
            };
            let Some(x) = v.as_f64() else {
                continue;
            };
            let capped = match cap.bound {
                CapBound::Max => x.min(cap.value),
                CapBound::Min => x.max(cap.value),
            };
            if capped != x {
                let integer = matches!(v, ParamValue::Integer(_));
                *v = if integer {
                    ParamValue::Integer(capped.round() as i64)
                } else {
                    ParamValue::Number(capped)
                };
            }
        }
    }
}

/// Orchestrator settings. Every field has a default, so a partial JSON object is valid.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Quiet period after the last edit before a preview request is issued.
    pub debounce_ms: u64,
    /// Cache entries kept per tier.
    pub cache_capacity: usize,
    /// Preview tier settings.
    pub preview: TierConfig,
    /// Full tier settings.
    pub full: TierConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            preview: TierConfig {
                timeout_ms: 15_000,
                resolution_caps: vec![
                    ResolutionCap::max("$fn", 32.0),
                    ResolutionCap::min("$fa", 12.0),
                    ResolutionCap::min("$fs", 2.0),
                ],
            },
            full: TierConfig {
                timeout_ms: 300_000,
                resolution_caps: Vec::new(),
            },
        }
    }
}

impl OrchestratorConfig {
    /// Debounce window.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Settings for `tier`.
    pub fn tier(&self, tier: Tier) -> &TierConfig {
        match tier {
            Tier::Preview => &self.preview,
            Tier::Full => &self.full,
        }
    }

    /// Reject settings the orchestrator cannot run with.
    pub fn validate(&self) -> ParamcadResult<()> {
        if self.cache_capacity == 0 {
            return Err(ParamcadError::config("cacheCapacity must be at least 1"));
        }
        for tier in Tier::ALL {
            let t = self.tier(tier);
            if t.timeout_ms == 0 {
                return Err(ParamcadError::config(format!(
                    "{tier} timeoutMs must be non-zero"
                )));
            }
            if let Some(cap) = t
                .resolution_caps
                .iter()
                .find(|c| !c.value.is_finite() || c.param.is_empty())
            {
                return Err(ParamcadError::config(format!(
                    "{tier} resolution cap on \"{}\" is invalid",
                    cap.param
                )));
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(s: &str) -> ParamcadResult<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_path(path: &Path) -> ParamcadResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
