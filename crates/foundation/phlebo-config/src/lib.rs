//! Dispatch configuration.
//!
//! Every tunable of the cascade lives here: search radii, incentive
//! rates, claim retry depth, the assignment deadline, and the explicit
//! flag resolving whether an admin "go offline" blocks the least-busy
//! fallback tier.
//!
//! Loading order: explicit path > `~/.config/phlebo/dispatch.yaml` >
//! built-in defaults. A missing file is not an error.

use phlebo_core::DEFAULT_MAX_ASSIGNMENTS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Tunables for the assignment cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Outer radius of the nearby tier (km)
    pub nearby_radius_km: f64,
    /// Outer radius of the extended ring (km); inner edge is the nearby radius
    pub extended_radius_km: f64,
    /// Top-N candidates fetched per strategy so a lost claim race can
    /// retry the next one without re-querying
    pub claim_candidates: usize,
    /// Bounded retries for transient geo/registry failures
    pub infra_retry_attempts: u32,
    /// Base backoff between infra retries (doubles per attempt, jittered)
    pub infra_retry_base_ms: u64,
    /// Deadline over the whole search + claim phase of one assignment
    pub assign_timeout_secs: u64,
    /// Capacity given to newly onboarded technicians
    pub default_max_assignments: u32,
    /// ETA model: base minutes before travel
    pub eta_base_minutes: i64,
    /// ETA model: minutes added per km of travel
    pub eta_minutes_per_km: i64,
    /// Extended tier allowance (₹ per km)
    pub travel_allowance_per_km: f64,
    /// City-wide premium base (₹)
    pub premium_base_rupees: f64,
    /// City-wide premium per km (₹)
    pub premium_per_km_rupees: f64,
    /// Least-busy overtime bonus (percent of order payout)
    pub overtime_bonus_percent: u32,
    /// When true, an operator-forced "unavailable" also removes the
    /// technician from the least-busy tier. The upstream system let the
    /// least-busy tier ignore the availability flag entirely; that stays
    /// the default rather than silently unifying the two notions.
    pub least_busy_honors_offline: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            nearby_radius_km: 10.0,
            extended_radius_km: 25.0,
            claim_candidates: 3,
            infra_retry_attempts: 3,
            infra_retry_base_ms: 200,
            assign_timeout_secs: 5,
            default_max_assignments: DEFAULT_MAX_ASSIGNMENTS,
            eta_base_minutes: 30,
            eta_minutes_per_km: 2,
            travel_allowance_per_km: 5.0,
            premium_base_rupees: 200.0,
            premium_per_km_rupees: 8.0,
            overtime_bonus_percent: 25,
            least_busy_honors_offline: false,
        }
    }
}

impl DispatchConfig {
    /// Load from the default location, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load from an explicit YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `~/.config/phlebo/dispatch.yaml` (platform equivalent via `dirs`).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("phlebo")
            .join("dispatch.yaml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_business_rules() {
        let cfg = DispatchConfig::default();
        assert_eq!(cfg.nearby_radius_km, 10.0);
        assert_eq!(cfg.extended_radius_km, 25.0);
        assert_eq!(cfg.overtime_bonus_percent, 25);
        assert!(!cfg.least_busy_honors_offline);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let cfg = DispatchConfig::default();
        let yaml = serde_yaml::to_string(&cfg).expect("serialize");
        let back: DispatchConfig = serde_yaml::from_str(&yaml).expect("deserialize");
        assert_eq!(back.claim_candidates, cfg.claim_candidates);
        assert_eq!(back.premium_base_rupees, cfg.premium_base_rupees);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let cfg: DispatchConfig =
            serde_yaml::from_str("nearby_radius_km: 7.5\n").expect("deserialize");
        assert_eq!(cfg.nearby_radius_km, 7.5);
        assert_eq!(cfg.extended_radius_km, 25.0);
    }
}
