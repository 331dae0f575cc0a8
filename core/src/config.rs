//! Core configuration: validation ceilings, rate-limit rules, monitor
//! retention/sweep settings, and the static threat pattern table.
//!
//! Every knob has a production default; a JSON file can override the lot.

use crate::error::WalletResult;
use crate::types::{Millis, MinorUnits};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Maximum transfer/payment amount, minor units. 10,000.00 by default.
    pub max_amount: MinorUnits,
    /// Free-text descriptions are truncated to this many characters.
    pub max_description_len: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_amount: 1_000_000,
            max_description_len: 500,
        }
    }
}

/// A fixed-window rate-limit rule: at most `max_requests` per `window_ms`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitRule {
    pub max_requests: i64,
    pub window_ms: Millis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Per-sender transfer budget.
    pub transfer: RateLimitRule,
    /// Per-payer card payment budget.
    pub payment: RateLimitRule,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            // 5 transfers per 5 minutes
            transfer: RateLimitRule {
                max_requests: 5,
                window_ms: 300_000,
            },
            // 10 payments per minute
            payment: RateLimitRule {
                max_requests: 10,
                window_ms: 60_000,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatAction {
    Log,
    Warn,
    Block,
    Escalate,
}

/// A configured rule: `threshold` matching events within `window_minutes`
/// triggers `action`. Static table, never mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatPattern {
    pub pattern_type: String,
    pub threshold: usize,
    pub window_minutes: i64,
    pub action: ThreatAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Most recent N events retained in the log.
    pub retention: usize,
    /// Periodic sweep interval, milliseconds.
    pub sweep_interval_ms: Millis,
    /// Events-per-hour count above which the sweep raises
    /// `high_activity_detected`.
    pub sweep_activity_threshold: usize,
    /// A transfer above this amount (minor units) counts toward the
    /// `unusual_transfer_amounts` pattern.
    pub unusual_transfer_amount: MinorUnits,
    pub patterns: Vec<ThreatPattern>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            retention: 1000,
            sweep_interval_ms: 300_000,
            sweep_activity_threshold: 50,
            unusual_transfer_amount: 500_000,
            patterns: default_threat_patterns(),
        }
    }
}

pub fn default_threat_patterns() -> Vec<ThreatPattern> {
    vec![
        ThreatPattern {
            pattern_type: "rapid_failed_logins".into(),
            threshold: 5,
            window_minutes: 15,
            action: ThreatAction::Block,
        },
        ThreatPattern {
            pattern_type: "unusual_transfer_amounts".into(),
            threshold: 3,
            window_minutes: 60,
            action: ThreatAction::Warn,
        },
        ThreatPattern {
            pattern_type: "multiple_pin_failures".into(),
            threshold: 3,
            window_minutes: 30,
            action: ThreatAction::Escalate,
        },
        ThreatPattern {
            pattern_type: "rapid_api_requests".into(),
            threshold: 100,
            window_minutes: 5,
            action: ThreatAction::Block,
        },
        ThreatPattern {
            pattern_type: "suspicious_geolocation".into(),
            threshold: 1,
            window_minutes: 1440,
            action: ThreatAction::Warn,
        },
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardConfig {
    /// Default daily limit for newly issued cards, minor units.
    pub default_daily_limit: MinorUnits,
    /// Default monthly limit for newly issued cards, minor units.
    pub default_monthly_limit: MinorUnits,
    /// Card validity in months from issuance.
    pub validity_months: u32,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            default_daily_limit: 500_000,
            default_monthly_limit: 5_000_000,
            validity_months: 36,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub validation: ValidationConfig,
    pub rate_limits: RateLimitConfig,
    pub monitor: MonitorConfig,
    pub cards: CardConfig,
}

impl CoreConfig {
    pub fn from_json_file(path: &Path) -> WalletResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("read config {}: {e}", path.display()))?;
        Ok(serde_json::from_str(&raw)?)
    }
}
