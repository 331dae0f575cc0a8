//! Typed security events. Event types are open-ended string tags (the
//! threat patterns match on substrings), severity is a closed enum.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// High and critical events are published synchronously to alert
    /// subscribers.
    pub fn is_alerting(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub event_type: String,
    pub severity: Severity,
    pub user_id: Option<String>,
    /// Arbitrary structured details. Raw PINs must never appear here —
    /// callers pass ids, amounts, and error tags only.
    pub details: serde_json::Value,
    pub at: DateTime<Utc>,
}

impl SecurityEvent {
    pub fn new(
        event_type: impl Into<String>,
        severity: Severity,
        user_id: Option<&str>,
        details: serde_json::Value,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            severity,
            user_id: user_id.map(str::to_string),
            details,
            at,
        }
    }
}
