//! Security event monitor: append-only recording of typed events plus
//! continuous evaluation against the static threat pattern table.
//!
//! RULES:
//!   - Recording is best-effort. Nothing in here may fail the operation
//!     being observed; internal errors are swallowed and logged.
//!   - The log is the store's security_event table, pruned to the most
//!     recent N rows. Pattern evaluation reads a snapshot of the window
//!     and may see slightly stale data — thresholds are triggers, not
//!     hard guarantees.
//!   - Raw PINs never appear in any event detail. Callers pass ids,
//!     amounts, and error tags only.

use crate::clock::Clock;
use crate::config::{MonitorConfig, ThreatAction, ThreatPattern};
use crate::error::WalletResult;
use crate::notify::{Notifier, NotifyKind};
use crate::security_event::{SecurityEvent, Severity};
use crate::store::{SecurityEventRow, WalletStore};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;

#[derive(Debug, Clone, Serialize)]
pub struct SecurityMetrics {
    pub failed_login_attempts: usize,
    pub suspicious_transactions: usize,
    pub rate_limit_hits: usize,
    pub anomalous_patterns: usize,
    pub last_threat_detected: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityReport {
    pub summary: SecurityMetrics,
    pub recent_threats: Vec<ThreatSummary>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreatSummary {
    pub event_type: String,
    pub severity: String,
    pub user_id: Option<String>,
    pub at: DateTime<Utc>,
}

pub struct SecurityMonitor {
    store: WalletStore,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    config: MonitorConfig,
    subscribers: Mutex<Vec<mpsc::Sender<SecurityEvent>>>,
}

impl SecurityMonitor {
    pub fn new(
        store: WalletStore,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
            config,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register an alert subscriber. Every high/critical event is sent on
    /// the returned channel, synchronously at record time. Disconnected
    /// receivers are dropped on the next publish.
    pub fn subscribe(&self) -> mpsc::Receiver<SecurityEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Record an event and evaluate threat patterns. Never propagates an
    /// error to the caller.
    pub fn record(&self, event: SecurityEvent) {
        if let Err(e) = self.record_inner(&event, true) {
            log::warn!("security monitor failed to record {}: {e}", event.event_type);
        }
    }

    /// Convenience used all over the authorization paths.
    pub fn record_event(
        &self,
        event_type: &str,
        severity: Severity,
        user_id: Option<&str>,
        details: serde_json::Value,
    ) {
        let event = SecurityEvent::new(event_type, severity, user_id, details, self.clock.now());
        self.record(event);
    }

    fn record_inner(&self, event: &SecurityEvent, evaluate: bool) -> WalletResult<()> {
        self.store
            .append_security_event(event, self.config.retention)?;
        log::debug!(
            "[security] {} severity={} user={:?}",
            event.event_type,
            event.severity.as_str(),
            event.user_id
        );

        if event.severity.is_alerting() {
            self.publish(event);
        }
        if evaluate {
            self.evaluate_patterns()?;
        }
        Ok(())
    }

    // ── Threat evaluation ──────────────────────────────────────

    fn evaluate_patterns(&self) -> WalletResult<()> {
        let now = self.clock.now();
        for pattern in &self.config.patterns {
            let cutoff = now - Duration::minutes(pattern.window_minutes);
            let recent = self.store.security_events_since(cutoff.timestamp_millis())?;

            // One detection per pattern per window: if a synthetic threat
            // event for this pattern already sits inside the window, the
            // alarm has fired and refiring would only spam responders.
            let threat_type = format!("threat_detected_{}", pattern.pattern_type);
            if recent.iter().any(|e| e.event_type == threat_type) {
                continue;
            }

            let matching: Vec<&SecurityEventRow> = recent
                .iter()
                .filter(|e| !e.event_type.starts_with("threat_detected"))
                .filter(|e| self.matches_pattern(e, &pattern.pattern_type))
                .collect();

            if matching.len() >= pattern.threshold {
                self.handle_threat(pattern, &matching, now)?;
            }
        }
        Ok(())
    }

    /// The pattern predicates are substring matches over event type tags,
    /// plus detail fields where the tag alone is not enough.
    fn matches_pattern(&self, event: &SecurityEventRow, pattern_type: &str) -> bool {
        let t = event.event_type.as_str();
        match pattern_type {
            "rapid_failed_logins" => t.contains("login_failed") || t.contains("auth_failed"),
            "unusual_transfer_amounts" => {
                t.contains("transfer")
                    && detail_i64(&event.details, "amount")
                        .is_some_and(|a| a > self.config.unusual_transfer_amount)
            }
            "multiple_pin_failures" => t.contains("pin") && t.contains("failed"),
            "rapid_api_requests" => t.contains("api_") || t.contains("payment_"),
            "suspicious_geolocation" => {
                t.contains("login") && detail_bool(&event.details, "suspicious_location")
            }
            _ => false,
        }
    }

    fn handle_threat(
        &self,
        pattern: &ThreatPattern,
        matching: &[&SecurityEventRow],
        now: DateTime<Utc>,
    ) -> WalletResult<()> {
        let affected_user = matching.iter().find_map(|e| e.user_id.clone());

        let threat = SecurityEvent::new(
            format!("threat_detected_{}", pattern.pattern_type),
            Severity::Critical,
            affected_user.as_deref(),
            serde_json::json!({
                "pattern_type": pattern.pattern_type,
                "event_count": matching.len(),
                "threshold": pattern.threshold,
                "window_minutes": pattern.window_minutes,
                "action": pattern.action,
            }),
            now,
        );
        // Appended without re-evaluation: a threat event must never feed
        // the pattern that produced it.
        self.record_inner(&threat, false)?;

        self.execute_response(pattern, affected_user.as_deref(), now)?;
        Ok(())
    }

    fn execute_response(
        &self,
        pattern: &ThreatPattern,
        user_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> WalletResult<()> {
        match pattern.action {
            ThreatAction::Log => {}
            ThreatAction::Warn => {
                if let Some(user) = user_id {
                    self.notifier.notify(
                        user,
                        "Security Warning",
                        "We detected unusual activity on your account. \
                         Please review your recent transactions.",
                        NotifyKind::Warning,
                    );
                }
            }
            ThreatAction::Block => {
                if let Some(user) = user_id {
                    self.store.set_wallet_active(user, false)?;
                    self.record_inner(
                        &SecurityEvent::new(
                            "user_blocked_automatically",
                            Severity::High,
                            Some(user),
                            serde_json::json!({ "reason": pattern.pattern_type }),
                            now,
                        ),
                        false,
                    )?;
                    self.notifier.notify(
                        user,
                        "Security Alert",
                        "Your account has been temporarily secured due to \
                         suspicious activity. Please contact support.",
                        NotifyKind::Security,
                    );
                }
            }
            ThreatAction::Escalate => {
                // Operator-visible alert; the account stays usable.
                log::warn!(
                    "SECURITY ESCALATION: pattern={} user={:?}",
                    pattern.pattern_type,
                    user_id
                );
                self.record_inner(
                    &SecurityEvent::new(
                        "threat_escalated",
                        Severity::High,
                        user_id,
                        serde_json::json!({ "pattern_type": pattern.pattern_type }),
                        now,
                    ),
                    false,
                )?;
            }
        }
        Ok(())
    }

    fn publish(&self, event: &SecurityEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    // ── Periodic sweep ─────────────────────────────────────────

    /// Safety net independent of per-event evaluation: flag a burst of
    /// overall activity the individual patterns might not catch. Meant to
    /// run on a fixed schedule (see `spawn_sweeper`).
    pub fn sweep(&self) {
        let now = self.clock.now();
        let hour_ago = (now - Duration::hours(1)).timestamp_millis();
        let count = match self.store.count_security_events_since(hour_ago) {
            Ok(c) => c as usize,
            Err(e) => {
                log::warn!("security sweep failed: {e}");
                return;
            }
        };
        if count > self.config.sweep_activity_threshold {
            self.record(SecurityEvent::new(
                "high_activity_detected",
                Severity::Medium,
                None,
                serde_json::json!({ "event_count": count, "window": "1 hour" }),
                now,
            ));
        }
    }

    // ── Reporting ──────────────────────────────────────────────

    pub fn metrics(&self) -> WalletResult<SecurityMetrics> {
        let now = self.clock.now();
        let hour_ago = (now - Duration::hours(1)).timestamp_millis();
        let recent = self.store.security_events_since(hour_ago)?;

        // The retention window bounds how far back the last threat can be seen.
        let retained = self.store.security_events_since(0)?;
        let last_threat_detected = retained
            .iter()
            .filter(|e| e.event_type.contains("threat_detected"))
            .last()
            .and_then(|e| DateTime::from_timestamp_millis(e.created_at));

        Ok(SecurityMetrics {
            failed_login_attempts: recent
                .iter()
                .filter(|e| {
                    e.event_type.contains("login_failed") || e.event_type.contains("auth_failed")
                })
                .count(),
            suspicious_transactions: recent
                .iter()
                .filter(|e| e.event_type.contains("transfer") && e.severity != "low")
                .count(),
            rate_limit_hits: recent
                .iter()
                .filter(|e| e.event_type.contains("rate_limit"))
                .count(),
            anomalous_patterns: recent
                .iter()
                .filter(|e| e.event_type.contains("threat_detected"))
                .count(),
            last_threat_detected,
        })
    }

    pub fn report(&self) -> WalletResult<SecurityReport> {
        let summary = self.metrics()?;
        let now = self.clock.now();
        let day_ago = (now - Duration::hours(24)).timestamp_millis();
        let recent_threats: Vec<ThreatSummary> = self
            .store
            .security_events_since(day_ago)?
            .into_iter()
            .filter(|e| e.severity == "high" || e.severity == "critical")
            .map(|e| ThreatSummary {
                event_type: e.event_type,
                severity: e.severity,
                user_id: e.user_id,
                at: DateTime::from_timestamp_millis(e.created_at).unwrap_or(now),
            })
            .collect();

        let mut recommendations = Vec::new();
        if summary.failed_login_attempts > 10 {
            recommendations.push("Consider adding CAPTCHA to login attempts".to_string());
        }
        if summary.suspicious_transactions > 5 {
            recommendations.push("Review and tighten transaction validation rules".to_string());
        }
        if summary.rate_limit_hits > 20 {
            recommendations.push("Consider adjusting rate limiting thresholds".to_string());
        }
        if !recent_threats.is_empty() {
            recommendations.push("Immediate review of threat patterns required".to_string());
        }
        if recommendations.is_empty() {
            recommendations.push("Security posture appears normal".to_string());
        }

        Ok(SecurityReport {
            summary,
            recent_threats,
            recommendations,
        })
    }
}

fn detail_i64(details_json: &str, field: &str) -> Option<i64> {
    let value: serde_json::Value = serde_json::from_str(details_json).ok()?;
    value.get(field)?.as_i64()
}

fn detail_bool(details_json: &str, field: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(details_json)
        .ok()
        .and_then(|v| v.get(field).and_then(|b| b.as_bool()))
        .unwrap_or(false)
}

// ── Background sweeper ─────────────────────────────────────────

pub struct SweeperHandle {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}

/// Run `monitor.sweep()` every `interval` on a background thread until
/// the handle is stopped.
pub fn spawn_sweeper(
    monitor: Arc<SecurityMonitor>,
    interval: std::time::Duration,
) -> SweeperHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    let handle = std::thread::spawn(move || {
        // Short sleep steps so stop() is responsive even with long intervals.
        let step = interval.min(std::time::Duration::from_millis(200));
        let mut elapsed = std::time::Duration::ZERO;
        while !stop_flag.load(Ordering::Relaxed) {
            std::thread::sleep(step);
            elapsed += step;
            if elapsed >= interval {
                monitor.sweep();
                elapsed = std::time::Duration::ZERO;
            }
        }
    });
    SweeperHandle { stop, handle }
}
