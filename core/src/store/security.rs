//! Security event log, rate-limit counters, and notifications.

use super::WalletStore;
use crate::error::WalletResult;
use crate::security_event::SecurityEvent;
use crate::types::Millis;
use rusqlite::{params, TransactionBehavior};

#[derive(Debug, Clone)]
pub struct SecurityEventRow {
    pub id: i64,
    pub event_type: String,
    pub severity: String,
    pub user_id: Option<String>,
    pub details: String,
    pub created_at: Millis,
}

#[derive(Debug, Clone)]
pub struct NotificationRow {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub created_at: Millis,
}

impl WalletStore {
    // ── Security event log ─────────────────────────────────────

    /// Append an event and prune the log to the newest `retention` rows.
    pub fn append_security_event(
        &self,
        event: &SecurityEvent,
        retention: usize,
    ) -> WalletResult<()> {
        let details = serde_json::to_string(&event.details)?;
        let conn = self.lock();
        conn.execute(
            "INSERT INTO security_event (event_type, severity, user_id, details, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.event_type,
                event.severity.as_str(),
                event.user_id,
                details,
                event.at.timestamp_millis()
            ],
        )?;
        conn.execute(
            "DELETE FROM security_event
             WHERE id NOT IN (SELECT id FROM security_event ORDER BY id DESC LIMIT ?1)",
            params![retention as i64],
        )?;
        Ok(())
    }

    /// Events at or after `cutoff_ms`, oldest first.
    pub fn security_events_since(&self, cutoff_ms: Millis) -> WalletResult<Vec<SecurityEventRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, event_type, severity, user_id, details, created_at
             FROM security_event WHERE created_at >= ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![cutoff_ms], |row| {
                Ok(SecurityEventRow {
                    id: row.get(0)?,
                    event_type: row.get(1)?,
                    severity: row.get(2)?,
                    user_id: row.get(3)?,
                    details: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_security_events_since(&self, cutoff_ms: Millis) -> WalletResult<i64> {
        let count = self.lock().query_row(
            "SELECT COUNT(*) FROM security_event WHERE created_at >= ?1",
            params![cutoff_ms],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn security_event_count(&self) -> WalletResult<i64> {
        let count = self
            .lock()
            .query_row("SELECT COUNT(*) FROM security_event", [], |row| row.get(0))?;
        Ok(count)
    }

    // ── Rate limiter counters ──────────────────────────────────

    /// Fixed-window check-and-increment for `key`, atomic at the database.
    /// Opens a fresh window on first use or after the window end passes;
    /// inside the window, increments and allows while count < max; at the
    /// cap, denies without incrementing further.
    pub fn rate_limit_check(
        &self,
        key: &str,
        max_requests: i64,
        window_ms: Millis,
        now_ms: Millis,
    ) -> WalletResult<bool> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<(Millis, i64)> = {
            use rusqlite::OptionalExtension;
            tx.query_row(
                "SELECT window_start, count FROM rate_limit WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
        };

        let allowed = match existing {
            None => {
                tx.execute(
                    "INSERT INTO rate_limit (key, window_start, count) VALUES (?1, ?2, 1)",
                    params![key, now_ms],
                )?;
                true
            }
            Some((window_start, _)) if now_ms >= window_start + window_ms => {
                // Window elapsed: open a fresh one at `now`.
                tx.execute(
                    "UPDATE rate_limit SET window_start = ?1, count = 1 WHERE key = ?2",
                    params![now_ms, key],
                )?;
                true
            }
            Some((_, count)) if count >= max_requests => false,
            Some(_) => {
                tx.execute(
                    "UPDATE rate_limit SET count = count + 1 WHERE key = ?1",
                    params![key],
                )?;
                true
            }
        };

        tx.commit()?;
        Ok(allowed)
    }

    // ── Notifications ──────────────────────────────────────────

    pub fn insert_notification(
        &self,
        user_id: &str,
        title: &str,
        message: &str,
        kind: &str,
        now: Millis,
    ) -> WalletResult<()> {
        self.lock().execute(
            "INSERT INTO notification (user_id, title, message, kind, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, title, message, kind, now],
        )?;
        Ok(())
    }

    pub fn notifications_for_user(&self, user_id: &str) -> WalletResult<Vec<NotificationRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, message, kind, created_at
             FROM notification WHERE user_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(NotificationRow {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    title: row.get(2)?,
                    message: row.get(3)?,
                    kind: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
