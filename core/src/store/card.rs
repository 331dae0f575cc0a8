//! Card rows, spend windows, and the conditional limit-consumption UPDATE.

use super::WalletStore;
use crate::error::WalletResult;
use crate::types::{CardId, Millis, MinorUnits, UserId};
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    Active,
    Inactive,
    Blocked,
    Expired,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Blocked => "blocked",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "blocked" => Some(Self::Blocked),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CardRow {
    pub card_id: CardId,
    pub user_id: UserId,
    pub card_number: String,
    pub masked_number: String,
    pub status: CardStatus,
    /// 'YYYY-MM'. Expiry is a read-time check, not a stored transition.
    pub expiry: String,
    pub daily_limit: MinorUnits,
    pub monthly_limit: MinorUnits,
    pub current_daily_spent: MinorUnits,
    pub current_monthly_spent: MinorUnits,
    pub pin_hash: String,
    pub salt: String,
    pub created_at: Millis,
    pub last_used_at: Option<Millis>,
}

const CARD_COLS: &str = "card_id, user_id, card_number, masked_number, status, expiry, \
     daily_limit, monthly_limit, current_daily_spent, current_monthly_spent, \
     pin_hash, salt, created_at, last_used_at";

fn row_to_card(row: &rusqlite::Row) -> rusqlite::Result<CardRow> {
    let status: String = row.get(4)?;
    Ok(CardRow {
        card_id: row.get(0)?,
        user_id: row.get(1)?,
        card_number: row.get(2)?,
        masked_number: row.get(3)?,
        status: CardStatus::parse(&status).unwrap_or(CardStatus::Blocked),
        expiry: row.get(5)?,
        daily_limit: row.get(6)?,
        monthly_limit: row.get(7)?,
        current_daily_spent: row.get(8)?,
        current_monthly_spent: row.get(9)?,
        pin_hash: row.get(10)?,
        salt: row.get(11)?,
        created_at: row.get(12)?,
        last_used_at: row.get(13)?,
    })
}

impl WalletStore {
    #[allow(clippy::too_many_arguments)]
    pub fn insert_card(
        &self,
        card_id: &str,
        user_id: &str,
        card_number: &str,
        masked_number: &str,
        expiry: &str,
        daily_limit: MinorUnits,
        monthly_limit: MinorUnits,
        pin_hash: &str,
        salt: &str,
        day: &str,
        month: &str,
        now: Millis,
    ) -> WalletResult<()> {
        self.lock().execute(
            "INSERT INTO card
               (card_id, user_id, card_number, masked_number, status, expiry,
                daily_limit, monthly_limit, current_daily_spent, current_monthly_spent,
                spent_day, spent_month, pin_hash, salt, created_at)
             VALUES (?1, ?2, ?3, ?4, 'active', ?5, ?6, ?7, 0, 0, ?8, ?9, ?10, ?11, ?12)",
            params![
                card_id,
                user_id,
                card_number,
                masked_number,
                expiry,
                daily_limit,
                monthly_limit,
                day,
                month,
                pin_hash,
                salt,
                now
            ],
        )?;
        Ok(())
    }

    /// Look up a card by its full number, rolling stale spend windows
    /// first so the returned counters are current.
    pub fn card_by_number(
        &self,
        card_number: &str,
        day: &str,
        month: &str,
    ) -> WalletResult<Option<CardRow>> {
        self.roll_spend_windows_by("card_number", card_number, day, month)?;
        let row = self
            .lock()
            .query_row(
                &format!("SELECT {CARD_COLS} FROM card WHERE card_number = ?1"),
                params![card_number],
                row_to_card,
            )
            .optional()?;
        Ok(row)
    }

    /// Owner-scoped lookup by card id, windows rolled.
    pub fn card_by_id(
        &self,
        user_id: &str,
        card_id: &str,
        day: &str,
        month: &str,
    ) -> WalletResult<Option<CardRow>> {
        self.roll_spend_windows_by("card_id", card_id, day, month)?;
        let row = self
            .lock()
            .query_row(
                &format!("SELECT {CARD_COLS} FROM card WHERE card_id = ?1 AND user_id = ?2"),
                params![card_id, user_id],
                row_to_card,
            )
            .optional()?;
        Ok(row)
    }

    pub fn cards_for_user(&self, user_id: &str) -> WalletResult<Vec<CardRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CARD_COLS} FROM card WHERE user_id = ?1 ORDER BY created_at DESC"
        ))?;
        let rows = stmt
            .query_map(params![user_id], row_to_card)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Zero the daily/monthly counters when the UTC day/month has rolled
    /// past the stored window marker. Lazy: runs on read and on consume,
    /// no scheduled job needed.
    fn roll_spend_windows_by(
        &self,
        key_col: &str,
        key: &str,
        day: &str,
        month: &str,
    ) -> WalletResult<()> {
        debug_assert!(key_col == "card_id" || key_col == "card_number");
        let conn = self.lock();
        conn.execute(
            &format!(
                "UPDATE card SET current_daily_spent = 0, spent_day = ?1
                 WHERE {key_col} = ?2 AND spent_day <> ?1"
            ),
            params![day, key],
        )?;
        conn.execute(
            &format!(
                "UPDATE card SET current_monthly_spent = 0, spent_month = ?1
                 WHERE {key_col} = ?2 AND spent_month <> ?1"
            ),
            params![month, key],
        )?;
        Ok(())
    }

    /// The atomic check-and-increment for spend limits. A single
    /// conditional UPDATE: two concurrent payments can never both pass,
    /// because whichever commits second no longer satisfies the WHERE
    /// clause. Returns false when the amount would exceed either limit.
    pub fn try_consume_limits(
        &self,
        card_id: &str,
        amount: MinorUnits,
        day: &str,
        month: &str,
        now: Millis,
    ) -> WalletResult<bool> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "UPDATE card SET current_daily_spent = 0, spent_day = ?1
             WHERE card_id = ?2 AND spent_day <> ?1",
            params![day, card_id],
        )?;
        tx.execute(
            "UPDATE card SET current_monthly_spent = 0, spent_month = ?1
             WHERE card_id = ?2 AND spent_month <> ?1",
            params![month, card_id],
        )?;
        let consumed = tx.execute(
            "UPDATE card
             SET current_daily_spent = current_daily_spent + ?1,
                 current_monthly_spent = current_monthly_spent + ?1,
                 last_used_at = ?2
             WHERE card_id = ?3
               AND current_daily_spent + ?1 <= daily_limit
               AND current_monthly_spent + ?1 <= monthly_limit",
            params![amount, now, card_id],
        )?;
        tx.commit()?;
        Ok(consumed == 1)
    }

    pub fn update_card_status(&self, card_id: &str, status: CardStatus) -> WalletResult<()> {
        self.lock().execute(
            "UPDATE card SET status = ?1 WHERE card_id = ?2",
            params![status.as_str(), card_id],
        )?;
        Ok(())
    }
}
