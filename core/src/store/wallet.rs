//! Wallet rows, PIN records, and the atomic ledger operations.

use super::WalletStore;
use crate::error::{WalletError, WalletResult};
use crate::types::{Millis, MinorUnits, TxnId, UserId};
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct WalletRow {
    pub user_id: UserId,
    pub email: String,
    pub balance: MinorUnits,
    pub total_earned: MinorUnits,
    pub total_spent: MinorUnits,
    pub active: bool,
    pub created_at: Millis,
}

#[derive(Debug, Clone)]
pub struct PinRow {
    pub pin_hash: String,
    pub salt: String,
}

/// Result of the atomic transfer unit: both post-transfer balances plus
/// the shared reference id written on the two transaction rows.
#[derive(Debug, Clone)]
pub struct TransferRows {
    pub reference_id: String,
    pub sender_new_balance: MinorUnits,
    pub recipient_new_balance: MinorUnits,
}

const WALLET_COLS: &str = "user_id, email, balance, total_earned, total_spent, active, created_at";

fn row_to_wallet(row: &rusqlite::Row) -> rusqlite::Result<WalletRow> {
    Ok(WalletRow {
        user_id: row.get(0)?,
        email: row.get(1)?,
        balance: row.get(2)?,
        total_earned: row.get(3)?,
        total_spent: row.get(4)?,
        active: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
    })
}

impl WalletStore {
    pub fn create_wallet(
        &self,
        user_id: &str,
        email: &str,
        initial_balance: MinorUnits,
        now: Millis,
    ) -> WalletResult<()> {
        self.lock().execute(
            "INSERT INTO wallet (user_id, email, balance, total_earned, total_spent, active, created_at)
             VALUES (?1, ?2, ?3, ?3, 0, 1, ?4)",
            params![user_id, email, initial_balance, now],
        )?;
        Ok(())
    }

    pub fn wallet_by_id(&self, user_id: &str) -> WalletResult<Option<WalletRow>> {
        let row = self
            .lock()
            .query_row(
                &format!("SELECT {WALLET_COLS} FROM wallet WHERE user_id = ?1"),
                params![user_id],
                |row| row_to_wallet(row),
            )
            .optional()?;
        Ok(row)
    }

    pub fn wallet_by_email(&self, email: &str) -> WalletResult<Option<WalletRow>> {
        let row = self
            .lock()
            .query_row(
                &format!("SELECT {WALLET_COLS} FROM wallet WHERE email = ?1"),
                params![email],
                |row| row_to_wallet(row),
            )
            .optional()?;
        Ok(row)
    }

    pub fn set_wallet_active(&self, user_id: &str, active: bool) -> WalletResult<()> {
        self.lock().execute(
            "UPDATE wallet SET active = ?1 WHERE user_id = ?2",
            params![active as i64, user_id],
        )?;
        Ok(())
    }

    // ── PIN record ─────────────────────────────────────────────

    pub fn pin_record(&self, user_id: &str) -> WalletResult<Option<PinRow>> {
        let row = self
            .lock()
            .query_row(
                "SELECT pin_hash, salt FROM transaction_pin WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(PinRow {
                        pin_hash: row.get(0)?,
                        salt: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn upsert_pin(
        &self,
        user_id: &str,
        pin_hash: &str,
        salt: &str,
        now: Millis,
    ) -> WalletResult<()> {
        self.lock().execute(
            "INSERT INTO transaction_pin (user_id, pin_hash, salt, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
               pin_hash = excluded.pin_hash,
               salt = excluded.salt,
               updated_at = excluded.updated_at",
            params![user_id, pin_hash, salt, now],
        )?;
        Ok(())
    }

    // ── Atomic ledger operations ───────────────────────────────

    /// The atomic transfer unit: conditional debit, credit, running
    /// counters, and both transaction rows commit together or not at all.
    /// The conditional UPDATE is what holds the non-negative balance
    /// invariant under concurrency — there is no read-then-write gap.
    pub fn transfer_funds(
        &self,
        sender_id: &str,
        recipient_id: &str,
        amount: MinorUnits,
        description: Option<&str>,
        now: Millis,
    ) -> WalletResult<TransferRows> {
        let reference_id = format!("TRF_{}", Uuid::new_v4().simple());
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let debited = tx.execute(
            "UPDATE wallet
             SET balance = balance - ?1, total_spent = total_spent + ?1
             WHERE user_id = ?2 AND balance >= ?1",
            params![amount, sender_id],
        )?;
        if debited == 0 {
            return Err(WalletError::InsufficientFunds);
        }

        tx.execute(
            "UPDATE wallet
             SET balance = balance + ?1, total_earned = total_earned + ?1
             WHERE user_id = ?2",
            params![amount, recipient_id],
        )?;

        for (user, txn_type) in [(sender_id, "transfer_out"), (recipient_id, "transfer_in")] {
            tx.execute(
                "INSERT INTO wallet_txn
                   (txn_id, user_id, card_id, txn_type, amount, status, description,
                    reference_id, merchant_info, created_at)
                 VALUES (?1, ?2, NULL, ?3, ?4, 'completed', ?5, ?6, NULL, ?7)",
                params![
                    Uuid::new_v4().to_string(),
                    user,
                    txn_type,
                    amount,
                    description,
                    reference_id,
                    now
                ],
            )?;
        }

        let balance_of = |user: &str| -> rusqlite::Result<MinorUnits> {
            tx.query_row(
                "SELECT balance FROM wallet WHERE user_id = ?1",
                params![user],
                |row| row.get(0),
            )
        };
        let sender_new_balance = balance_of(sender_id)?;
        let recipient_new_balance = balance_of(recipient_id)?;

        tx.commit()?;
        Ok(TransferRows {
            reference_id,
            sender_new_balance,
            recipient_new_balance,
        })
    }

    /// Credit a wallet (top-up from an external source). Writes a
    /// `transfer_in` row carrying the caller's reference id.
    pub fn credit_wallet(
        &self,
        user_id: &str,
        amount: MinorUnits,
        description: Option<&str>,
        reference_id: &str,
        now: Millis,
    ) -> WalletResult<TxnId> {
        let txn_id = Uuid::new_v4().to_string();
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "UPDATE wallet
             SET balance = balance + ?1, total_earned = total_earned + ?1
             WHERE user_id = ?2",
            params![amount, user_id],
        )?;
        tx.execute(
            "INSERT INTO wallet_txn
               (txn_id, user_id, card_id, txn_type, amount, status, description,
                reference_id, merchant_info, created_at)
             VALUES (?1, ?2, NULL, 'transfer_in', ?3, 'completed', ?4, ?5, NULL, ?6)",
            params![txn_id, user_id, amount, description, reference_id, now],
        )?;
        tx.commit()?;
        Ok(txn_id)
    }

    /// Conditional debit (deduction toward an external obligation).
    /// Fails with `InsufficientFunds` when the balance cannot cover it.
    pub fn debit_wallet(
        &self,
        user_id: &str,
        amount: MinorUnits,
        description: Option<&str>,
        reference_id: &str,
        now: Millis,
    ) -> WalletResult<TxnId> {
        let txn_id = Uuid::new_v4().to_string();
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let debited = tx.execute(
            "UPDATE wallet
             SET balance = balance - ?1, total_spent = total_spent + ?1
             WHERE user_id = ?2 AND balance >= ?1",
            params![amount, user_id],
        )?;
        if debited == 0 {
            return Err(WalletError::InsufficientFunds);
        }
        tx.execute(
            "INSERT INTO wallet_txn
               (txn_id, user_id, card_id, txn_type, amount, status, description,
                reference_id, merchant_info, created_at)
             VALUES (?1, ?2, NULL, 'transfer_out', ?3, 'completed', ?4, ?5, NULL, ?6)",
            params![txn_id, user_id, amount, description, reference_id, now],
        )?;
        tx.commit()?;
        Ok(txn_id)
    }
}
