//! Transaction rows. Immutable once written with `completed` status.

use super::WalletStore;
use crate::error::WalletResult;
use crate::types::{Millis, MinorUnits, TxnId, UserId};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnType {
    Purchase,
    Refund,
    TransferOut,
    TransferIn,
    Validation,
    Activation,
    Deactivation,
}

impl TxnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Refund => "refund",
            Self::TransferOut => "transfer_out",
            Self::TransferIn => "transfer_in",
            Self::Validation => "validation",
            Self::Activation => "activation",
            Self::Deactivation => "deactivation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "purchase" => Some(Self::Purchase),
            "refund" => Some(Self::Refund),
            "transfer_out" => Some(Self::TransferOut),
            "transfer_in" => Some(Self::TransferIn),
            "validation" => Some(Self::Validation),
            "activation" => Some(Self::Activation),
            "deactivation" => Some(Self::Deactivation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TxnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TxnRow {
    pub txn_id: TxnId,
    pub user_id: UserId,
    pub card_id: Option<String>,
    pub txn_type: TxnType,
    pub amount: MinorUnits,
    pub status: TxnStatus,
    pub description: Option<String>,
    pub reference_id: Option<String>,
    /// JSON blob: merchant id plus whatever context the caller attached.
    pub merchant_info: Option<String>,
    pub created_at: Millis,
}

const TXN_COLS: &str = "txn_id, user_id, card_id, txn_type, amount, status, description, \
     reference_id, merchant_info, created_at";

fn row_to_txn(row: &rusqlite::Row) -> rusqlite::Result<TxnRow> {
    let txn_type: String = row.get(3)?;
    let status: String = row.get(5)?;
    Ok(TxnRow {
        txn_id: row.get(0)?,
        user_id: row.get(1)?,
        card_id: row.get(2)?,
        txn_type: TxnType::parse(&txn_type).unwrap_or(TxnType::Validation),
        amount: row.get(4)?,
        status: TxnStatus::parse(&status).unwrap_or(TxnStatus::Failed),
        description: row.get(6)?,
        reference_id: row.get(7)?,
        merchant_info: row.get(8)?,
        created_at: row.get(9)?,
    })
}

impl WalletStore {
    /// Write a completed transaction row and return its id.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_txn(
        &self,
        user_id: &str,
        card_id: Option<&str>,
        txn_type: TxnType,
        amount: MinorUnits,
        description: Option<&str>,
        reference_id: Option<&str>,
        merchant_info: Option<&str>,
        now: Millis,
    ) -> WalletResult<TxnId> {
        let txn_id = Uuid::new_v4().to_string();
        self.lock().execute(
            "INSERT INTO wallet_txn
               (txn_id, user_id, card_id, txn_type, amount, status, description,
                reference_id, merchant_info, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'completed', ?6, ?7, ?8, ?9)",
            params![
                txn_id,
                user_id,
                card_id,
                txn_type.as_str(),
                amount,
                description,
                reference_id,
                merchant_info,
                now
            ],
        )?;
        Ok(txn_id)
    }

    pub fn txns_for_user(&self, user_id: &str, limit: usize) -> WalletResult<Vec<TxnRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TXN_COLS} FROM wallet_txn
             WHERE user_id = ?1 ORDER BY created_at DESC, txn_id LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], row_to_txn)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn txns_for_card(&self, card_id: &str) -> WalletResult<Vec<TxnRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TXN_COLS} FROM wallet_txn
             WHERE card_id = ?1 ORDER BY created_at DESC, txn_id"
        ))?;
        let rows = stmt
            .query_map(params![card_id], row_to_txn)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Idempotency/correlation lookup.
    pub fn txn_by_reference(&self, reference_id: &str) -> WalletResult<Option<TxnRow>> {
        let row = self
            .lock()
            .query_row(
                &format!("SELECT {TXN_COLS} FROM wallet_txn WHERE reference_id = ?1 LIMIT 1"),
                params![reference_id],
                row_to_txn,
            )
            .optional()?;
        Ok(row)
    }
}
