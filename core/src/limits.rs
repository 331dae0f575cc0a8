//! Spend-limit ledger reader. Read-only: computes remaining allowance
//! from a card's limits and spent-to-date counters. Mutation happens only
//! through the authorizer's conditional consume.

use crate::clock::Clock;
use crate::error::{WalletError, WalletResult};
use crate::store::{CardRow, WalletStore};
use crate::types::MinorUnits;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LimitStatus {
    pub daily_limit: MinorUnits,
    pub monthly_limit: MinorUnits,
    pub daily_remaining: MinorUnits,
    pub monthly_remaining: MinorUnits,
    /// False when a counter already sits over its limit (possible after a
    /// limit decrease). Remaining values are clamped to 0 for reporting,
    /// but no new charge is valid in that state.
    pub valid: bool,
}

impl LimitStatus {
    pub fn from_card(card: &CardRow) -> Self {
        let daily_raw = card.daily_limit - card.current_daily_spent;
        let monthly_raw = card.monthly_limit - card.current_monthly_spent;
        Self {
            daily_limit: card.daily_limit,
            monthly_limit: card.monthly_limit,
            daily_remaining: daily_raw.max(0),
            monthly_remaining: monthly_raw.max(0),
            valid: daily_raw >= 0 && monthly_raw >= 0,
        }
    }

    /// True iff `amount` fits inside both remaining windows.
    pub fn validate(&self, amount: MinorUnits) -> bool {
        self.valid && amount <= self.daily_remaining && amount <= self.monthly_remaining
    }

    /// Which limit a too-large `amount` hits first. Daily wins ties —
    /// it is the narrower window.
    pub fn exceeded_by(&self, amount: MinorUnits) -> Option<WalletError> {
        if amount > self.daily_remaining {
            Some(WalletError::DailyLimitExceeded)
        } else if amount > self.monthly_remaining {
            Some(WalletError::MonthlyLimitExceeded)
        } else {
            None
        }
    }
}

/// UTC day marker for the daily spend window.
pub fn day_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// UTC month marker for the monthly spend window.
pub fn month_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}

pub struct SpendLimits {
    store: WalletStore,
    clock: Arc<dyn Clock>,
}

impl SpendLimits {
    pub fn new(store: WalletStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Remaining allowance for an owner's card. Idempotent: calling twice
    /// without an intervening transaction returns identical values.
    pub fn remaining(&self, user_id: &str, card_id: &str) -> WalletResult<LimitStatus> {
        let now = self.clock.now();
        let card = self
            .store
            .card_by_id(user_id, card_id, &day_key(now), &month_key(now))?
            .ok_or(WalletError::CardNotFound)?;
        Ok(LimitStatus::from_card(&card))
    }
}
