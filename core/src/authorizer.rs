//! The card/PIN authorization state machine.
//!
//! ORDERING RULE (mandatory, never reordered): rate limit → validation →
//! authentication (PIN) → authorization (status, then limits) →
//! recording. A malformed amount never triggers a PIN check; a correct
//! PIN on a blocked card never reaches the limit check.
//!
//! Failure semantics: validation and authorization errors return to the
//! caller typed. Infrastructure errors are caught at this boundary,
//! logged, recorded as high-severity events, and surfaced as the generic
//! `Unavailable`. The monitor observes every path and can never fail an
//! operation.

use crate::card_number;
use crate::clock::Clock;
use crate::config::CoreConfig;
use crate::error::{WalletError, WalletResult};
use crate::limits::{day_key, month_key, LimitStatus, SpendLimits};
use crate::notify::Notifier;
use crate::pin;
use crate::rate_limiter::RateLimiter;
use crate::security_event::Severity;
use crate::security_monitor::SecurityMonitor;
use crate::store::{CardRow, CardStatus, TxnType, WalletStore};
use crate::types::{CardId, MinorUnits, TxnId};
use crate::validation::Validator;
use chrono::Months;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Where in the flow a call currently sits. Terminal states are
/// `Succeeded` and `Failed`; a failed flow re-enters at `Idle` on retry,
/// subject to rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    Idle,
    Validating,
    RecipientLookup,
    PinRequired,
    Verifying,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub reference_id: String,
    pub sender_new_balance: MinorUnits,
    pub recipient_new_balance: MinorUnits,
    pub pin_verified: bool,
}

/// Discriminated transfer result. `PinRequired` is a state handed back to
/// the caller, not an error: the flow resumes when the caller retries
/// with a PIN.
#[derive(Debug, Clone, Serialize)]
pub enum TransferOutcome {
    Completed(TransferReceipt),
    PinRequired,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub transaction_id: TxnId,
    pub reference_id: String,
    pub limits: LimitStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardIssued {
    pub card_id: CardId,
    /// Full number and CVV are returned exactly once, at issuance.
    pub card_number: String,
    pub cvv: String,
    pub masked_number: String,
    pub expiry: String,
    pub daily_limit: MinorUnits,
    pub monthly_limit: MinorUnits,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardValidation {
    pub card_id: CardId,
    pub masked_number: String,
    pub limits: LimitStatus,
}

pub struct WalletAuthorizer {
    store: WalletStore,
    validator: Validator,
    rate_limiter: RateLimiter,
    limits: SpendLimits,
    monitor: Arc<SecurityMonitor>,
    clock: Arc<dyn Clock>,
    config: CoreConfig,
}

impl WalletAuthorizer {
    pub fn new(
        store: WalletStore,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        config: CoreConfig,
    ) -> Self {
        let monitor = Arc::new(SecurityMonitor::new(
            store.clone(),
            Arc::clone(&clock),
            notifier,
            config.monitor.clone(),
        ));
        Self {
            validator: Validator::new(config.validation.clone()),
            rate_limiter: RateLimiter::new(store.clone(), Arc::clone(&clock)),
            limits: SpendLimits::new(store.clone(), Arc::clone(&clock)),
            store,
            monitor,
            clock,
            config,
        }
    }

    /// Test constructor: in-memory database, migrated, manual clock at a
    /// fixed instant, store-backed notifier.
    pub fn build_test(config: CoreConfig) -> WalletResult<(Self, Arc<crate::clock::ManualClock>)> {
        use chrono::TimeZone;
        let store = WalletStore::in_memory()?;
        store.migrate()?;
        let clock = Arc::new(crate::clock::ManualClock::starting_at(
            chrono::Utc
                .with_ymd_and_hms(2026, 3, 15, 12, 0, 0)
                .single()
                .ok_or_else(|| WalletError::Other(anyhow::anyhow!("invalid test epoch")))?,
        ));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let notifier = Arc::new(crate::notify::StoreNotifier::new(
            store.clone(),
            Arc::clone(&dyn_clock),
        ));
        Ok((Self::new(store, dyn_clock, notifier, config), clock))
    }

    pub fn monitor(&self) -> &Arc<SecurityMonitor> {
        &self.monitor
    }

    pub fn store(&self) -> &WalletStore {
        &self.store
    }

    // ── Transfers ──────────────────────────────────────────────

    pub fn authorize_transfer(
        &self,
        sender_id: &str,
        recipient_email: &str,
        amount: MinorUnits,
        description: Option<&str>,
        pin: Option<&str>,
    ) -> WalletResult<TransferOutcome> {
        self.guard_infra("transfer", Some(sender_id), || {
            self.transfer_inner(sender_id, recipient_email, amount, description, pin)
        })
    }

    fn transfer_inner(
        &self,
        sender_id: &str,
        recipient_email: &str,
        amount: MinorUnits,
        description: Option<&str>,
        pin: Option<&str>,
    ) -> WalletResult<TransferOutcome> {
        self.monitor.record_event(
            "transfer_attempt",
            Severity::Low,
            Some(sender_id),
            json!({ "amount": amount }),
        );

        // 1. Rate limit before anything else — even invalid requests
        //    consume the sender's budget.
        if !self
            .rate_limiter
            .check(&format!("transfer_{sender_id}"), self.config.rate_limits.transfer)?
        {
            return Err(self.fail(
                "transfer_rate_limited",
                AuthPhase::Idle,
                Some(sender_id),
                WalletError::RateLimited,
                json!({}),
            ));
        }

        // 2. Validate and sanitize all inputs.
        let recipient_email = match self.validator.email(recipient_email) {
            Ok(email) => email,
            Err(e) => return Err(self.fail_validation("transfer", sender_id, e)),
        };
        if let Err(e) = self.validator.amount(amount) {
            return Err(self.fail_validation("transfer", sender_id, e));
        }
        let description = self.validator.description(description);

        // 3. Resolve recipient.
        let sender = self
            .store
            .wallet_by_id(sender_id)?
            .ok_or(WalletError::WalletNotFound)?;
        if !sender.active {
            return Err(self.fail(
                "transfer_failed",
                AuthPhase::Validating,
                Some(sender_id),
                WalletError::WalletInactive,
                json!({}),
            ));
        }
        let recipient = match self.store.wallet_by_email(&recipient_email)? {
            Some(w) => w,
            None => {
                return Err(self.fail(
                    "transfer_recipient_not_found",
                    AuthPhase::RecipientLookup,
                    Some(sender_id),
                    WalletError::RecipientNotFound,
                    json!({}),
                ))
            }
        };
        if recipient.user_id == sender.user_id {
            return Err(self.fail(
                "transfer_self_attempt",
                AuthPhase::RecipientLookup,
                Some(sender_id),
                WalletError::SelfTransfer,
                json!({}),
            ));
        }

        // 4. PIN policy: mandatory whenever a PIN record exists. Absence
        //    of the PIN is a state handed back to the caller, not an error.
        let pin_record = self.store.pin_record(sender_id)?;
        let pin_verified = match (&pin_record, pin) {
            (Some(_), None) => return Ok(TransferOutcome::PinRequired),
            (Some(record), Some(supplied)) => {
                if let Err(e) = self.validator.pin(supplied) {
                    return Err(self.fail_validation("transfer", sender_id, e));
                }
                if !pin::verify_pin(supplied, &record.salt, &record.pin_hash) {
                    return Err(self.fail_auth(
                        "transfer_pin_failed",
                        AuthPhase::Verifying,
                        Some(sender_id),
                        WalletError::InvalidPin,
                        json!({}),
                    ));
                }
                true
            }
            // A PIN supplied against an account with none set is a caller
            // bug, not a pass.
            (None, Some(_)) => {
                return Err(self.fail(
                    "transfer_failed",
                    AuthPhase::Verifying,
                    Some(sender_id),
                    WalletError::PinNotSet,
                    json!({}),
                ))
            }
            (None, None) => false,
        };

        // 5. The atomic ledger unit: verify balance, debit, credit, write
        //    both transaction rows. All-or-nothing at the store; no
        //    partial-failure compensation here.
        let rows = match self.store.transfer_funds(
            sender_id,
            &recipient.user_id,
            amount,
            description.as_deref(),
            self.clock.now_millis(),
        ) {
            Ok(rows) => rows,
            Err(e) => {
                return Err(self.fail(
                    "transfer_failed",
                    AuthPhase::Verifying,
                    Some(sender_id),
                    e,
                    json!({ "amount": amount }),
                ))
            }
        };

        // 6. Success event regardless of severity path above.
        self.monitor.record_event(
            "transfer_success",
            Severity::Low,
            Some(sender_id),
            json!({
                "reference_id": rows.reference_id,
                "amount": amount,
                "pin_verified": pin_verified,
            }),
        );

        Ok(TransferOutcome::Completed(TransferReceipt {
            reference_id: rows.reference_id,
            sender_new_balance: rows.sender_new_balance,
            recipient_new_balance: rows.recipient_new_balance,
            pin_verified,
        }))
    }

    // ── Card payments ──────────────────────────────────────────

    pub fn authorize_card_payment(
        &self,
        card_number: &str,
        pin_value: &str,
        amount: MinorUnits,
        merchant_id: &str,
        description: Option<&str>,
    ) -> WalletResult<PaymentReceipt> {
        self.guard_infra("payment", None, || {
            self.payment_inner(card_number, pin_value, amount, merchant_id, description)
        })
    }

    fn payment_inner(
        &self,
        raw_card_number: &str,
        pin_value: &str,
        amount: MinorUnits,
        merchant_id: &str,
        description: Option<&str>,
    ) -> WalletResult<PaymentReceipt> {
        self.monitor.record_event(
            "payment_attempt",
            Severity::Low,
            None,
            json!({ "amount": amount, "merchant_id": merchant_id }),
        );

        // 1. Validate formats. Card-number and PIN shape failures are both
        //    surfaced as InvalidPin — the caller never learns which half
        //    of card+PIN was wrong.
        let card_num = raw_card_number.trim().replace(' ', "");
        if card_num.len() != 16 || !card_num.bytes().all(|b| b.is_ascii_digit()) {
            return Err(self.fail(
                "payment_validation_error",
                AuthPhase::Validating,
                None,
                WalletError::InvalidPin,
                json!({ "reason": "card_number_format" }),
            ));
        }
        if self.validator.pin(pin_value).is_err() {
            return Err(self.fail(
                "payment_validation_error",
                AuthPhase::Validating,
                None,
                WalletError::InvalidPin,
                json!({ "reason": "pin_format" }),
            ));
        }
        if let Err(e) = self.validator.amount(amount) {
            return Err(self.fail_validation("payment", "", e));
        }

        // Card lookup; unknown numbers get the same masked answer as a
        // wrong PIN.
        let now = self.clock.now();
        let card = match self
            .store
            .card_by_number(&card_num, &day_key(now), &month_key(now))?
        {
            Some(card) => card,
            None => {
                return Err(self.fail_auth(
                    "card_validation_failed",
                    AuthPhase::Verifying,
                    None,
                    WalletError::InvalidPin,
                    json!({ "card": card_number::masked(&card_num) }),
                ))
            }
        };

        // Per-payer budget, checked as soon as the payer is known.
        if !self.rate_limiter.check(
            &format!("payment_{}", card.user_id),
            self.config.rate_limits.payment,
        )? {
            return Err(self.fail(
                "payment_rate_limited",
                AuthPhase::Idle,
                Some(&card.user_id),
                WalletError::RateLimited,
                json!({}),
            ));
        }

        // 2. Authenticate: PIN against this card's hash.
        if !pin::verify_pin(pin_value, &card.salt, &card.pin_hash) {
            return Err(self.fail_auth(
                "card_pin_failed",
                AuthPhase::Verifying,
                Some(&card.user_id),
                WalletError::InvalidPin,
                json!({ "card": card.masked_number }),
            ));
        }

        // 3. Authorize: status before limits, always.
        if let Err(e) = card_usable(&card, &month_key(now)) {
            return Err(self.fail(
                "card_payment_failed",
                AuthPhase::Verifying,
                Some(&card.user_id),
                e,
                json!({ "card": card.masked_number }),
            ));
        }

        // 4. Spend limits: pre-classify for the error, then consume via
        //    the store's single conditional UPDATE. A race that slips past
        //    the pre-check dies at the UPDATE, so two concurrent payments
        //    can never both pass.
        let status = LimitStatus::from_card(&card);
        if let Some(e) = status.exceeded_by(amount) {
            return Err(self.fail(
                "card_payment_failed",
                AuthPhase::Verifying,
                Some(&card.user_id),
                e,
                json!({ "card": card.masked_number, "amount": amount }),
            ));
        }
        if !self.store.try_consume_limits(
            &card.card_id,
            amount,
            &day_key(now),
            &month_key(now),
            now.timestamp_millis(),
        )? {
            let refreshed = self.limits.remaining(&card.user_id, &card.card_id)?;
            let e = refreshed
                .exceeded_by(amount)
                .unwrap_or(WalletError::DailyLimitExceeded);
            return Err(self.fail(
                "card_payment_failed",
                AuthPhase::Verifying,
                Some(&card.user_id),
                e,
                json!({ "card": card.masked_number, "amount": amount }),
            ));
        }

        // 5. Record.
        let reference_id = format!(
            "PAY_{}_{}",
            now.timestamp_millis(),
            &card.card_id[..8.min(card.card_id.len())]
        );
        let merchant_info = serde_json::to_string(&json!({ "merchant_id": merchant_id }))?;
        let transaction_id = self.store.insert_txn(
            &card.user_id,
            Some(&card.card_id),
            TxnType::Purchase,
            amount,
            self.validator.description(description).as_deref(),
            Some(&reference_id),
            Some(&merchant_info),
            now.timestamp_millis(),
        )?;

        let limits = self.limits.remaining(&card.user_id, &card.card_id)?;
        self.monitor.record_event(
            "payment_success",
            Severity::Low,
            Some(&card.user_id),
            json!({
                "transaction_id": transaction_id,
                "reference_id": reference_id,
                "amount": amount,
            }),
        );

        Ok(PaymentReceipt {
            transaction_id,
            reference_id,
            limits,
        })
    }

    /// Validate a card+PIN pair without charging anything. Writes a
    /// `validation` transaction row for the audit trail.
    pub fn validate_card(&self, raw_card_number: &str, pin_value: &str) -> WalletResult<CardValidation> {
        self.guard_infra("card_validation", None, || {
            let now = self.clock.now();
            let card_num = raw_card_number.trim().replace(' ', "");
            let card = match self
                .store
                .card_by_number(&card_num, &day_key(now), &month_key(now))?
            {
                Some(card) if pin::verify_pin(pin_value, &card.salt, &card.pin_hash) => card,
                Some(card) => {
                    return Err(self.fail_auth(
                        "card_pin_failed",
                        AuthPhase::Verifying,
                        Some(&card.user_id),
                        WalletError::InvalidPin,
                        json!({ "card": card.masked_number }),
                    ))
                }
                None => {
                    return Err(self.fail_auth(
                        "card_validation_failed",
                        AuthPhase::Verifying,
                        None,
                        WalletError::InvalidPin,
                        json!({}),
                    ))
                }
            };
            if let Err(e) = card_usable(&card, &month_key(now)) {
                return Err(self.fail(
                    "card_validation_failed",
                    AuthPhase::Verifying,
                    Some(&card.user_id),
                    e,
                    json!({ "card": card.masked_number }),
                ));
            }

            self.store.insert_txn(
                &card.user_id,
                Some(&card.card_id),
                TxnType::Validation,
                0,
                None,
                None,
                None,
                now.timestamp_millis(),
            )?;
            Ok(CardValidation {
                masked_number: card.masked_number.clone(),
                limits: LimitStatus::from_card(&card),
                card_id: card.card_id,
            })
        })
    }

    // ── Card lifecycle ─────────────────────────────────────────

    pub fn issue_card(
        &self,
        user_id: &str,
        pin_value: &str,
        daily_limit: Option<MinorUnits>,
        monthly_limit: Option<MinorUnits>,
    ) -> WalletResult<CardIssued> {
        self.guard_infra("card_issuance", Some(user_id), || {
            let wallet = self
                .store
                .wallet_by_id(user_id)?
                .ok_or(WalletError::WalletNotFound)?;
            if !wallet.active {
                return Err(self.fail(
                    "card_issuance_failed",
                    AuthPhase::Validating,
                    Some(user_id),
                    WalletError::WalletInactive,
                    json!({}),
                ));
            }
            self.validator.new_pin(pin_value)?;

            let daily_limit = daily_limit.unwrap_or(self.config.cards.default_daily_limit);
            let monthly_limit = monthly_limit.unwrap_or(self.config.cards.default_monthly_limit);
            if daily_limit <= 0 || monthly_limit <= 0 {
                return Err(WalletError::InvalidAmount);
            }

            let now = self.clock.now();
            let card_id = Uuid::new_v4().to_string();
            let number = card_number::derive_card_number(&card_id);
            let cvv = card_number::derive_cvv(&card_id);
            let masked = card_number::masked(&number);
            let expiry = (now + Months::new(self.config.cards.validity_months))
                .format("%Y-%m")
                .to_string();
            let salt = pin::new_salt();
            let pin_hash = pin::hash_pin(pin_value, &salt);

            self.store.insert_card(
                &card_id,
                user_id,
                &number,
                &masked,
                &expiry,
                daily_limit,
                monthly_limit,
                &pin_hash,
                &salt,
                &day_key(now),
                &month_key(now),
                now.timestamp_millis(),
            )?;
            self.store.insert_txn(
                user_id,
                Some(&card_id),
                TxnType::Activation,
                0,
                Some("Card issued"),
                None,
                None,
                now.timestamp_millis(),
            )?;
            self.monitor.record_event(
                "card_issued",
                Severity::Low,
                Some(user_id),
                json!({ "card_id": card_id, "masked_number": masked }),
            );

            Ok(CardIssued {
                card_id,
                card_number: number,
                cvv,
                masked_number: masked,
                expiry,
                daily_limit,
                monthly_limit,
            })
        })
    }

    /// Explicit status transition, owner-scoped. Expiry is never set this
    /// way — it is a read-time check against the expiry date.
    pub fn update_card_status(
        &self,
        user_id: &str,
        card_id: &str,
        new_status: CardStatus,
    ) -> WalletResult<()> {
        self.guard_infra("card_status_change", Some(user_id), || {
            let now = self.clock.now();
            let card = self
                .store
                .card_by_id(user_id, card_id, &day_key(now), &month_key(now))?
                .ok_or(WalletError::CardNotFound)?;

            self.store.update_card_status(&card.card_id, new_status)?;
            let txn_type = match new_status {
                CardStatus::Active => TxnType::Activation,
                _ => TxnType::Deactivation,
            };
            self.store.insert_txn(
                user_id,
                Some(&card.card_id),
                txn_type,
                0,
                Some(new_status.as_str()),
                None,
                None,
                now.timestamp_millis(),
            )?;
            self.monitor.record_event(
                "card_status_changed",
                Severity::Low,
                Some(user_id),
                json!({ "card_id": card.card_id, "new_status": new_status.as_str() }),
            );
            Ok(())
        })
    }

    /// Remaining allowance for an owner's card.
    pub fn card_limits(&self, user_id: &str, card_id: &str) -> WalletResult<LimitStatus> {
        self.guard_infra("card_limits", Some(user_id), || {
            self.limits.remaining(user_id, card_id)
        })
    }

    pub fn cards(&self, user_id: &str) -> WalletResult<Vec<CardRow>> {
        self.guard_infra("card_list", Some(user_id), || {
            self.store.cards_for_user(user_id)
        })
    }

    // ── PIN management ─────────────────────────────────────────

    /// Set or change the wallet PIN. Conservative policy: whenever a PIN
    /// already exists, the current PIN must be supplied and must verify.
    pub fn set_pin(
        &self,
        user_id: &str,
        new_pin: &str,
        current_pin: Option<&str>,
    ) -> WalletResult<()> {
        self.guard_infra("pin_change", Some(user_id), || {
            self.store
                .wallet_by_id(user_id)?
                .ok_or(WalletError::WalletNotFound)?;
            self.validator.new_pin(new_pin)?;

            if let Some(existing) = self.store.pin_record(user_id)? {
                let supplied = current_pin.ok_or_else(|| {
                    self.fail(
                        "pin_change_failed",
                        AuthPhase::Verifying,
                        Some(user_id),
                        WalletError::CurrentPinRequired,
                        json!({}),
                    )
                })?;
                if !pin::verify_pin(supplied, &existing.salt, &existing.pin_hash) {
                    return Err(self.fail_auth(
                        "pin_change_failed",
                        AuthPhase::Verifying,
                        Some(user_id),
                        WalletError::InvalidPin,
                        json!({}),
                    ));
                }
            }

            let salt = pin::new_salt();
            let hash = pin::hash_pin(new_pin, &salt);
            self.store
                .upsert_pin(user_id, &hash, &salt, self.clock.now_millis())?;
            self.monitor
                .record_event("pin_set", Severity::Low, Some(user_id), json!({}));
            Ok(())
        })
    }

    // ── Wallet funding ─────────────────────────────────────────

    pub fn add_funds(
        &self,
        user_id: &str,
        amount: MinorUnits,
        source: &str,
        reference_id: &str,
    ) -> WalletResult<TxnId> {
        self.guard_infra("funding", Some(user_id), || {
            self.validator.amount(amount)?;
            self.store
                .wallet_by_id(user_id)?
                .ok_or(WalletError::WalletNotFound)?;
            let description = format!("Funds added: {}", self.validator.sanitize(source));
            self.store.credit_wallet(
                user_id,
                amount,
                Some(&description),
                reference_id,
                self.clock.now_millis(),
            )
        })
    }

    pub fn deduct_funds(
        &self,
        user_id: &str,
        amount: MinorUnits,
        reason: &str,
        reference_id: &str,
    ) -> WalletResult<TxnId> {
        self.guard_infra("funding", Some(user_id), || {
            self.validator.amount(amount)?;
            let description = format!("Funds deducted: {}", self.validator.sanitize(reason));
            self.store
                .debit_wallet(
                    user_id,
                    amount,
                    Some(&description),
                    reference_id,
                    self.clock.now_millis(),
                )
                .map_err(|e| match e {
                    WalletError::InsufficientFunds => self.fail(
                        "funding_failed",
                        AuthPhase::Verifying,
                        Some(user_id),
                        e,
                        json!({ "amount": amount }),
                    ),
                    other => other,
                })
        })
    }

    // ── API keys ───────────────────────────────────────────────

    /// Format gate for gateway callers. Records the outcome; the key
    /// itself is logged only as a truncated prefix.
    pub fn verify_api_key(&self, key: &str) -> bool {
        let valid = self.validator.api_key(key).is_ok();
        let prefix: String = key.chars().take(10).collect();
        self.monitor.record_event(
            "api_key_validation",
            Severity::Low,
            None,
            json!({ "key_prefix": format!("{prefix}..."), "valid": valid }),
        );
        valid
    }

    // ── Shared failure plumbing ────────────────────────────────

    /// Record the failure as a security event (severity from the error
    /// taxonomy) and hand the error back. PINs never reach `extra`.
    fn fail(
        &self,
        event_type: &str,
        phase: AuthPhase,
        user_id: Option<&str>,
        err: WalletError,
        extra: serde_json::Value,
    ) -> WalletError {
        let severity = err.security_severity();
        self.fail_at(severity, event_type, phase, user_id, err, extra)
    }

    /// Authentication failures record at medium severity even though the
    /// error variant (`InvalidPin`) is shared with the low-severity
    /// malformed-input case.
    fn fail_auth(
        &self,
        event_type: &str,
        phase: AuthPhase,
        user_id: Option<&str>,
        err: WalletError,
        extra: serde_json::Value,
    ) -> WalletError {
        self.fail_at(Severity::Medium, event_type, phase, user_id, err, extra)
    }

    fn fail_at(
        &self,
        severity: Severity,
        event_type: &str,
        phase: AuthPhase,
        user_id: Option<&str>,
        err: WalletError,
        mut extra: serde_json::Value,
    ) -> WalletError {
        if let Some(map) = extra.as_object_mut() {
            map.insert("error".into(), json!(err.tag()));
            map.insert("phase".into(), json!(phase));
        }
        self.monitor.record_event(event_type, severity, user_id, extra);
        err
    }

    fn fail_validation(&self, op: &str, user_id: &str, err: WalletError) -> WalletError {
        let user = if user_id.is_empty() { None } else { Some(user_id) };
        self.fail(
            &format!("{op}_validation_error"),
            AuthPhase::Validating,
            user,
            err,
            json!({}),
        )
    }

    /// Public-boundary conversion: infrastructure failures become the
    /// generic `Unavailable`, with the detail kept to the log and the
    /// security event.
    fn guard_infra<T>(
        &self,
        op: &str,
        user_id: Option<&str>,
        f: impl FnOnce() -> WalletResult<T>,
    ) -> WalletResult<T> {
        match f() {
            Err(e) if e.is_infrastructure() => {
                log::error!("{op}: infrastructure failure: {e}");
                self.monitor.record_event(
                    &format!("{op}_infra_error"),
                    Severity::High,
                    user_id,
                    json!({ "error": e.tag() }),
                );
                Err(WalletError::Unavailable)
            }
            other => other,
        }
    }
}

/// Status before limits: blocked/inactive/expired cards never reach the
/// limit check. Expiry is evaluated against the current month at read
/// time.
fn card_usable(card: &CardRow, current_month: &str) -> Result<(), WalletError> {
    match card.status {
        CardStatus::Active => {}
        CardStatus::Expired => return Err(WalletError::CardExpired),
        CardStatus::Inactive | CardStatus::Blocked => return Err(WalletError::CardInactive),
    }
    if card.expiry.as_str() < current_month {
        return Err(WalletError::CardExpired);
    }
    Ok(())
}
