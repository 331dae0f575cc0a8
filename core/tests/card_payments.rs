//! Card payment authorization: the PIN check, status-before-limits
//! ordering, spend-limit enforcement under concurrency, and the masked
//! card/PIN failure answer.

use paisa_core::{
    CardIssued, CardStatus, Clock, CoreConfig, WalletAuthorizer, WalletError,
};
use std::sync::Arc;

fn setup_with_card(
    daily: i64,
    monthly: i64,
) -> (WalletAuthorizer, Arc<paisa_core::ManualClock>, CardIssued) {
    let (auth, clock) = WalletAuthorizer::build_test(CoreConfig::default()).unwrap();
    auth.store()
        .create_wallet("user-c", "c@example.com", 100_000, clock.now().timestamp_millis())
        .unwrap();
    let card = auth
        .issue_card("user-c", "7362", Some(daily), Some(monthly))
        .unwrap();
    (auth, clock, card)
}

/// Issuance returns the full number and CVV exactly once; the stored row
/// only keeps the masked form alongside the PIN hash.
#[test]
fn issued_card_shape() {
    let (auth, _clock, card) = setup_with_card(5_000, 50_000);

    assert_eq!(card.card_number.len(), 16);
    assert!(card.card_number.starts_with("4000"));
    assert_eq!(card.cvv.len(), 3);
    assert!(card.masked_number.ends_with(&card.card_number[12..]));
    assert!(card.masked_number.starts_with("4000 ****"));
    assert!(!card.masked_number.contains(&card.card_number[4..12]));

    let rows = auth.store().cards_for_user("user-c").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, CardStatus::Active);
    assert_ne!(rows[0].pin_hash, "7362", "PIN must never be stored raw");
}

#[test]
fn weak_pin_rejected_at_issuance() {
    let (auth, clock) = WalletAuthorizer::build_test(CoreConfig::default()).unwrap();
    auth.store()
        .create_wallet("user-c", "c@example.com", 0, clock.now().timestamp_millis())
        .unwrap();
    let err = auth.issue_card("user-c", "1234", None, None).unwrap_err();
    assert!(matches!(err, WalletError::WeakPin));
}

#[test]
fn payment_consumes_daily_and_monthly_counters() {
    let (auth, _clock, card) = setup_with_card(5_000, 50_000);

    let receipt = auth
        .authorize_card_payment(&card.card_number, "7362", 1_200, "merchant-1", Some("coffee"))
        .unwrap();
    assert_eq!(receipt.limits.daily_remaining, 3_800);
    assert_eq!(receipt.limits.monthly_remaining, 48_800);

    let txn = auth
        .store()
        .txn_by_reference(&receipt.reference_id)
        .unwrap()
        .unwrap();
    assert_eq!(txn.amount, 1_200);
    assert_eq!(txn.card_id.as_deref(), Some(card.card_id.as_str()));
}

/// A payment pushing past the daily limit is refused with the daily
/// error, and the spent counter stays where it was.
#[test]
fn daily_limit_refusal_leaves_counter_unchanged() {
    let (auth, _clock, card) = setup_with_card(5_000, 50_000);

    auth.authorize_card_payment(&card.card_number, "7362", 4_800, "merchant-1", None)
        .unwrap();
    let err = auth
        .authorize_card_payment(&card.card_number, "7362", 300, "merchant-1", None)
        .unwrap_err();
    assert!(matches!(err, WalletError::DailyLimitExceeded));

    let status = auth.card_limits("user-c", &card.card_id).unwrap();
    assert_eq!(status.daily_remaining, 200);
}

/// Daily is classified before monthly when both would be exceeded.
#[test]
fn daily_classified_before_monthly() {
    let (auth, _clock, card) = setup_with_card(1_000, 1_000);

    let err = auth
        .authorize_card_payment(&card.card_number, "7362", 1_500, "merchant-1", None)
        .unwrap_err();
    assert!(matches!(err, WalletError::DailyLimitExceeded));
}

#[test]
fn monthly_limit_enforced_independently() {
    let (auth, clock, card) = setup_with_card(5_000, 6_000);

    auth.authorize_card_payment(&card.card_number, "7362", 5_000, "merchant-1", None)
        .unwrap();
    // New day, but the month's budget is nearly gone.
    clock.advance(chrono::Duration::days(1));
    let err = auth
        .authorize_card_payment(&card.card_number, "7362", 1_500, "merchant-1", None)
        .unwrap_err();
    assert!(matches!(err, WalletError::MonthlyLimitExceeded));
}

/// Unknown card numbers and wrong PINs get the identical answer.
#[test]
fn unknown_card_and_wrong_pin_are_indistinguishable() {
    let (auth, _clock, card) = setup_with_card(5_000, 50_000);

    let unknown = auth
        .authorize_card_payment("4000999999999999", "7362", 100, "merchant-1", None)
        .unwrap_err();
    let wrong_pin = auth
        .authorize_card_payment(&card.card_number, "0007", 100, "merchant-1", None)
        .unwrap_err();
    assert!(matches!(unknown, WalletError::InvalidPin));
    assert!(matches!(wrong_pin, WalletError::InvalidPin));
}

/// Status is checked before limits: a correct PIN on a blocked card never
/// reaches the limit counters.
#[test]
fn blocked_card_refused_before_limits() {
    let (auth, _clock, card) = setup_with_card(5_000, 50_000);
    auth.update_card_status("user-c", &card.card_id, CardStatus::Blocked)
        .unwrap();

    let err = auth
        .authorize_card_payment(&card.card_number, "7362", 100, "merchant-1", None)
        .unwrap_err();
    assert!(matches!(err, WalletError::CardInactive));

    let status = auth.card_limits("user-c", &card.card_id).unwrap();
    assert_eq!(status.daily_remaining, 5_000);
}

/// Expiry is a read-time check against the card's expiry month.
#[test]
fn expired_card_refused() {
    let (auth, clock, card) = setup_with_card(5_000, 50_000);
    // Validity is 36 months from the fixed test epoch.
    clock.advance(chrono::Duration::days(37 * 31));

    let err = auth
        .authorize_card_payment(&card.card_number, "7362", 100, "merchant-1", None)
        .unwrap_err();
    assert!(matches!(err, WalletError::CardExpired));
}

/// Two concurrent payments that each fit alone but not together: exactly
/// one passes. The conditional UPDATE in the store is the arbiter.
#[test]
fn concurrent_payments_cannot_both_pass() {
    let (auth, _clock, card) = setup_with_card(5_000, 50_000);
    let auth = Arc::new(auth);

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let auth = Arc::clone(&auth);
                let number = card.card_number.clone();
                s.spawn(move || {
                    auth.authorize_card_payment(&number, "7362", 5_000, "merchant-1", None)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let daily_refusals = results
        .iter()
        .filter(|r| matches!(r, Err(WalletError::DailyLimitExceeded)))
        .count();
    assert_eq!(successes, 1, "exactly one of the racing payments may pass");
    assert_eq!(daily_refusals, 1);

    let status = auth.card_limits("user-c", &card.card_id).unwrap();
    assert_eq!(status.daily_remaining, 0);
}

/// Card management is owner-scoped.
#[test]
fn status_change_requires_ownership() {
    let (auth, clock, card) = setup_with_card(5_000, 50_000);
    auth.store()
        .create_wallet("user-x", "x@example.com", 0, clock.now().timestamp_millis())
        .unwrap();

    let err = auth
        .update_card_status("user-x", &card.card_id, CardStatus::Blocked)
        .unwrap_err();
    assert!(matches!(err, WalletError::CardNotFound));
}

/// validate_card writes an audit row without touching the counters.
#[test]
fn validation_charges_nothing() {
    let (auth, _clock, card) = setup_with_card(5_000, 50_000);

    let result = auth.validate_card(&card.card_number, "7362").unwrap();
    assert_eq!(result.card_id, card.card_id);
    assert_eq!(result.limits.daily_remaining, 5_000);

    let rows = auth.store().txns_for_card(&card.card_id).unwrap();
    assert!(rows
        .iter()
        .any(|t| t.txn_type == paisa_core::TxnType::Validation && t.amount == 0));
}

/// A blocked card refused during validation shows up in the security
/// event log, not just in the returned error.
#[test]
fn refused_validation_is_recorded_as_a_security_event() {
    let (auth, _clock, card) = setup_with_card(5_000, 50_000);
    auth.update_card_status("user-c", &card.card_id, CardStatus::Blocked)
        .unwrap();

    let err = auth.validate_card(&card.card_number, "7362").unwrap_err();
    assert!(matches!(err, WalletError::CardInactive));

    let events = auth.store().security_events_since(0).unwrap();
    assert!(
        events
            .iter()
            .any(|e| e.event_type == "card_validation_failed" && e.severity == "medium"),
        "refused validation must leave a medium event row"
    );
}

/// Issuing against a deactivated wallet is refused and recorded.
#[test]
fn issuance_against_inactive_wallet_is_recorded() {
    let (auth, clock) = WalletAuthorizer::build_test(CoreConfig::default()).unwrap();
    auth.store()
        .create_wallet("user-c", "c@example.com", 0, clock.now().timestamp_millis())
        .unwrap();
    auth.store().set_wallet_active("user-c", false).unwrap();

    let err = auth.issue_card("user-c", "7362", None, None).unwrap_err();
    assert!(matches!(err, WalletError::WalletInactive));

    let events = auth.store().security_events_since(0).unwrap();
    assert!(events
        .iter()
        .any(|e| e.event_type == "card_issuance_failed" && e.severity == "medium"));
}
