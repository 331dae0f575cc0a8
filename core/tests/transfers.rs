//! Transfer authorization: validation order, PIN gating, atomicity of the
//! double-entry ledger write, and the per-sender rate limit.

use paisa_core::{Clock, CoreConfig, TransferOutcome, TxnType, WalletAuthorizer, WalletError};

fn setup() -> (WalletAuthorizer, std::sync::Arc<paisa_core::ManualClock>) {
    let (auth, clock) = WalletAuthorizer::build_test(CoreConfig::default()).unwrap();
    let now = clock.now().timestamp_millis();
    auth.store()
        .create_wallet("user-a", "a@example.com", 10_000, now)
        .unwrap();
    auth.store()
        .create_wallet("user-b", "b@example.com", 500, now)
        .unwrap();
    (auth, clock)
}

/// Happy path: balances move together, and both sides get a completed
/// transaction row under the same reference.
#[test]
fn transfer_moves_both_balances_atomically() {
    let (auth, _clock) = setup();

    let outcome = auth
        .authorize_transfer("user-a", "b@example.com", 3_000, Some("rent"), None)
        .unwrap();
    let receipt = match outcome {
        TransferOutcome::Completed(r) => r,
        TransferOutcome::PinRequired => panic!("no PIN set, none should be required"),
    };

    assert_eq!(receipt.sender_new_balance, 7_000);
    assert_eq!(receipt.recipient_new_balance, 3_500);
    assert!(!receipt.pin_verified);

    let sender = auth.store().wallet_by_id("user-a").unwrap().unwrap();
    let recipient = auth.store().wallet_by_id("user-b").unwrap().unwrap();
    assert_eq!(sender.balance, 7_000);
    assert_eq!(recipient.balance, 3_500);

    let out_rows = auth.store().txns_for_user("user-a", 10).unwrap();
    let in_rows = auth.store().txns_for_user("user-b", 10).unwrap();
    assert_eq!(out_rows.len(), 1);
    assert_eq!(in_rows.len(), 1);
    assert_eq!(out_rows[0].txn_type, TxnType::TransferOut);
    assert_eq!(in_rows[0].txn_type, TxnType::TransferIn);
    assert_eq!(out_rows[0].reference_id, in_rows[0].reference_id);
    assert_eq!(out_rows[0].reference_id.as_deref(), Some(receipt.reference_id.as_str()));
}

/// Insufficient funds must leave both balances untouched and write no
/// transaction rows.
#[test]
fn insufficient_funds_changes_nothing() {
    let (auth, _clock) = setup();

    let err = auth
        .authorize_transfer("user-b", "a@example.com", 600, None, None)
        .unwrap_err();
    assert!(matches!(err, WalletError::InsufficientFunds));

    assert_eq!(auth.store().wallet_by_id("user-a").unwrap().unwrap().balance, 10_000);
    assert_eq!(auth.store().wallet_by_id("user-b").unwrap().unwrap().balance, 500);
    assert!(auth.store().txns_for_user("user-b", 10).unwrap().is_empty());
}

/// Email normalization: recipient lookup is case-insensitive on the
/// sanitized, lowercased address.
#[test]
fn recipient_email_is_normalized() {
    let (auth, _clock) = setup();

    let outcome = auth
        .authorize_transfer("user-a", "  B@Example.COM ", 100, None, None)
        .unwrap();
    assert!(matches!(outcome, TransferOutcome::Completed(_)));
}

#[test]
fn unknown_recipient_is_rejected_before_any_debit() {
    let (auth, _clock) = setup();

    let err = auth
        .authorize_transfer("user-a", "nobody@example.com", 100, None, None)
        .unwrap_err();
    assert!(matches!(err, WalletError::RecipientNotFound));
    assert_eq!(auth.store().wallet_by_id("user-a").unwrap().unwrap().balance, 10_000);
}

#[test]
fn self_transfer_is_rejected() {
    let (auth, _clock) = setup();

    let err = auth
        .authorize_transfer("user-a", "a@example.com", 100, None, None)
        .unwrap_err();
    assert!(matches!(err, WalletError::SelfTransfer));
}

/// Validation precedes everything after the rate limit: a bad amount
/// never reaches the recipient lookup or the PIN gate.
#[test]
fn invalid_amounts_are_rejected() {
    let (auth, _clock) = setup();

    let err = auth
        .authorize_transfer("user-a", "b@example.com", 0, None, None)
        .unwrap_err();
    assert!(matches!(err, WalletError::InvalidAmount));

    let err = auth
        .authorize_transfer("user-a", "b@example.com", 1_000_001, None, None)
        .unwrap_err();
    assert!(matches!(err, WalletError::AmountTooLarge));
}

/// Once a PIN exists, a transfer without one halts at the PIN gate as a
/// non-error outcome, and retrying with the PIN completes.
#[test]
fn pin_gate_halts_then_resumes() {
    let (auth, _clock) = setup();
    auth.set_pin("user-a", "4821", None).unwrap();

    let outcome = auth
        .authorize_transfer("user-a", "b@example.com", 1_000, None, None)
        .unwrap();
    assert!(matches!(outcome, TransferOutcome::PinRequired));
    // Nothing moved yet.
    assert_eq!(auth.store().wallet_by_id("user-a").unwrap().unwrap().balance, 10_000);

    let outcome = auth
        .authorize_transfer("user-a", "b@example.com", 1_000, None, Some("4821"))
        .unwrap();
    match outcome {
        TransferOutcome::Completed(r) => {
            assert!(r.pin_verified);
            assert_eq!(r.sender_new_balance, 9_000);
        }
        TransferOutcome::PinRequired => panic!("PIN was supplied"),
    }
}

#[test]
fn wrong_pin_rejects_and_moves_nothing() {
    let (auth, _clock) = setup();
    auth.set_pin("user-a", "4821", None).unwrap();

    let err = auth
        .authorize_transfer("user-a", "b@example.com", 1_000, None, Some("9999"))
        .unwrap_err();
    assert!(matches!(err, WalletError::InvalidPin));
    assert_eq!(auth.store().wallet_by_id("user-a").unwrap().unwrap().balance, 10_000);
}

/// Supplying a PIN when none is set is a caller bug, not a free pass.
#[test]
fn pin_against_unset_account_is_rejected() {
    let (auth, _clock) = setup();

    let err = auth
        .authorize_transfer("user-a", "b@example.com", 100, None, Some("4821"))
        .unwrap_err();
    assert!(matches!(err, WalletError::PinNotSet));
}

/// The rate limit is checked before validation: the sixth attempt inside
/// the window is refused as RateLimited even when its inputs are garbage.
#[test]
fn sixth_transfer_in_window_is_rate_limited() {
    let (auth, _clock) = setup();

    for _ in 0..5 {
        auth.authorize_transfer("user-a", "b@example.com", 10, None, None)
            .unwrap();
    }
    let err = auth
        .authorize_transfer("user-a", "not-an-email", -5, None, None)
        .unwrap_err();
    assert!(matches!(err, WalletError::RateLimited));
}

/// A fresh window restores the budget.
#[test]
fn rate_limit_window_resets() {
    let (auth, clock) = setup();

    for _ in 0..5 {
        auth.authorize_transfer("user-a", "b@example.com", 10, None, None)
            .unwrap();
    }
    clock.advance(chrono::Duration::minutes(5) + chrono::Duration::seconds(1));
    let outcome = auth
        .authorize_transfer("user-a", "b@example.com", 10, None, None)
        .unwrap();
    assert!(matches!(outcome, TransferOutcome::Completed(_)));
}

/// A suspended sender cannot move money.
#[test]
fn inactive_wallet_cannot_send() {
    let (auth, _clock) = setup();
    auth.store().set_wallet_active("user-a", false).unwrap();

    let err = auth
        .authorize_transfer("user-a", "b@example.com", 100, None, None)
        .unwrap_err();
    assert!(matches!(err, WalletError::WalletInactive));
}
