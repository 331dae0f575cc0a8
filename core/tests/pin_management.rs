//! PIN lifecycle and the API key format gate.

use paisa_core::{Clock, CoreConfig, WalletAuthorizer, WalletError};

fn setup() -> WalletAuthorizer {
    let (auth, clock) = WalletAuthorizer::build_test(CoreConfig::default()).unwrap();
    auth.store()
        .create_wallet("user-p", "p@example.com", 1_000, clock.now().timestamp_millis())
        .unwrap();
    auth
}

#[test]
fn first_pin_needs_no_current() {
    let auth = setup();
    auth.set_pin("user-p", "4821", None).unwrap();

    let record = auth.store().pin_record("user-p").unwrap().unwrap();
    assert_ne!(record.pin_hash, "4821", "PIN must be stored hashed");
    assert!(!record.salt.is_empty());
}

/// Changing an existing PIN requires the current one. Omitting it and
/// getting it wrong are distinct failures.
#[test]
fn changing_a_pin_requires_the_current_one() {
    let auth = setup();
    auth.set_pin("user-p", "4821", None).unwrap();

    let err = auth.set_pin("user-p", "9173", None).unwrap_err();
    assert!(matches!(err, WalletError::CurrentPinRequired));

    let err = auth.set_pin("user-p", "9173", Some("0000")).unwrap_err();
    assert!(matches!(err, WalletError::InvalidPin));

    auth.set_pin("user-p", "9173", Some("4821")).unwrap();
}

/// A change attempt that omits the current PIN leaves a medium security
/// event behind, same as a wrong one.
#[test]
fn omitted_current_pin_is_recorded_as_a_security_event() {
    let auth = setup();
    auth.set_pin("user-p", "4821", None).unwrap();

    let err = auth.set_pin("user-p", "9173", None).unwrap_err();
    assert!(matches!(err, WalletError::CurrentPinRequired));

    let events = auth.store().security_events_since(0).unwrap();
    assert!(events
        .iter()
        .any(|e| e.event_type == "pin_change_failed" && e.severity == "medium"));
}

/// A successful change rotates the salt, so identical PINs never share a
/// hash across changes.
#[test]
fn salt_rotates_on_change() {
    let auth = setup();
    auth.set_pin("user-p", "4821", None).unwrap();
    let before = auth.store().pin_record("user-p").unwrap().unwrap();

    auth.set_pin("user-p", "4821", Some("4821")).unwrap();
    let after = auth.store().pin_record("user-p").unwrap().unwrap();

    assert_ne!(before.salt, after.salt);
    assert_ne!(before.pin_hash, after.pin_hash);
}

#[test]
fn malformed_and_weak_pins_are_rejected() {
    let auth = setup();

    for bad in ["12", "12345", "12a4", ""] {
        let err = auth.set_pin("user-p", bad, None).unwrap_err();
        assert!(matches!(err, WalletError::InvalidPin), "{bad:?}");
    }
    for weak in ["0000", "1234", "1111"] {
        let err = auth.set_pin("user-p", weak, None).unwrap_err();
        assert!(matches!(err, WalletError::WeakPin), "{weak:?}");
    }
}

/// Weak PINs are refused on set only — an existing weak PIN still
/// verifies, it is not silently invalidated.
#[test]
fn existing_pin_verifies_even_if_weak_by_todays_rules() {
    let auth = setup();
    // Simulate a PIN that predates the weak list.
    let salt = paisa_core::pin::new_salt();
    let hash = paisa_core::pin::hash_pin("1234", &salt);
    auth.store().upsert_pin("user-p", &hash, &salt, 0).unwrap();

    // The current PIN gate accepts it when changing to a strong one.
    auth.set_pin("user-p", "9173", Some("1234")).unwrap();
}

#[test]
fn api_key_format_gate() {
    let auth = setup();

    assert!(auth.verify_api_key("ak_0123456789abcdefghijklmnop"));
    assert!(!auth.verify_api_key("ak_tooshort"));
    assert!(!auth.verify_api_key("sk_0123456789abcdefghijklmnop"));
    assert!(!auth.verify_api_key(""));
}
