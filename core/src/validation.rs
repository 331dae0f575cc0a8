//! Input sanitization and schema validation.
//!
//! RULE: everything here is pure and deterministic. No store access,
//! no logging, no clock. Raw PINs pass through exactly one check and
//! are never stored or echoed back.

use crate::config::ValidationConfig;
use crate::error::{WalletError, WalletResult};
use crate::types::MinorUnits;
use regex::Regex;

/// PINs that pass the digit check but are trivially guessable.
/// Rejected when setting a PIN, not when verifying one.
const WEAK_PINS: &[&str] = &["0000", "1234", "1111"];

pub struct Validator {
    config: ValidationConfig,
    email_re: Regex,
    api_key_re: Regex,
}

impl Validator {
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            config,
            email_re: Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
                .expect("email regex"),
            api_key_re: Regex::new(r"^ak_[A-Za-z0-9_-]{24,}$").expect("api key regex"),
        }
    }

    /// Normalize and validate an email address. Returns the lowercased,
    /// sanitized form.
    pub fn email(&self, raw: &str) -> WalletResult<String> {
        let cleaned = self.sanitize(raw).to_lowercase();
        if self.email_re.is_match(&cleaned) {
            Ok(cleaned)
        } else {
            Err(WalletError::InvalidEmail)
        }
    }

    /// A well-formed PIN is exactly 4 ASCII digits.
    pub fn pin(&self, pin: &str) -> WalletResult<()> {
        if pin.len() == 4 && pin.bytes().all(|b| b.is_ascii_digit()) {
            Ok(())
        } else {
            Err(WalletError::InvalidPin)
        }
    }

    /// Format check plus the weak-PIN blacklist. Used when setting a PIN.
    pub fn new_pin(&self, pin: &str) -> WalletResult<()> {
        self.pin(pin)?;
        if WEAK_PINS.contains(&pin) {
            return Err(WalletError::WeakPin);
        }
        Ok(())
    }

    pub fn amount(&self, amount: MinorUnits) -> WalletResult<()> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount);
        }
        if amount > self.config.max_amount {
            return Err(WalletError::AmountTooLarge);
        }
        Ok(())
    }

    pub fn api_key(&self, key: &str) -> WalletResult<()> {
        if self.api_key_re.is_match(key) {
            Ok(())
        } else {
            Err(WalletError::InvalidApiKeyFormat)
        }
    }

    /// Strip `<`/`>`, trim, truncate. Never rejects — descriptions are
    /// normalized, not validated.
    pub fn sanitize(&self, input: &str) -> String {
        let cleaned: String = input.chars().filter(|c| *c != '<' && *c != '>').collect();
        let trimmed = cleaned.trim();
        trimmed
            .chars()
            .take(self.config.max_description_len)
            .collect()
    }

    /// Sanitized description, or `None` when blank.
    pub fn description(&self, raw: Option<&str>) -> Option<String> {
        let cleaned = self.sanitize(raw?);
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> Validator {
        Validator::new(ValidationConfig::default())
    }

    #[test]
    fn email_accepts_and_normalizes() {
        let v = validator();
        assert_eq!(v.email(" Alice@Example.COM ").unwrap(), "alice@example.com");
        assert!(matches!(v.email("not-an-email"), Err(WalletError::InvalidEmail)));
        assert!(matches!(v.email("a@b"), Err(WalletError::InvalidEmail)));
    }

    #[test]
    fn pin_must_be_four_digits() {
        let v = validator();
        assert!(v.pin("4821").is_ok());
        assert!(matches!(v.pin("123"), Err(WalletError::InvalidPin)));
        assert!(matches!(v.pin("12345"), Err(WalletError::InvalidPin)));
        assert!(matches!(v.pin("12a4"), Err(WalletError::InvalidPin)));
        assert!(matches!(v.pin("１２３４"), Err(WalletError::InvalidPin)));
    }

    #[test]
    fn weak_pins_rejected_only_when_setting() {
        let v = validator();
        assert!(matches!(v.new_pin("1234"), Err(WalletError::WeakPin)));
        assert!(matches!(v.new_pin("0000"), Err(WalletError::WeakPin)));
        // Verification path takes any well-formed PIN.
        assert!(v.pin("1234").is_ok());
    }

    #[test]
    fn amount_bounds() {
        let v = validator();
        assert!(v.amount(1).is_ok());
        assert!(v.amount(1_000_000).is_ok());
        assert!(matches!(v.amount(0), Err(WalletError::InvalidAmount)));
        assert!(matches!(v.amount(-5), Err(WalletError::InvalidAmount)));
        assert!(matches!(v.amount(1_000_001), Err(WalletError::AmountTooLarge)));
    }

    #[test]
    fn api_key_grammar() {
        let v = validator();
        assert!(v.api_key("ak_0123456789abcdefghijklmn").is_ok());
        assert!(v.api_key("ak_short").is_err());
        assert!(v.api_key("pk_0123456789abcdefghijklmn").is_err());
    }

    #[test]
    fn sanitize_strips_angle_brackets_and_truncates() {
        let v = validator();
        assert_eq!(v.sanitize("  <b>hello</b>  "), "bhello/b");
        let long = "x".repeat(600);
        assert_eq!(v.sanitize(&long).len(), 500);
        assert_eq!(v.description(Some("   ")), None);
        assert_eq!(v.description(None), None);
    }
}
