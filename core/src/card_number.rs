//! Deterministic card number and CVV derivation.
//!
//! The same card id always yields the same number, so the number never
//! needs to be stored alongside the card secrets that could reconstruct it
//! elsewhere. Prefix 4000, 16 digits total.

/// Full 16-digit card number for a card id (UUID string).
pub fn derive_card_number(card_id: &str) -> String {
    let clean: String = card_id.chars().filter(|c| *c != '-').collect();
    let hash_sum: u64 = clean.bytes().map(u64::from).sum();
    let seed = hash_sum % 1_000_000_000_000;
    format!("4000{seed:012}")
}

/// 3-digit CVV for a card id.
pub fn derive_cvv(card_id: &str) -> String {
    let mut hash: i64 = 0;
    for b in card_id.bytes() {
        hash = (hash << 3).wrapping_sub(hash).wrapping_add(i64::from(b));
        // keep it in 32-bit range like a JS bitwise op would
        hash = (hash as i32) as i64;
    }
    format!("{}", hash.abs() % 900 + 100)
}

/// `4000 **** **** 1234` display form.
pub fn masked(card_number: &str) -> String {
    if card_number.len() != 16 {
        return "**** **** **** ****".to_string();
    }
    format!("{} **** **** {}", &card_number[..4], &card_number[12..])
}

/// `4000 1234 5678 9012` display form.
pub fn formatted(card_number: &str) -> String {
    if card_number.len() != 16 {
        return card_number.to_string();
    }
    format!(
        "{} {} {} {}",
        &card_number[..4],
        &card_number[4..8],
        &card_number[8..12],
        &card_number[12..]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let id = "0b94ad08-6cd1-4e8a-9a67-1a1e5ffbbf55";
        assert_eq!(derive_card_number(id), derive_card_number(id));
        assert_eq!(derive_cvv(id), derive_cvv(id));
    }

    #[test]
    fn number_shape() {
        let n = derive_card_number("0b94ad08-6cd1-4e8a-9a67-1a1e5ffbbf55");
        assert_eq!(n.len(), 16);
        assert!(n.starts_with("4000"));
        assert!(n.bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn cvv_shape() {
        let cvv = derive_cvv("0b94ad08-6cd1-4e8a-9a67-1a1e5ffbbf55");
        assert_eq!(cvv.len(), 3);
        let v: u32 = cvv.parse().unwrap();
        assert!((100..1000).contains(&v));
    }

    #[test]
    fn formatting_groups_digits_in_fours() {
        assert_eq!(formatted("4000123456789012"), "4000 1234 5678 9012");
        // anything but 16 digits passes through untouched
        assert_eq!(formatted("123"), "123");
    }

    #[test]
    fn masking_hides_middle_digits() {
        let m = masked("4000123456789012");
        assert_eq!(m, "4000 **** **** 9012");
        assert!(!m.contains("12345678"));
    }
}
