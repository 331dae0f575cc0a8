//! Shared primitive types used across the authorization core.

/// A wallet owner's stable identifier (UUID string).
pub type UserId = String;

/// A card's stable identifier (UUID string).
pub type CardId = String;

/// A transaction's stable identifier (UUID string).
pub type TxnId = String;

/// Money, in integer minor units (cents). Never floats — the conditional
/// UPDATE statements that enforce balance and limit invariants must be exact.
pub type MinorUnits = i64;

/// Epoch milliseconds, UTC.
pub type Millis = i64;
