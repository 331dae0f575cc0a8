//! paisa-core — the wallet authorization core.
//!
//! Everything an embedding service needs to authorize money movement:
//! input validation, persisted rate limiting, the PIN-gated transfer and
//! card-payment flows, spend-limit accounting, and the security event
//! monitor with automated threat responses.
//!
//! RULES:
//!   - Only the store talks SQL. Every other module goes through
//!     `WalletStore`.
//!   - Money is integer minor units everywhere. No floats.
//!   - PIN values never appear in logs, events, or error messages.
//!   - Infrastructure failures leave the crate as `Unavailable`; the
//!     detail stays in the log and the security event stream.
//!   - Balance and limit invariants are enforced by conditional UPDATEs
//!     inside SQLite transactions, never by read-then-write in Rust.

pub mod authorizer;
pub mod card_number;
pub mod clock;
pub mod config;
pub mod error;
pub mod limits;
pub mod notify;
pub mod pin;
pub mod rate_limiter;
pub mod security_event;
pub mod security_monitor;
pub mod store;
pub mod types;
pub mod validation;

pub use authorizer::{
    AuthPhase, CardIssued, CardValidation, PaymentReceipt, TransferOutcome, TransferReceipt,
    WalletAuthorizer,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CoreConfig;
pub use error::{WalletError, WalletResult};
pub use limits::LimitStatus;
pub use notify::{Notifier, NotifyKind, StoreNotifier};
pub use security_event::{SecurityEvent, Severity};
pub use security_monitor::{spawn_sweeper, SecurityMonitor, SecurityReport, SweeperHandle};
pub use store::{CardStatus, TxnStatus, TxnType, WalletStore};
