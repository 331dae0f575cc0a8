//! Fire-and-forget notification dispatch. Best-effort by contract: a
//! failed notification must never fail the operation that triggered it.

use crate::clock::Clock;
use crate::store::WalletStore;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    Security,
    Warning,
    Info,
}

impl NotifyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

pub trait Notifier: Send + Sync {
    /// Dispatch a user-facing notification. Implementations swallow and
    /// log their own failures.
    fn notify(&self, user_id: &str, title: &str, message: &str, kind: NotifyKind);
}

/// Default dispatcher: writes to the notification table for the UI to
/// pick up.
pub struct StoreNotifier {
    store: WalletStore,
    clock: Arc<dyn Clock>,
}

impl StoreNotifier {
    pub fn new(store: WalletStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

impl Notifier for StoreNotifier {
    fn notify(&self, user_id: &str, title: &str, message: &str, kind: NotifyKind) {
        if let Err(e) = self.store.insert_notification(
            user_id,
            title,
            message,
            kind.as_str(),
            self.clock.now_millis(),
        ) {
            log::warn!("failed to dispatch notification to {user_id}: {e}");
        }
    }
}
