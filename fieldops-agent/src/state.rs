//! Shared application state
//!
//! One explicit state object owns the two canonical collections and the
//! bound session identity. Created at process start, dropped at session end;
//! every consumer holds an `Arc` and reads through the locks. Only the
//! reconciliation engine writes the collections.

use fieldops_common::events::EventBus;
use fieldops_common::types::{Account, Assignment};
use tokio::sync::RwLock;

/// Shared state accessible by all components
///
/// RwLock fits the access pattern: many concurrent reads, writes only from
/// the single refresh path.
pub struct AppState {
    /// Canonical account collection; written only by the reconciliation engine
    pub accounts: RwLock<Vec<Account>>,

    /// Canonical assignment collection; written only by the reconciliation engine
    pub assignments: RwLock<Vec<Assignment>>,

    /// Account bound to the active session, if any
    pub current_account: RwLock<Option<Account>>,

    /// Broadcast bus for change notifications
    pub events: EventBus,
}

impl AppState {
    pub fn new(events: EventBus) -> Self {
        Self {
            accounts: RwLock::new(Vec::new()),
            assignments: RwLock::new(Vec::new()),
            current_account: RwLock::new(None),
            events,
        }
    }

    /// Snapshot of the canonical accounts.
    pub async fn accounts_snapshot(&self) -> Vec<Account> {
        self.accounts.read().await.clone()
    }

    /// Snapshot of the canonical assignments.
    pub async fn assignments_snapshot(&self) -> Vec<Assignment> {
        self.assignments.read().await.clone()
    }

    /// Assignments currently visible to non-admin consumers.
    pub async fn visible_assignments(&self) -> Vec<Assignment> {
        self.assignments
            .read()
            .await
            .iter()
            .filter(|a| a.is_visible)
            .cloned()
            .collect()
    }

    /// Bind the session to an account (after a successful login).
    pub async fn bind_session(&self, account: Account) {
        *self.current_account.write().await = Some(account);
    }

    /// Drop the session binding (logout).
    pub async fn unbind_session(&self) {
        *self.current_account.write().await = None;
    }

    pub async fn current_account(&self) -> Option<Account> {
        self.current_account.read().await.clone()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(EventBus::default())
    }
}
