//! Reconciliation engine
//!
//! Owns the refresh lifecycle of the two canonical collections. The first
//! load replaces them unconditionally; every later cycle applies a
//! conservative merge: a fetch that comes back empty while the canonical
//! collection is non-empty is treated as a transient provider failure and
//! ignored, and a fetch whose content is unchanged is dropped without
//! notifying anyone. Steady-state fetch or parse failures are logged and
//! swallowed; the last-known-good state stays on screen indefinitely.
//!
//! The two tables are always fetched sequentially, accounts first, so the
//! session identity can be re-bound against fresh accounts before assignment
//! consumers observe anything. At most one cycle is in flight at a time; a
//! cycle requested while one runs is dropped, not queued.

use crate::csv;
use crate::normalize;
use crate::sheets::{SheetSource, Table};
use crate::state::AppState;
use fieldops_common::events::FieldEvent;
use fieldops_common::types::{Account, AccountStatus, Assignment};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Wall-clock bound on the initial load; past it the caller proceeds with
/// whatever arrived.
pub const INITIAL_LOAD_DEADLINE: Duration = Duration::from_secs(15);

/// Boot-status milestones, narrated in fixed order during the initial load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStage {
    /// Caller-side initial state, before the load starts
    Handshake,
    FetchingAccounts,
    FetchingAssignments,
    Ready,
}

impl fmt::Display for BootStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BootStage::Handshake => "INITIATING HANDSHAKE...",
            BootStage::FetchingAccounts => "DECRYPTING PERSONNEL DATA...",
            BootStage::FetchingAssignments => "DOWNLOADING MISSION PARAMETERS...",
            BootStage::Ready => "SYSTEM ONLINE.",
        };
        f.write_str(text)
    }
}

/// Result of a completed initial load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitialLoad {
    /// True when the accounts table came back empty: nothing to run on,
    /// surface a connectivity error with user-triggered retry
    pub connectivity_error: bool,
}

/// Result of a deadline-bounded initial load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialLoadOutcome {
    Completed(InitialLoad),
    /// The safety deadline elapsed first; proceed with whatever state exists
    DeadlineExpired,
}

/// The reconciliation engine
pub struct ReconcileEngine<S: SheetSource> {
    source: S,
    state: Arc<AppState>,
    refresh_in_flight: AtomicBool,
}

impl<S: SheetSource> ReconcileEngine<S> {
    pub fn new(source: S, state: Arc<AppState>) -> Self {
        Self {
            source,
            state,
            refresh_in_flight: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// First load: fetch both tables sequentially and replace the canonical
    /// collections unconditionally; there is no prior state to protect.
    /// Milestones are narrated to `progress` in fixed order.
    pub async fn initial_load<F>(&self, progress: F) -> InitialLoad
    where
        F: Fn(BootStage),
    {
        progress(BootStage::FetchingAccounts);
        let accounts = self.fetch_accounts().await.unwrap_or_else(|e| {
            error!("Initial accounts fetch failed: {e}");
            Vec::new()
        });
        let connectivity_error = accounts.is_empty();
        *self.state.accounts.write().await = accounts;

        progress(BootStage::FetchingAssignments);
        let assignments = self.fetch_assignments().await.unwrap_or_else(|e| {
            error!("Initial assignments fetch failed: {e}");
            Vec::new()
        });
        *self.state.assignments.write().await = assignments;

        progress(BootStage::Ready);
        if connectivity_error {
            warn!("Initial load produced no accounts; flagging connectivity error");
        }
        InitialLoad { connectivity_error }
    }

    /// Initial load bounded by [`INITIAL_LOAD_DEADLINE`].
    ///
    /// The deadline bounds only the wait. A load still in flight is never
    /// cancelled; it keeps running and its data lands in shared state
    /// whenever it completes.
    pub async fn initial_load_with_deadline<F>(self: &Arc<Self>, progress: F) -> InitialLoadOutcome
    where
        F: Fn(BootStage) + Send + 'static,
        S: 'static,
    {
        let engine = Arc::clone(self);
        let load = tokio::spawn(async move { engine.initial_load(progress).await });
        match tokio::time::timeout(INITIAL_LOAD_DEADLINE, load).await {
            Ok(Ok(result)) => InitialLoadOutcome::Completed(result),
            Ok(Err(e)) => {
                error!("Initial load task failed: {e}");
                InitialLoadOutcome::DeadlineExpired
            }
            Err(_) => {
                warn!("Initial load exceeded deadline; proceeding while it finishes");
                InitialLoadOutcome::DeadlineExpired
            }
        }
    }

    /// One refresh cycle. Returns false when another cycle was already in
    /// flight (the request is dropped, not queued).
    ///
    /// The guard is set before the first await and cleared on every path out,
    /// failure included.
    pub async fn refresh_cycle(&self) -> bool {
        if self.refresh_in_flight.swap(true, Ordering::SeqCst) {
            debug!("Refresh already in flight; dropping request");
            return false;
        }
        self.run_refresh().await;
        self.refresh_in_flight.store(false, Ordering::SeqCst);
        true
    }

    /// Periodic refresh task. Scheduling is gated on `visible`: cycles are
    /// not even started while the consumer is backgrounded, but a cycle
    /// already under way always runs to completion.
    pub fn spawn_poller(
        self: &Arc<Self>,
        interval: Duration,
        visible: Arc<AtomicBool>,
    ) -> tokio::task::JoinHandle<()>
    where
        S: 'static,
    {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; the initial load covers that
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !visible.load(Ordering::Relaxed) {
                    debug!("Consumer not visible; skipping refresh cycle");
                    continue;
                }
                engine.refresh_cycle().await;
            }
        })
    }

    async fn run_refresh(&self) {
        // Accounts first: the session identity re-binds against them before
        // assignment consumers see anything from this cycle
        match self.fetch_accounts().await {
            Ok(fresh) => self.apply_accounts(fresh).await,
            Err(e) => warn!("Accounts refresh failed (keeping current state): {e}"),
        }
        match self.fetch_assignments().await {
            Ok(fresh) => self.apply_assignments(fresh).await,
            Err(e) => warn!("Assignments refresh failed (keeping current state): {e}"),
        }
    }

    async fn fetch_accounts(&self) -> fieldops_common::Result<Vec<Account>> {
        let text = self.source.fetch_csv(Table::Accounts).await?;
        Ok(csv::decode(&text)
            .iter()
            .filter_map(normalize::account_from_row)
            .collect())
    }

    async fn fetch_assignments(&self) -> fieldops_common::Result<Vec<Assignment>> {
        let text = self.source.fetch_csv(Table::Assignments).await?;
        Ok(csv::decode(&text)
            .iter()
            .map(normalize::assignment_from_row)
            .collect())
    }

    async fn apply_accounts(&self, fresh: Vec<Account>) {
        let (replaced, leader_change) = {
            let mut canonical = self.state.accounts.write().await;
            if fresh.is_empty() && !canonical.is_empty() {
                warn!("Accounts fetch returned empty against non-empty state; treating as transient failure");
                return;
            }
            if same_members(&canonical, &fresh, |a| a.username.as_str(), Account::content_eq) {
                debug!("Accounts unchanged; no replacement");
                return;
            }

            let previous_leader = leader(&canonical).map(|a| a.username.clone());
            *canonical = fresh;
            let new_leader = leader(&canonical).map(|a| a.username.clone());

            let leader_change = match (previous_leader, new_leader) {
                (Some(prev), Some(new)) if prev != new => Some(new),
                _ => None,
            };
            (canonical.len(), leader_change)
        };

        self.rebind_session().await;

        let now = chrono::Utc::now();
        self.state.events.emit(FieldEvent::AccountsUpdated {
            count: replaced,
            timestamp: now,
        });
        if let Some(username) = leader_change {
            info!("Leaderboard top changed to {username}");
            self.state.events.emit(FieldEvent::LeaderChanged {
                username,
                timestamp: now,
            });
        }
    }

    async fn apply_assignments(&self, fresh: Vec<Assignment>) {
        let (count, posted) = {
            let mut canonical = self.state.assignments.write().await;
            if fresh.is_empty() && !canonical.is_empty() {
                warn!("Assignments fetch returned empty against non-empty state; treating as transient failure");
                return;
            }
            if same_members(&canonical, &fresh, |a| a.name.as_str(), Assignment::content_eq) {
                debug!("Assignments unchanged; no replacement");
                return;
            }

            let prior_nonempty = !canonical.is_empty();
            let previous_visible = visible_count(&canonical);
            *canonical = fresh;
            let current_visible = visible_count(&canonical);

            let posted = prior_nonempty && current_visible > previous_visible;
            (canonical.len(), posted.then_some(current_visible))
        };

        let now = chrono::Utc::now();
        self.state.events.emit(FieldEvent::AssignmentsUpdated {
            count,
            timestamp: now,
        });
        if let Some(visible_count) = posted {
            info!("New assignment visible ({visible_count} total)");
            self.state.events.emit(FieldEvent::AssignmentPosted {
                visible_count,
                timestamp: now,
            });
        }
    }

    /// Re-bind the session identity to its freshly normalized counterpart,
    /// but only when the content actually differs.
    async fn rebind_session(&self) {
        let accounts = self.state.accounts.read().await;
        let mut current = self.state.current_account.write().await;
        let updated = match current.as_ref() {
            Some(held) => accounts
                .iter()
                .find(|a| a.is_named(&held.username))
                .filter(|updated| !updated.content_eq(held))
                .cloned(),
            None => None,
        };
        if let Some(updated) = updated {
            let username = updated.username.clone();
            *current = Some(updated);
            drop(current);
            drop(accounts);
            debug!("Session identity re-bound for {username}");
            self.state.events.emit(FieldEvent::SessionRebound {
                username,
                timestamp: chrono::Utc::now(),
            });
        }
    }
}

/// Current leaderboard top: highest points among non-admin, non-paused
/// accounts. Ties keep source order.
pub fn leader(accounts: &[Account]) -> Option<&Account> {
    let mut ranked: Vec<&Account> = accounts
        .iter()
        .filter(|a| !a.is_admin && a.status != AccountStatus::Paused)
        .collect();
    ranked.sort_by(|a, b| b.points.cmp(&a.points));
    ranked.first().copied()
}

fn visible_count(assignments: &[Assignment]) -> usize {
    assignments.iter().filter(|a| a.is_visible).count()
}

/// Order-insensitive structural comparison keyed on the natural key, so a
/// re-fetch that merely reorders rows is not a content change. Entries are
/// compared with `eq`, which excludes provenance fields.
fn same_members<T, K, F, E>(current: &[T], fresh: &[T], key: F, eq: E) -> bool
where
    K: Ord + ?Sized,
    F: Fn(&T) -> &K,
    E: Fn(&T, &T) -> bool,
{
    if current.len() != fresh.len() {
        return false;
    }
    let mut left: Vec<&T> = current.iter().collect();
    let mut right: Vec<&T> = fresh.iter().collect();
    left.sort_by(|a, b| key(a).cmp(key(b)));
    right.sort_by(|a, b| key(a).cmp(key(b)));
    left.iter().zip(&right).all(|(a, b)| eq(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldops_common::types::DEFAULT_RANK;

    fn account(username: &str, points: i64, is_admin: bool, status: AccountStatus) -> Account {
        Account {
            joined_at: String::new(),
            real_name: String::new(),
            display_name: String::new(),
            username: username.to_string(),
            code: "0000".to_string(),
            points,
            rank: DEFAULT_RANK.to_string(),
            completed_assignments: vec![],
            status,
            is_admin,
            row_index: 2,
        }
    }

    #[test]
    fn leader_excludes_admins_and_paused() {
        let accounts = vec![
            account("chief", 900, true, AccountStatus::Active),
            account("benched", 800, false, AccountStatus::Paused),
            account("agent07", 150, false, AccountStatus::Active),
            account("agent09", 120, false, AccountStatus::Active),
        ];
        assert_eq!(leader(&accounts).unwrap().username, "agent07");
    }

    #[test]
    fn leader_of_empty_or_all_excluded_is_none() {
        assert!(leader(&[]).is_none());
        let only_admin = vec![account("chief", 900, true, AccountStatus::Active)];
        assert!(leader(&only_admin).is_none());
    }

    #[test]
    fn same_members_ignores_order_but_not_content() {
        let a = account("a", 1, false, AccountStatus::Active);
        let b = account("b", 2, false, AccountStatus::Active);
        let left = vec![a.clone(), b.clone()];
        let right = vec![b.clone(), a.clone()];
        assert!(same_members(
            &left,
            &right,
            |x| x.username.as_str(),
            Account::content_eq
        ));

        let mut changed = b.clone();
        changed.points = 3;
        let right = vec![changed, a];
        assert!(!same_members(
            &left,
            &right,
            |x| x.username.as_str(),
            Account::content_eq
        ));
    }

    #[test]
    fn same_members_ignores_source_row_positions() {
        // A reorder in the source table shifts every row index; that alone
        // is not a content change
        let a = account("a", 1, false, AccountStatus::Active);
        let b = account("b", 2, false, AccountStatus::Active);
        let left = vec![a.clone(), b.clone()];
        let mut a_moved = a;
        let mut b_moved = b;
        a_moved.row_index = 3;
        b_moved.row_index = 2;
        let right = vec![b_moved, a_moved];
        assert!(same_members(
            &left,
            &right,
            |x| x.username.as_str(),
            Account::content_eq
        ));
    }

    #[test]
    fn boot_stages_narrate_in_order() {
        assert_eq!(BootStage::Handshake.to_string(), "INITIATING HANDSHAKE...");
        assert_eq!(
            BootStage::FetchingAccounts.to_string(),
            "DECRYPTING PERSONNEL DATA..."
        );
        assert_eq!(
            BootStage::FetchingAssignments.to_string(),
            "DOWNLOADING MISSION PARAMETERS..."
        );
        assert_eq!(BootStage::Ready.to_string(), "SYSTEM ONLINE.");
    }
}
