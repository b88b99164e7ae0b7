//! Domain entities shared across the fieldops crates
//!
//! `Account` and `Assignment` are the two canonical entities produced by the
//! normalizer and owned by the reconciliation engine. Serde renames match the
//! wire shape expected by the remote write endpoint, so a full record can be
//! posted back as-is for `UPDATE_USER` / `UPDATE_TASK`.

use serde::{Deserialize, Serialize};

/// Ranks that confer administrative capability
pub const ADMIN_RANKS: &[&str] = &["نائب المدير", "المدير السري", "الزعيم الخفي"];

/// All recognized ranks, lowest first
pub const ALL_RANKS: &[&str] = &[
    "متدرب",
    "عميل مبتدئ",
    "عميل ميداني",
    "عميل متقدم",
    "عميل نخبوي",
    "نائب المدير",
    "المدير السري",
    "الزعيم الخفي",
];

/// Rank assumed when the source row carries none
pub const DEFAULT_RANK: &str = "متدرب";

/// Completion cap used when the source column is absent or non-numeric.
/// High enough to behave as unlimited in practice; an explicit 0 is the
/// true "unlimited" marker.
pub const DEFAULT_MAX_COMPLETIONS: u32 = 1000;

/// Account lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Paused,
    Banned,
}

/// Assignment lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Active,
    Paused,
    Finished,
    Unknown,
}

/// One registered person
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Opaque display timestamp from the source table
    #[serde(rename = "timestamp")]
    pub joined_at: String,
    /// Real name (sensitive; masked by the presentation layer)
    #[serde(rename = "name")]
    pub real_name: String,
    /// Covert alias shown in the UI
    #[serde(rename = "codeName")]
    pub display_name: String,
    /// Case-insensitive unique key within the collection
    pub username: String,
    /// Short access secret, compared case-sensitively
    pub code: String,
    pub points: i64,
    pub rank: String,
    /// Names of assignments this account has completed
    #[serde(rename = "completedTasks")]
    pub completed_assignments: Vec<String>,
    pub status: AccountStatus,
    /// Derived: rank is a member of `ADMIN_RANKS`
    pub is_admin: bool,
    /// 1-based position in the originating table (line 2 = first data row)
    #[serde(rename = "rowId")]
    pub row_index: u32,
}

impl Account {
    /// Credential check: case-insensitive on username, exact on code.
    pub fn matches_credentials(&self, username: &str, code: &str) -> bool {
        self.username.to_lowercase() == username.trim().to_lowercase() && self.code == code.trim()
    }

    /// Case-insensitive username match.
    pub fn is_named(&self, username: &str) -> bool {
        self.username.to_lowercase() == username.trim().to_lowercase()
    }

    /// Structural equality ignoring provenance: `row_index` records where the
    /// row sat in the source table, and a reorder alone is not a content
    /// change.
    pub fn content_eq(&self, other: &Self) -> bool {
        self.joined_at == other.joined_at
            && self.real_name == other.real_name
            && self.display_name == other.display_name
            && self.username == other.username
            && self.code == other.code
            && self.points == other.points
            && self.rank == other.rank
            && self.completed_assignments == other.completed_assignments
            && self.status == other.status
            && self.is_admin == other.is_admin
    }
}

/// One completable task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Opaque display timestamp from the source table
    #[serde(rename = "timestamp")]
    pub posted_at: String,
    /// Unique key within the collection
    #[serde(rename = "taskName")]
    pub name: String,
    pub description: String,
    #[serde(rename = "link")]
    pub resource_link: String,
    /// Expected answer; compared after whitespace-normalization and case-folding
    #[serde(rename = "solution")]
    pub secret_solution: String,
    pub status: AssignmentStatus,
    /// True iff `status == Active`
    pub is_visible: bool,
    pub points: i64,
    /// Completion cap; 0 means unlimited
    #[serde(rename = "maxWinners")]
    pub max_completions: u32,
    #[serde(rename = "rowId")]
    pub row_index: u32,
}

impl Assignment {
    /// How many accounts have this assignment in their completed set.
    pub fn completion_count(&self, accounts: &[Account]) -> usize {
        accounts
            .iter()
            .filter(|a| a.completed_assignments.contains(&self.name))
            .count()
    }

    /// An assignment with a cap of 0 is never full; otherwise full once the
    /// completion count reaches the cap.
    pub fn is_full(&self, accounts: &[Account]) -> bool {
        if self.max_completions == 0 {
            return false;
        }
        self.completion_count(accounts) >= self.max_completions as usize
    }

    /// Whitespace-normalized, case-folded comparison against the stored solution.
    pub fn solution_matches(&self, attempt: &str) -> bool {
        normalize_answer(attempt) == normalize_answer(&self.secret_solution)
    }

    /// Whether `account` may attempt this assignment.
    ///
    /// Paused accounts bypass the finished/full/already-solved gates: they may
    /// re-attempt freely, and their attempts are never recorded (sandbox
    /// semantics for training accounts).
    pub fn solvable_by(&self, account: &Account, all_accounts: &[Account]) -> bool {
        if account.status == AccountStatus::Paused {
            return true;
        }
        !(self.status == AssignmentStatus::Finished
            || self.is_full(all_accounts)
            || account.completed_assignments.contains(&self.name))
    }

    /// Structural equality ignoring provenance (`row_index`).
    pub fn content_eq(&self, other: &Self) -> bool {
        self.posted_at == other.posted_at
            && self.name == other.name
            && self.description == other.description
            && self.resource_link == other.resource_link
            && self.secret_solution == other.secret_solution
            && self.status == other.status
            && self.is_visible == other.is_visible
            && self.points == other.points
            && self.max_completions == other.max_completions
    }
}

fn normalize_answer(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
