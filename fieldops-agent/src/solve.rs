//! Assignment solution submission
//!
//! Checks a submitted answer against the assignment's stored solution and,
//! when correct, records the completion through the write endpoint and the
//! audit log. Paused accounts run in sandbox mode: correct answers are
//! acknowledged but never recorded and earn no points.

use crate::actions::{ActionClient, AuditSink};
use crate::audit::AuditEntry;
use crate::device::DeviceInfoProvider;
use fieldops_common::types::{Account, AccountStatus, Assignment};
use fieldops_common::Result;
use tracing::info;

/// Outcome of a solution submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveOutcome {
    /// Answer matched; `recorded` is false for sandboxed (paused) accounts
    Correct { recorded: bool },
    /// Answer did not match the stored solution
    Incorrect,
    /// The account may not attempt this assignment (finished, full, or
    /// already solved)
    NotEligible,
}

/// Check `answer` and record a completion when appropriate.
pub async fn submit_answer(
    client: &ActionClient,
    device: &dyn DeviceInfoProvider,
    account: &Account,
    assignment: &Assignment,
    all_accounts: &[Account],
    answer: &str,
) -> Result<SolveOutcome> {
    if !assignment.solvable_by(account, all_accounts) {
        return Ok(SolveOutcome::NotEligible);
    }
    if !assignment.solution_matches(answer) {
        return Ok(SolveOutcome::Incorrect);
    }

    if account.status == AccountStatus::Paused {
        info!(
            "Sandbox solve of {} by paused account {}",
            assignment.name, account.username
        );
        return Ok(SolveOutcome::Correct { recorded: false });
    }

    client.solve_task(account, assignment).await?;
    let entry = AuditEntry::new(
        Some(account),
        "SOLVED_TASK",
        &format!(
            "Task: {}, Points: {}",
            assignment.name, assignment.points
        ),
        None,
        device.snapshot(),
    );
    client.append_log(entry.compose()).await;

    Ok(SolveOutcome::Correct { recorded: true })
}
