//! Domain normalizer: decoded rows → typed entities
//!
//! The source table headers have drifted over time (bilingual spellings,
//! hamza/taa-marbuta variants), so every field lookup goes through an alias
//! list consulted in fixed priority order; the first present, non-empty value
//! wins. Both normalizers are total over arbitrary row maps: missing or
//! malformed values fall back to documented defaults, and only an account row
//! without credentials is dropped entirely.

use crate::csv::{Row, ROW_INDEX_KEY};
use fieldops_common::types::{
    Account, AccountStatus, Assignment, AssignmentStatus, ADMIN_RANKS, DEFAULT_MAX_COMPLETIONS,
    DEFAULT_RANK,
};

type Aliases = &'static [&'static str];

// Account columns
const COL_USERNAME: Aliases = &["Username"];
const COL_CODE: Aliases = &["code"];
const COL_POINTS: Aliases = &["points"];
const COL_RANK: Aliases = &["Rank"];
const COL_JOINED_AT: Aliases = &["طابع زمني", "Timestamp"];
const COL_REAL_NAME: Aliases = &["Name"];
const COL_DISPLAY_NAME: Aliases = &["CodeName"];
const COL_ACCOUNT_STATUS: Aliases = &["حالة الحساب"];
const COL_COMPLETED: Aliases = &["المهام المنجزه"];

// Assignment columns
const COL_TASK_STATUS: Aliases = &["هل المهمه تعمل", "Active"];
const COL_TASK_NAME: Aliases = &["اسم المهمه", "اسم المهمة"];
const COL_TASK_DESC: Aliases = &["وصف المهمه", "وصف المهمة"];
const COL_TASK_LINK: Aliases = &["رابط مهمه", "رابط مهمة"];
const COL_TASK_SOLUTION: Aliases = &["حل المهمه", "حل المهمة"];
const COL_MAX_COMPLETIONS: Aliases = &["كم فوز"];

/// First present, non-empty value among the aliases for a field.
fn field<'a>(row: &'a Row, aliases: Aliases) -> Option<&'a str> {
    aliases
        .iter()
        .find_map(|key| row.get(*key).map(String::as_str).filter(|v| !v.is_empty()))
}

/// Integer parse with a default for absent or non-numeric input.
fn parse_or(value: Option<&str>, default: i64) -> i64 {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default)
}

fn row_index(row: &Row) -> u32 {
    row.get(ROW_INDEX_KEY)
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(0)
}

/// Normalize one row into an [`Account`].
///
/// Returns `None` when the row lacks a username or access code: such a row is
/// not a valid account, and dropping it is not an error.
pub fn account_from_row(row: &Row) -> Option<Account> {
    let username = field(row, COL_USERNAME)?.to_string();
    let code = field(row, COL_CODE)?.to_string();

    let rank = field(row, COL_RANK).unwrap_or(DEFAULT_RANK).to_string();
    let is_admin = ADMIN_RANKS.iter().any(|r| *r == rank.trim());

    let status = field(row, COL_ACCOUNT_STATUS)
        .map(account_status_from)
        .unwrap_or(AccountStatus::Active);

    let completed_assignments = field(row, COL_COMPLETED)
        .map(split_list)
        .unwrap_or_default();

    Some(Account {
        joined_at: field(row, COL_JOINED_AT).unwrap_or_default().to_string(),
        real_name: field(row, COL_REAL_NAME).unwrap_or_default().to_string(),
        display_name: field(row, COL_DISPLAY_NAME).unwrap_or_default().to_string(),
        username,
        code,
        points: parse_or(field(row, COL_POINTS), 0),
        rank,
        completed_assignments,
        status,
        is_admin,
        row_index: row_index(row),
    })
}

/// Normalize one row into an [`Assignment`]. Total: every row yields a value.
pub fn assignment_from_row(row: &Row) -> Assignment {
    let status = field(row, COL_TASK_STATUS)
        .map(assignment_status_from)
        .unwrap_or(AssignmentStatus::Unknown);

    let max_completions = field(row, COL_MAX_COMPLETIONS)
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(DEFAULT_MAX_COMPLETIONS);

    Assignment {
        posted_at: field(row, COL_JOINED_AT).unwrap_or_default().to_string(),
        name: field(row, COL_TASK_NAME).unwrap_or_default().to_string(),
        description: field(row, COL_TASK_DESC).unwrap_or_default().to_string(),
        resource_link: field(row, COL_TASK_LINK).unwrap_or("#").to_string(),
        secret_solution: field(row, COL_TASK_SOLUTION).unwrap_or_default().to_string(),
        is_visible: status == AssignmentStatus::Active,
        status,
        points: parse_or(field(row, COL_POINTS), 0),
        max_completions,
        row_index: row_index(row),
    }
}

/// Fixed three-way account status vocabulary; anything unrecognized is active.
fn account_status_from(raw: &str) -> AccountStatus {
    match raw.trim() {
        "موقف" => AccountStatus::Paused,
        "مبند" => AccountStatus::Banned,
        _ => AccountStatus::Active,
    }
}

/// Fixed assignment status vocabulary; anything unrecognized is unknown.
fn assignment_status_from(raw: &str) -> AssignmentStatus {
    let token = raw.trim();
    if token == "تعمل" || token.eq_ignore_ascii_case("true") {
        AssignmentStatus::Active
    } else if token == "موقفه" {
        AssignmentStatus::Paused
    } else if token == "منتهيه" {
        AssignmentStatus::Finished
    } else {
        AssignmentStatus::Unknown
    }
}

/// Comma-separated list: trim each element, drop empties.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        let mut r = Row::new();
        for (k, v) in pairs {
            r.insert(k.to_string(), v.to_string());
        }
        r.entry(ROW_INDEX_KEY.to_string()).or_insert("2".to_string());
        r
    }

    #[test]
    fn row_without_credentials_is_dropped() {
        assert!(account_from_row(&row(&[("Username", "agent07")])).is_none());
        assert!(account_from_row(&row(&[("code", "4471")])).is_none());
        assert!(account_from_row(&row(&[("Username", ""), ("code", "4471")])).is_none());
        assert!(account_from_row(&row(&[])).is_none());
    }

    #[test]
    fn field_agent_row_normalizes_end_to_end() {
        let account = account_from_row(&row(&[
            ("Username", "agent07"),
            ("code", "4471"),
            ("points", "150"),
            ("Rank", "عميل ميداني"),
        ]))
        .unwrap();

        assert_eq!(account.username, "agent07");
        assert_eq!(account.code, "4471");
        assert_eq!(account.points, 150);
        assert_eq!(account.rank, "عميل ميداني");
        assert!(!account.is_admin);
        assert_eq!(account.status, AccountStatus::Active);
        assert_eq!(account.row_index, 2);
    }

    #[test]
    fn rank_defaults_and_admin_set_membership() {
        let trainee =
            account_from_row(&row(&[("Username", "a"), ("code", "1")])).unwrap();
        assert_eq!(trainee.rank, DEFAULT_RANK);
        assert!(!trainee.is_admin);

        let chief = account_from_row(&row(&[
            ("Username", "b"),
            ("code", "2"),
            ("Rank", "الزعيم الخفي"),
        ]))
        .unwrap();
        assert!(chief.is_admin);
    }

    #[test]
    fn account_status_vocabulary() {
        let status = |raw: &str| {
            account_from_row(&row(&[
                ("Username", "a"),
                ("code", "1"),
                ("حالة الحساب", raw),
            ]))
            .unwrap()
            .status
        };
        assert_eq!(status("شغال"), AccountStatus::Active);
        assert_eq!(status("موقف"), AccountStatus::Paused);
        assert_eq!(status("مبند"), AccountStatus::Banned);
        assert_eq!(status("garbage"), AccountStatus::Active);
    }

    #[test]
    fn completed_list_splits_trims_and_drops_empties() {
        let account = account_from_row(&row(&[
            ("Username", "a"),
            ("code", "1"),
            ("المهام المنجزه", " drop , , intercept ,"),
        ]))
        .unwrap();
        assert_eq!(account.completed_assignments, vec!["drop", "intercept"]);
    }

    #[test]
    fn non_numeric_points_become_zero() {
        let account = account_from_row(&row(&[
            ("Username", "a"),
            ("code", "1"),
            ("points", "lots"),
        ]))
        .unwrap();
        assert_eq!(account.points, 0);
    }

    #[test]
    fn assignment_status_vocabulary_and_visibility() {
        let task = |raw: &str| assignment_from_row(&row(&[("هل المهمه تعمل", raw)]));
        assert_eq!(task("تعمل").status, AssignmentStatus::Active);
        assert!(task("تعمل").is_visible);
        assert_eq!(task("TRUE").status, AssignmentStatus::Active);
        assert_eq!(task("موقفه").status, AssignmentStatus::Paused);
        assert_eq!(task("منتهيه").status, AssignmentStatus::Finished);
        assert_eq!(task("?").status, AssignmentStatus::Unknown);
        assert!(!task("منتهيه").is_visible);

        let missing = assignment_from_row(&row(&[]));
        assert_eq!(missing.status, AssignmentStatus::Unknown);
        assert!(!missing.is_visible);
    }

    #[test]
    fn header_alias_priority_order() {
        // Both spellings present: the first alias wins
        let task = assignment_from_row(&row(&[
            ("اسم المهمه", "primary"),
            ("اسم المهمة", "legacy"),
        ]));
        assert_eq!(task.name, "primary");

        // Only the legacy spelling present
        let task = assignment_from_row(&row(&[("اسم المهمة", "legacy")]));
        assert_eq!(task.name, "legacy");
    }

    #[test]
    fn empty_completion_cap_defaults_to_unlimited_sentinel() {
        let task = assignment_from_row(&row(&[("كم فوز", "")]));
        assert_eq!(task.max_completions, DEFAULT_MAX_COMPLETIONS);

        let task = assignment_from_row(&row(&[("كم فوز", "abc")]));
        assert_eq!(task.max_completions, DEFAULT_MAX_COMPLETIONS);

        let task = assignment_from_row(&row(&[("كم فوز", "3")]));
        assert_eq!(task.max_completions, 3);
    }

    #[test]
    fn normalization_is_idempotent_per_row() {
        let r = row(&[
            ("Username", "agent07"),
            ("code", "4471"),
            ("points", "150"),
            ("Rank", "عميل ميداني"),
            ("المهام المنجزه", "drop,intercept"),
        ]);
        assert_eq!(account_from_row(&r), account_from_row(&r));

        let t = row(&[("اسم المهمه", "drop"), ("هل المهمه تعمل", "تعمل")]);
        assert_eq!(assignment_from_row(&t), assignment_from_row(&t));
    }
}
