//! Integration tests for the session trust state machine
//!
//! Runs full login flows against an in-memory roster, a recording audit sink,
//! and a temp-dir trust cache. Time-sensitive paths run under paused tokio
//! time so the success delay costs nothing.

use fieldops_agent::actions::AuditSink;
use fieldops_agent::device::{DeviceInfoProvider, DeviceSnapshot};
use fieldops_agent::session::{LoginOutcome, RejectReason, ScanOutcome, SessionManager};
use fieldops_agent::trust::{TrustStore, TRUST_WINDOW_MS};
use fieldops_common::types::{Account, AccountStatus, DEFAULT_RANK};
use std::sync::{Arc, Mutex};

struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl AuditSink for RecordingSink {
    async fn append_log(&self, line: String) {
        self.lines.lock().unwrap().push(line);
    }
}

struct FixedDevice;

impl DeviceInfoProvider for FixedDevice {
    fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot::default()
    }
}

fn account(username: &str, code: &str, status: AccountStatus) -> Account {
    Account {
        joined_at: String::new(),
        real_name: "Somebody".to_string(),
        display_name: "Shadow".to_string(),
        username: username.to_string(),
        code: code.to_string(),
        points: 0,
        rank: DEFAULT_RANK.to_string(),
        completed_assignments: vec![],
        status,
        is_admin: false,
        row_index: 2,
    }
}

fn roster() -> Vec<Account> {
    vec![
        account("agent07", "4471", AccountStatus::Active),
        account("benched", "1111", AccountStatus::Paused),
        account("burned", "2222", AccountStatus::Banned),
    ]
}

struct Harness {
    manager: SessionManager,
    sink: Arc<RecordingSink>,
    _dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let trust = TrustStore::open(dir.path().join("trust.json"));
    let sink = Arc::new(RecordingSink {
        lines: Mutex::new(Vec::new()),
    });
    let manager = SessionManager::new(
        trust,
        Arc::clone(&sink) as Arc<dyn AuditSink>,
        Arc::new(FixedDevice),
    );
    Harness {
        manager,
        sink,
        _dir: dir,
    }
}

impl Harness {
    fn audit_lines(&self) -> Vec<String> {
        self.sink.lines.lock().unwrap().clone()
    }
}

#[tokio::test(start_paused = true)]
async fn successful_login_audits_and_records_trust() {
    let mut h = harness();
    let outcome = h.manager.login(&roster(), " agent07 ", " 4471 ").await;

    match outcome {
        LoginOutcome::Authenticated(account) => assert_eq!(account.username, "agent07"),
        other => panic!("expected authentication, got {other:?}"),
    }
    assert!(h.manager.trust().last_login_ms("agent07").is_some());

    let lines = h.audit_lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("[ACTION]: LOGIN_SUCCESS"));
    assert!(lines[0].contains("Manual Login"));
    assert!(lines[0].contains("agent07"));
}

#[tokio::test(start_paused = true)]
async fn username_is_case_insensitive_code_is_exact() {
    let mut h = harness();
    let outcome = h.manager.login(&roster(), "AGENT07", "4471").await;
    assert!(matches!(outcome, LoginOutcome::Authenticated(_)));

    let outcome = h.manager.login(&roster(), "agent07", "4472").await;
    assert_eq!(
        outcome,
        LoginOutcome::Rejected(RejectReason::InvalidCredentials)
    );
}

#[tokio::test(start_paused = true)]
async fn third_failure_locks_the_gate_and_audits_once() {
    let mut h = harness();
    let roster = roster();

    for attempt in 1..=2 {
        let outcome = h.manager.login(&roster, "agent07", "wrong").await;
        assert_eq!(
            outcome,
            LoginOutcome::Rejected(RejectReason::InvalidCredentials)
        );
        let lines = h.audit_lines();
        assert!(lines
            .last()
            .unwrap()
            .contains(&format!("Invalid Credentials (Attempt {attempt}/3)")));
    }

    let outcome = h.manager.login(&roster, "agent07", "wrong").await;
    assert!(matches!(outcome, LoginOutcome::LockedOut { .. }));
    assert!(h
        .audit_lines()
        .last()
        .unwrap()
        .contains("[ACTION]: SYSTEM_LOCKOUT"));

    // While locked, even valid credentials are not evaluated and nothing
    // further is audited
    let audited = h.audit_lines().len();
    let outcome = h.manager.login(&roster, "agent07", "4471").await;
    assert!(matches!(outcome, LoginOutcome::LockedOut { .. }));
    assert_eq!(h.audit_lines().len(), audited);
}

#[tokio::test(start_paused = true)]
async fn banned_rejection_is_distinct_and_does_not_count_toward_lockout() {
    let mut h = harness();
    let roster = roster();

    for _ in 0..3 {
        let outcome = h.manager.login(&roster, "burned", "2222").await;
        assert_eq!(outcome, LoginOutcome::Rejected(RejectReason::Banned));
    }
    assert_eq!(h.manager.gate().attempts(), 0);
    assert!(h
        .audit_lines()
        .iter()
        .all(|l| l.contains("BANNED USER ATTEMPT")));

    // Gate still open after three banned rejections
    let outcome = h.manager.login(&roster, "agent07", "4471").await;
    assert!(matches!(outcome, LoginOutcome::Authenticated(_)));
}

#[tokio::test(start_paused = true)]
async fn paused_account_authenticates_normally() {
    let mut h = harness();
    let outcome = h.manager.login(&roster(), "benched", "1111").await;
    match outcome {
        LoginOutcome::Authenticated(account) => {
            assert_eq!(account.status, AccountStatus::Paused)
        }
        other => panic!("expected authentication, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn failed_attempts_capture_the_offered_credentials() {
    let mut h = harness();
    h.manager.login(&roster(), "ghost", "0000").await;

    let lines = h.audit_lines();
    assert!(lines[0].contains("[ATTEMPTED_CREDS]:"));
    assert!(lines[0].contains("ghost"));
    assert!(lines[0].contains("0000"));
}

#[tokio::test(start_paused = true)]
async fn scan_with_embedded_code_uses_the_manual_flow() {
    let mut h = harness();
    let outcome = h
        .manager
        .scan_login(&roster(), "agent07:4471")
        .await
        .unwrap();
    assert!(matches!(outcome, ScanOutcome::Authenticated(_)));
}

#[tokio::test(start_paused = true)]
async fn trusted_bare_scan_substitutes_the_stored_code() {
    let mut h = harness();
    let thirteen_days_ago = TrustStore::now_ms() - TRUST_WINDOW_MS + 24 * 60 * 60 * 1000;
    h.manager
        .trust_mut()
        .record("agent07", thirteen_days_ago)
        .unwrap();

    let outcome = h.manager.scan_login(&roster(), "agent07").await.unwrap();
    match outcome {
        ScanOutcome::Authenticated(account) => assert_eq!(account.username, "agent07"),
        other => panic!("expected authentication, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn stale_trust_entry_falls_back_to_manual() {
    let mut h = harness();
    let fifteen_days_ago = TrustStore::now_ms() - TRUST_WINDOW_MS - 24 * 60 * 60 * 1000;
    h.manager
        .trust_mut()
        .record("agent07", fifteen_days_ago)
        .unwrap();

    let outcome = h.manager.scan_login(&roster(), "agent07").await.unwrap();
    assert_eq!(
        outcome,
        ScanOutcome::FallbackToManual {
            prefill_username: "agent07".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn unknown_bare_scan_falls_back_to_manual() {
    let mut h = harness();
    let outcome = h.manager.scan_login(&roster(), "ghost").await.unwrap();
    assert_eq!(
        outcome,
        ScanOutcome::FallbackToManual {
            prefill_username: "ghost".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn banned_account_cannot_ride_the_trust_cache() {
    let mut h = harness();
    h.manager
        .trust_mut()
        .record("burned", TrustStore::now_ms())
        .unwrap();

    let outcome = h.manager.scan_login(&roster(), "burned").await.unwrap();
    assert_eq!(outcome, ScanOutcome::Rejected(RejectReason::Banned));
}

#[tokio::test(start_paused = true)]
async fn malformed_scan_payload_is_an_error() {
    let mut h = harness();
    assert!(h.manager.scan_login(&roster(), "").await.is_err());
    assert!(h.manager.scan_login(&roster(), ":1234").await.is_err());
}

#[tokio::test(start_paused = true)]
async fn logout_emits_a_session_end_entry() {
    let h = harness();
    h.manager.logout(&roster()[0]).await;

    let lines = h.audit_lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("[ACTION]: LOGOUT"));
    assert!(lines[0].contains("User Session Ended"));
}
