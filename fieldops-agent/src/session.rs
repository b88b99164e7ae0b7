//! Session trust state machine
//!
//! Login attempts run against a snapshot of the canonical accounts: username
//! compared case-insensitively, access code exactly. Three consecutive
//! failures lock the gate for 30 seconds; the lock is in-memory only, so a
//! process restart reopens it. Banned accounts are rejected with their own
//! reason; paused accounts authenticate normally (their restrictions apply at
//! the assignment level, not at login).
//!
//! The scan path accepts `USER:PIN`, legacy JSON, and legacy space-separated
//! payloads. A bare identifier instead consults the trust cache: a login
//! within the last 14 days substitutes the account's own stored code for
//! manual entry. The cache substitutes for code entry only; ban checks still
//! apply.

use crate::actions::AuditSink;
use crate::audit::AuditEntry;
use crate::device::DeviceInfoProvider;
use crate::trust::TrustStore;
use fieldops_common::types::{Account, AccountStatus};
use fieldops_common::{Error, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Consecutive failures before the gate locks
pub const MAX_ATTEMPTS: u8 = 3;

/// Lockout duration once the gate trips
pub const LOCKOUT: Duration = Duration::from_secs(30);

/// Perceived-latency delay applied before reporting a successful login
pub const SUCCESS_DELAY: Duration = Duration::from_millis(1200);

/// Why a credential check was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Account exists but is banned; distinct from bad credentials
    Banned,
    /// No account matches the username/code pair
    InvalidCredentials,
}

/// Outcome of a credential check
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Authenticated(Account),
    Rejected(RejectReason),
    /// The gate is locked; no check was evaluated
    LockedOut { remaining_secs: u64 },
}

/// Outcome of a scan-path login
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Authenticated(Account),
    Rejected(RejectReason),
    LockedOut { remaining_secs: u64 },
    /// No valid trust entry; caller should present manual entry with the
    /// identifier pre-filled
    FallbackToManual { prefill_username: String },
}

impl From<LoginOutcome> for ScanOutcome {
    fn from(outcome: LoginOutcome) -> Self {
        match outcome {
            LoginOutcome::Authenticated(a) => ScanOutcome::Authenticated(a),
            LoginOutcome::Rejected(r) => ScanOutcome::Rejected(r),
            LoginOutcome::LockedOut { remaining_secs } => {
                ScanOutcome::LockedOut { remaining_secs }
            }
        }
    }
}

/// Attempt counter and lockout window for the current session
///
/// Purely in-memory; nothing here persists across a restart.
#[derive(Debug, Default)]
pub struct SessionGate {
    attempts: u8,
    locked_until: Option<Instant>,
}

impl SessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consecutive failures since the last success or lockout expiry.
    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    /// Remaining lockout, if the gate is locked as of `now`.
    pub fn lockout_remaining(&self, now: Instant) -> Option<Duration> {
        self.locked_until
            .and_then(|until| until.checked_duration_since(now))
            .filter(|d| !d.is_zero())
    }

    pub fn is_locked_at(&self, now: Instant) -> bool {
        self.lockout_remaining(now).is_some()
    }

    /// Clear an expired lock, resetting the attempt counter.
    fn reopen_if_expired(&mut self, now: Instant) {
        if let Some(until) = self.locked_until {
            if now >= until {
                self.locked_until = None;
                self.attempts = 0;
            }
        }
    }

    fn note_success(&mut self) {
        self.attempts = 0;
    }

    /// Count a failure; returns true when this failure trips the lock.
    fn note_failure(&mut self, now: Instant) -> bool {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts >= MAX_ATTEMPTS {
            self.locked_until = Some(now + LOCKOUT);
            return true;
        }
        false
    }
}

/// Parsed scan payload: an identifier, optionally paired with a code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCredentials {
    pub username: String,
    pub code: Option<String>,
}

/// Parse a scan payload.
///
/// Accepted forms, in order: legacy JSON (`{"username": ..., "code": ...}`),
/// `USER:PIN`, legacy space-separated `USER PIN`, and a bare identifier.
/// Anything else is a format error; a malformed payload never silently
/// defaults.
pub fn parse_scan_payload(data: &str) -> Result<ScanCredentials> {
    let data = data.trim();
    if data.is_empty() {
        return Err(Error::InvalidInput("empty scan payload".to_string()));
    }

    if data.starts_with('{') {
        let value: serde_json::Value = serde_json::from_str(data)
            .map_err(|_| Error::InvalidInput("unparseable JSON scan payload".to_string()))?;
        let username = value
            .get("username")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::InvalidInput("scan payload missing username".to_string()))?;
        let code = value
            .get("code")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        return Ok(ScanCredentials {
            username: username.to_string(),
            code,
        });
    }

    if let Some(idx) = data.find(':') {
        let username = data[..idx].trim();
        let code = data[idx + 1..].trim();
        if username.is_empty() || code.is_empty() {
            return Err(Error::InvalidInput(
                "scan payload must be USER:PIN".to_string(),
            ));
        }
        return Ok(ScanCredentials {
            username: username.to_string(),
            code: Some(code.to_string()),
        });
    }

    let mut parts = data.split_whitespace();
    let first = parts.next().unwrap_or_default();
    match parts.next() {
        // Legacy space-separated form; extra tokens are ignored
        Some(code) => Ok(ScanCredentials {
            username: first.to_string(),
            code: Some(code.to_string()),
        }),
        // Bare identifier: the trust cache decides what happens next
        None => Ok(ScanCredentials {
            username: first.to_string(),
            code: None,
        }),
    }
}

/// Orchestrates credential checks, lockout, audit emission, and the trust
/// cache for one interactive session.
pub struct SessionManager {
    gate: SessionGate,
    trust: TrustStore,
    audit: Arc<dyn AuditSink>,
    device: Arc<dyn DeviceInfoProvider>,
}

impl SessionManager {
    pub fn new(
        trust: TrustStore,
        audit: Arc<dyn AuditSink>,
        device: Arc<dyn DeviceInfoProvider>,
    ) -> Self {
        Self {
            gate: SessionGate::new(),
            trust,
            audit,
            device,
        }
    }

    pub fn gate(&self) -> &SessionGate {
        &self.gate
    }

    pub fn trust(&self) -> &TrustStore {
        &self.trust
    }

    pub fn trust_mut(&mut self) -> &mut TrustStore {
        &mut self.trust
    }

    /// Pure credential check with gate bookkeeping; no audit, no delay.
    ///
    /// Banned rejections do not count toward the lockout threshold: the
    /// credentials were valid, the account is not.
    pub fn check_credentials(
        &mut self,
        accounts: &[Account],
        username: &str,
        code: &str,
        now: Instant,
    ) -> LoginOutcome {
        self.gate.reopen_if_expired(now);
        if let Some(remaining) = self.gate.lockout_remaining(now) {
            return LoginOutcome::LockedOut {
                remaining_secs: remaining.as_secs(),
            };
        }

        match accounts
            .iter()
            .find(|a| a.matches_credentials(username, code))
        {
            Some(account) if account.status == AccountStatus::Banned => {
                LoginOutcome::Rejected(RejectReason::Banned)
            }
            Some(account) => {
                self.gate.note_success();
                LoginOutcome::Authenticated(account.clone())
            }
            None => {
                if self.gate.note_failure(now) {
                    LoginOutcome::LockedOut {
                        remaining_secs: LOCKOUT.as_secs(),
                    }
                } else {
                    LoginOutcome::Rejected(RejectReason::InvalidCredentials)
                }
            }
        }
    }

    /// Full manual login: credential check plus audit emission, trust-cache
    /// update, and the perceived-latency delay on success.
    pub async fn login(
        &mut self,
        accounts: &[Account],
        username: &str,
        code: &str,
    ) -> LoginOutcome {
        let username = username.trim();
        let code = code.trim();
        let was_locked = self.gate.is_locked_at(Instant::now());
        let outcome = self.check_credentials(accounts, username, code, Instant::now());

        match &outcome {
            LoginOutcome::Authenticated(account) => {
                if let Err(e) = self.trust.record(&account.username, TrustStore::now_ms()) {
                    warn!("Trust cache update failed: {e}");
                }
                info!("Login succeeded for {}", account.username);
                self.emit_audit(Some(account), "LOGIN_SUCCESS", "Manual Login", None)
                    .await;
                tokio::time::sleep(SUCCESS_DELAY).await;
            }
            LoginOutcome::Rejected(RejectReason::Banned) => {
                let banned = accounts.iter().find(|a| a.is_named(username));
                self.emit_audit(
                    banned,
                    "LOGIN_FAIL",
                    "BANNED USER ATTEMPT",
                    Some((username, code)),
                )
                .await;
            }
            LoginOutcome::Rejected(RejectReason::InvalidCredentials) => {
                let details = format!(
                    "Invalid Credentials (Attempt {}/{})",
                    self.gate.attempts(),
                    MAX_ATTEMPTS
                );
                self.emit_audit(None, "LOGIN_FAIL", &details, Some((username, code)))
                    .await;
            }
            LoginOutcome::LockedOut { .. } if !was_locked => {
                // This attempt tripped the lock
                self.emit_audit(
                    None,
                    "SYSTEM_LOCKOUT",
                    &format!("{MAX_ATTEMPTS} Failed Attempts"),
                    Some((username, code)),
                )
                .await;
            }
            LoginOutcome::LockedOut { .. } => {}
        }

        outcome
    }

    /// Scan-path login.
    ///
    /// Payloads carrying a code go straight to the manual flow. A bare
    /// identifier uses the trust cache: within the validity window, the known
    /// account's own stored code is substituted; otherwise the caller falls
    /// back to manual entry with the identifier pre-filled.
    pub async fn scan_login(&mut self, accounts: &[Account], payload: &str) -> Result<ScanOutcome> {
        let credentials = parse_scan_payload(payload)?;

        if let Some(code) = credentials.code {
            return Ok(self.login(accounts, &credentials.username, &code).await.into());
        }

        let known = accounts
            .iter()
            .find(|a| a.is_named(&credentials.username))
            .cloned();
        match known {
            Some(account)
                if self
                    .trust
                    .is_trusted_at(&account.username, TrustStore::now_ms()) =>
            {
                let code = account.code.clone();
                Ok(self.login(accounts, &account.username, &code).await.into())
            }
            _ => Ok(ScanOutcome::FallbackToManual {
                prefill_username: credentials.username,
            }),
        }
    }

    /// Emit a logout audit entry for the bound account.
    pub async fn logout(&self, account: &Account) {
        self.emit_audit(Some(account), "LOGOUT", "User Session Ended", None)
            .await;
    }

    async fn emit_audit(
        &self,
        account: Option<&Account>,
        action: &str,
        details: &str,
        attempted: Option<(&str, &str)>,
    ) {
        let entry = AuditEntry::new(account, action, details, attempted, self.device.snapshot());
        self.audit.append_log(entry.compose()).await;
    }
}
