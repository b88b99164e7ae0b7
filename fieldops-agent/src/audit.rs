//! Audit log line format
//!
//! One audit event is a single line of labeled segments joined by `" || "`:
//! ACTOR, ACTION, DETAILS (optionally followed by ATTEMPTED_CREDS), LOC,
//! DEVICE, STATUS, AGENT. The splitter recovers the structure for log
//! viewers; a segment without a recognized `[LABEL]:` prefix is treated as
//! unlabeled free text, so arbitrary stored lines still render.

use crate::csv::{self, Row, ROW_INDEX_KEY};
use crate::device::DeviceSnapshot;
use crate::sheets::{SheetSource, Table};
use fieldops_common::types::Account;
use fieldops_common::Result;

/// Segment separator; literal, never escaped inside segments
pub const SEGMENT_SEPARATOR: &str = " || ";

/// Labels the splitter recognizes, in composition order
/// (ATTEMPTED_CREDS is optional and rides directly after DETAILS)
pub const KNOWN_LABELS: &[&str] = &[
    "ACTOR",
    "ACTION",
    "DETAILS",
    "ATTEMPTED_CREDS",
    "LOC",
    "DEVICE",
    "STATUS",
    "AGENT",
];

/// One structured audit event, prior to line composition
#[derive(Debug, Clone)]
pub struct AuditEntry {
    actor: String,
    action: String,
    details: String,
    attempted_credentials: Option<(String, String)>,
    device: DeviceSnapshot,
}

impl AuditEntry {
    /// Build an entry for an event.
    ///
    /// `account` is the acting identity when known; anonymous events (failed
    /// logins for unknown identifiers) log as GUEST. `attempted_credentials`
    /// carries the exact username/code pair a failed attempt presented.
    pub fn new(
        account: Option<&Account>,
        action: &str,
        details: &str,
        attempted_credentials: Option<(&str, &str)>,
        device: DeviceSnapshot,
    ) -> Self {
        let actor = match account {
            Some(a) => format!(
                "{} | {} ({})",
                a.username,
                if a.display_name.is_empty() { "N/A" } else { a.display_name.as_str() },
                if a.real_name.is_empty() { "N/A" } else { a.real_name.as_str() },
            ),
            None => "GUEST | N/A (N/A)".to_string(),
        };
        Self {
            actor,
            action: action.to_string(),
            details: details.to_string(),
            attempted_credentials: attempted_credentials
                .map(|(u, c)| (u.to_string(), c.to_string())),
            device,
        }
    }

    /// Compose the single-line wire form.
    pub fn compose(&self) -> String {
        let d = &self.device;
        let mut segments = vec![
            format!("[ACTOR]: {}", self.actor),
            format!("[ACTION]: {}", self.action),
            format!("[DETAILS]: {}", self.details),
        ];
        if let Some((user, code)) = &self.attempted_credentials {
            segments.push(format!(
                "[ATTEMPTED_CREDS]: User=\"{user}\" | Pass=\"{code}\""
            ));
        }
        segments.push(format!("[LOC]: {} | TZ: {}", d.location, d.timezone));
        segments.push(format!(
            "[DEVICE]: OS: {} | CPU: {} Cores | RAM: {} | Res: {}",
            d.platform, d.cpu_cores, d.memory, d.screen
        ));
        segments.push(format!(
            "[STATUS]: Bat: {} | Net: {} | Lang: {}",
            d.battery, d.network, d.language
        ));
        segments.push(format!("[AGENT]: {}", d.user_agent));
        segments.join(SEGMENT_SEPARATOR)
    }
}

/// Column aliases for the stored log line, tried in priority order
const LOG_COLUMNS: &[&str] = &["logData", "LOGS", "Data"];

/// Fetch stored audit lines from the log table, newest first.
///
/// The log column name has drifted across table revisions; the known names
/// are tried first, and when none matches the longest value in the row
/// stands in. Rows with no usable text are dropped.
pub async fn fetch_log_lines(source: &dyn SheetSource) -> Result<Vec<String>> {
    let text = source.fetch_csv(Table::AuditLog).await?;
    let mut lines: Vec<String> = csv::decode(&text).iter().filter_map(log_field).collect();
    lines.reverse();
    Ok(lines)
}

fn log_field(row: &Row) -> Option<String> {
    for key in LOG_COLUMNS {
        if let Some(value) = row.get(*key).filter(|v| !v.is_empty()) {
            return Some(value.clone());
        }
    }
    row.iter()
        .filter(|(key, _)| key.as_str() != ROW_INDEX_KEY)
        .map(|(_, value)| value)
        .filter(|v| !v.is_empty())
        .max_by_key(|v| v.len())
        .cloned()
}

/// One recovered segment of a stored audit line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditSegment {
    /// Recognized label, or `None` for unlabeled free text
    pub label: Option<String>,
    pub text: String,
}

/// Split a stored line back into labeled segments.
pub fn split_line(line: &str) -> Vec<AuditSegment> {
    line.split(SEGMENT_SEPARATOR).map(split_segment).collect()
}

fn split_segment(segment: &str) -> AuditSegment {
    if let Some(rest) = segment.strip_prefix('[') {
        if let Some(end) = rest.find("]:") {
            let label = &rest[..end];
            if KNOWN_LABELS.contains(&label) {
                return AuditSegment {
                    label: Some(label.to_string()),
                    text: rest[end + 2..].trim_start().to_string(),
                };
            }
        }
    }
    AuditSegment {
        label: None,
        text: segment.to_string(),
    }
}
