//! Best-effort device metadata for audit lines
//!
//! Everything here is opaque display text. A failed probe yields a
//! placeholder, never an error; none of it participates in correctness.

use std::fmt;

const UNAVAILABLE: &str = "N/A";

/// One snapshot of device characteristics, all pre-rendered as display text
#[derive(Debug, Clone)]
pub struct DeviceSnapshot {
    pub location: String,
    pub timezone: String,
    pub platform: String,
    pub cpu_cores: String,
    pub memory: String,
    pub screen: String,
    pub battery: String,
    pub network: String,
    pub language: String,
    pub user_agent: String,
}

impl Default for DeviceSnapshot {
    fn default() -> Self {
        let unavailable = || UNAVAILABLE.to_string();
        Self {
            location: unavailable(),
            timezone: unavailable(),
            platform: unavailable(),
            cpu_cores: unavailable(),
            memory: unavailable(),
            screen: unavailable(),
            battery: unavailable(),
            network: unavailable(),
            language: unavailable(),
            user_agent: unavailable(),
        }
    }
}

impl fmt::Display for DeviceSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.platform, self.user_agent)
    }
}

/// Provider of device snapshots
pub trait DeviceInfoProvider: Send + Sync {
    fn snapshot(&self) -> DeviceSnapshot;
}

/// Host-process probe: fills in what the standard library can see and leaves
/// the rest as placeholders (no geolocation, battery, or screen access here).
pub struct HostDeviceInfo;

impl DeviceInfoProvider for HostDeviceInfo {
    fn snapshot(&self) -> DeviceSnapshot {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get().to_string())
            .unwrap_or_else(|_| UNAVAILABLE.to_string());
        let language = std::env::var("LANG").unwrap_or_else(|_| UNAVAILABLE.to_string());

        DeviceSnapshot {
            platform: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            cpu_cores: cores,
            language,
            user_agent: format!("fieldops/{}", env!("CARGO_PKG_VERSION")),
            ..DeviceSnapshot::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_probe_always_produces_a_snapshot() {
        let snapshot = HostDeviceInfo.snapshot();
        assert!(!snapshot.platform.is_empty());
        assert!(snapshot.user_agent.starts_with("fieldops/"));
        // Unprobed fields keep their placeholder
        assert_eq!(snapshot.battery, UNAVAILABLE);
        assert_eq!(snapshot.location, UNAVAILABLE);
    }
}
