use serde::{Deserialize, Deserializer, Serialize};

/// A device row as reported by the monitoring backend. All fields besides
/// `id` may be missing or null depending on how much the scanner learned
/// about the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceRecord {
    pub id: i64,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub open_ports: Vec<u16>,
    // The backend stores this as a 0/1 integer column and serializes it as-is.
    #[serde(default, deserialize_with = "flag_from_int_or_bool")]
    pub is_active: bool,
    #[serde(default)]
    pub last_seen: Option<String>,
    #[serde(default)]
    pub first_seen: Option<String>,
}

impl DeviceRecord {
    /// Display name preference: hostname, then IP, then a placeholder.
    pub fn display_name(&self) -> &str {
        self.hostname
            .as_deref()
            .or(self.ip_address.as_deref())
            .unwrap_or("Unknown Device")
    }
}

/// Aggregate dashboard statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsSummary {
    pub total_devices: u64,
    pub active_devices: u64,
    pub new_today: u64,
    #[serde(default)]
    pub last_scan: Option<String>,
}

/// Scan state reported by `/api/scan/status`. The backend also attaches a
/// `recent_scans` list; it is parsed leniently and kept only for logging.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanStatus {
    pub scan_in_progress: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_scans: Option<serde_json::Value>,
}

/// Severity of a user-visible notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NotifyLevel {
    pub fn label(&self) -> &'static str {
        match self {
            NotifyLevel::Info => "info",
            NotifyLevel::Success => "ok",
            NotifyLevel::Warning => "warn",
            NotifyLevel::Error => "error",
        }
    }
}

/// Envelope for `GET /api/stats`.
#[derive(Debug, Deserialize)]
pub struct StatsEnvelope {
    pub success: bool,
    #[serde(default)]
    pub stats: Option<StatsSummary>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Envelope for `GET /api/devices` and `GET /api/devices/active`.
#[derive(Debug, Deserialize)]
pub struct DevicesEnvelope {
    pub success: bool,
    #[serde(default)]
    pub devices: Option<Vec<DeviceRecord>>,
    #[serde(default)]
    #[allow(dead_code)]
    pub total: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Envelope for `GET /api/scan/status`. Unlike the other endpoints the
/// payload fields sit at the top level of the response.
#[derive(Debug, Deserialize)]
pub struct ScanStatusEnvelope {
    pub success: bool,
    #[serde(default)]
    pub scan_in_progress: Option<bool>,
    #[serde(default)]
    pub recent_scans: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

fn flag_from_int_or_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_deserializes_sqlite_style_row() {
        let json = r#"{
            "id": 7,
            "ip_address": "192.168.1.42",
            "mac_address": "aa:bb:cc:dd:ee:ff",
            "hostname": null,
            "vendor": "Acme",
            "device_type": "Printer",
            "first_seen": "2024-05-01 08:00:00",
            "last_seen": "2024-05-02 09:30:00",
            "is_active": 1,
            "open_ports": [80, 631]
        }"#;

        let device: DeviceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(device.id, 7);
        assert!(device.is_active);
        assert_eq!(device.open_ports, vec![80, 631]);
        assert_eq!(device.display_name(), "192.168.1.42");
    }

    #[test]
    fn device_accepts_missing_optional_fields() {
        let device: DeviceRecord =
            serde_json::from_str(r#"{"id": 1, "is_active": false}"#).unwrap();
        assert!(!device.is_active);
        assert!(device.open_ports.is_empty());
        assert_eq!(device.display_name(), "Unknown Device");
    }

    #[test]
    fn stats_envelope_parses_failure_shape() {
        let env: StatsEnvelope =
            serde_json::from_str(r#"{"success": false, "error": "db locked"}"#).unwrap();
        assert!(!env.success);
        assert_eq!(env.error.as_deref(), Some("db locked"));
        assert!(env.stats.is_none());
    }

    #[test]
    fn scan_status_envelope_payload_is_top_level() {
        let env: ScanStatusEnvelope = serde_json::from_str(
            r#"{"success": true, "scan_in_progress": true, "recent_scans": []}"#,
        )
        .unwrap();
        assert!(env.success);
        assert_eq!(env.scan_in_progress, Some(true));
    }
}
