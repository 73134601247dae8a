use crate::models::{DeviceRecord, StatsSummary};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

/// Snapshot written by `export`: the full inventory plus the statistics
/// block, stamped with the fetch time.
#[derive(Debug, Serialize)]
pub struct ExportBundle {
    pub timestamp: DateTime<Utc>,
    pub statistics: Option<StatsSummary>,
    pub devices: Vec<DeviceRecord>,
    pub total_devices: usize,
}

impl ExportBundle {
    pub fn new(statistics: Option<StatsSummary>, devices: Vec<DeviceRecord>) -> Self {
        let total_devices = devices.len();
        Self {
            timestamp: Utc::now(),
            statistics,
            devices,
            total_devices,
        }
    }
}

pub fn write_export(bundle: &ExportBundle, format: ExportFormat, path: &Path) -> anyhow::Result<()> {
    let contents = match format {
        ExportFormat::Json => serde_json::to_string_pretty(bundle)?,
        ExportFormat::Csv => devices_csv(&bundle.devices),
    };
    std::fs::write(path, contents)?;
    info!(path = %path.display(), ?format, devices = bundle.total_devices, "export written");
    Ok(())
}

const CSV_HEADER: &str =
    "id,hostname,ip_address,mac_address,vendor,device_type,open_ports,is_active,first_seen,last_seen";

/// Render devices as CSV. Port lists are joined with `;`; fields containing
/// commas, quotes or newlines are quoted with doubled inner quotes.
pub fn devices_csv(devices: &[DeviceRecord]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for device in devices {
        let ports = device
            .open_ports
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        let row = [
            device.id.to_string(),
            device.hostname.clone().unwrap_or_default(),
            device.ip_address.clone().unwrap_or_default(),
            device.mac_address.clone().unwrap_or_default(),
            device.vendor.clone().unwrap_or_default(),
            device.device_type.clone().unwrap_or_default(),
            ports,
            device.is_active.to_string(),
            device.first_seen.clone().unwrap_or_default(),
            device.last_seen.clone().unwrap_or_default(),
        ];
        let line = row
            .iter()
            .map(|field| csv_escape(field))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
