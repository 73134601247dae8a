use crate::format::{format_mac, format_seen, hour_label, sort_devices, DeviceSort, SortOrder};
use crate::models::{DeviceRecord, NotifyLevel, ScanStatus, StatsSummary};
use chrono::{DateTime, Local, Utc};
use std::collections::BTreeMap;

/// The dashboard's card grid caps how many recent devices it shows.
const RECENT_DEVICE_LIMIT: usize = 6;

/// Visual output surface. The sync coordinator hands each section's
/// validated payload to exactly one of these methods per cycle.
pub trait Renderer {
    fn render_stats(&self, stats: &StatsSummary);
    fn render_device_list(&self, devices: &[DeviceRecord]);
    fn render_scan_status(&self, status: &ScanStatus);
    fn notify(&self, message: &str, level: NotifyLevel);
}

/// Optional chart surface, injected into the coordinator when charts are
/// wanted rather than probed for at render time.
pub trait ChartSink {
    fn update_device_mix(&self, mix: &BTreeMap<String, usize>);
    fn update_activity(&self, buckets: &[u32; 24]);
}

/// Terminal renderer. Builds each section as one string and writes it with
/// a single print call, so overlapping cycles interleave at section
/// granularity at worst.
pub struct ConsoleRenderer {
    sort: DeviceSort,
    order: SortOrder,
    compact: bool,
}

impl ConsoleRenderer {
    pub fn new(sort: DeviceSort, order: SortOrder, compact: bool) -> Self {
        Self {
            sort,
            order,
            compact,
        }
    }
}

impl Renderer for ConsoleRenderer {
    fn render_stats(&self, stats: &StatsSummary) {
        print!("{}", stats_block(stats, Utc::now()));
    }

    fn render_device_list(&self, devices: &[DeviceRecord]) {
        let mut devices = devices.to_vec();
        sort_devices(&mut devices, self.sort, self.order);
        let block = if self.compact {
            device_cards(&devices, Utc::now())
        } else {
            device_table(&devices, Utc::now())
        };
        print!("{block}");
    }

    fn render_scan_status(&self, status: &ScanStatus) {
        print!("{}", scan_block(status, Local::now()));
    }

    fn notify(&self, message: &str, level: NotifyLevel) {
        println!("[{}] {}", level.label(), message);
    }
}

fn stats_block(stats: &StatsSummary, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("───────────────────────────────────────────────────────────\n");
    out.push_str("  NETWORK OVERVIEW\n");
    out.push_str("───────────────────────────────────────────────────────────\n");
    out.push_str(&format!("  Total Devices:   {:>6}\n", stats.total_devices));
    out.push_str(&format!("  Active Devices:  {:>6}\n", stats.active_devices));
    out.push_str(&format!("  New Today:       {:>6}\n", stats.new_today));
    let last_scan = format_seen(stats.last_scan.as_deref(), now);
    out.push_str(&format!("  Last Scan:       {last_scan}\n"));
    out
}

fn device_table(devices: &[DeviceRecord], now: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("───────────────────────────────────────────────────────────\n");
    out.push_str(&format!("  DEVICES ({})\n", devices.len()));
    out.push_str("───────────────────────────────────────────────────────────\n");

    if devices.is_empty() {
        out.push_str("  No active devices found\n");
        return out;
    }

    out.push_str(&format!(
        "  {:<8} {:<20} {:<15} {:<18} {:<14} {:>5}  {}\n",
        "Status", "Host", "IP", "MAC", "Type", "Ports", "Last Seen"
    ));
    for device in devices {
        let status = if device.is_active { "active" } else { "idle" };
        let mac = device
            .mac_address
            .as_deref()
            .map(format_mac)
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "  {:<8} {:<20} {:<15} {:<18} {:<14} {:>5}  {}\n",
            status,
            truncate(device.display_name(), 20),
            device.ip_address.as_deref().unwrap_or("-"),
            mac,
            truncate(device.device_type.as_deref().unwrap_or("-"), 14),
            device.open_ports.len(),
            format_seen(device.last_seen.as_deref(), now),
        ));
    }
    out
}

fn device_cards(devices: &[DeviceRecord], now: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("───────────────────────────────────────────────────────────\n");
    out.push_str("  RECENT DEVICES\n");
    out.push_str("───────────────────────────────────────────────────────────\n");

    if devices.is_empty() {
        out.push_str("  No active devices found\n");
        return out;
    }

    for device in devices.iter().take(RECENT_DEVICE_LIMIT) {
        let status = if device.is_active { "Active" } else { "Inactive" };
        out.push_str(&format!(
            "  {} [{}]\n",
            device.display_name(),
            status
        ));
        out.push_str(&format!(
            "    Type: {:<16} Last Seen: {}\n",
            device.device_type.as_deref().unwrap_or("Unknown"),
            format_seen(device.last_seen.as_deref(), now),
        ));
    }
    out
}

fn scan_block(status: &ScanStatus, now: DateTime<Local>) -> String {
    let scan = if status.scan_in_progress {
        "Scanning..."
    } else {
        "Idle"
    };
    format!(
        "  Scanner: {:<12} Last updated: {}\n",
        scan,
        now.format("%H:%M:%S")
    )
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let cut: String = value.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

/// Bar-chart renderer for the device-type mix and 24h activity histogram.
pub struct AsciiCharts;

impl ChartSink for AsciiCharts {
    fn update_device_mix(&self, mix: &BTreeMap<String, usize>) {
        print!("{}", mix_chart(mix));
    }

    fn update_activity(&self, buckets: &[u32; 24]) {
        print!("{}", activity_chart(buckets, Utc::now()));
    }
}

fn mix_chart(mix: &BTreeMap<String, usize>) -> String {
    let mut out = String::new();
    out.push_str("  DEVICE TYPES\n");
    let max = mix.values().copied().max().unwrap_or(0).max(1);
    for (kind, count) in mix {
        let width = (count * 30).div_ceil(max);
        out.push_str(&format!(
            "    {:<16} {:>3} {}\n",
            truncate(kind, 16),
            count,
            "█".repeat(width)
        ));
    }
    out
}

fn activity_chart(buckets: &[u32; 24], now: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("  ACTIVITY (last 24h)\n");
    let max = buckets.iter().copied().max().unwrap_or(0).max(1);
    for (index, count) in buckets.iter().enumerate() {
        if *count == 0 {
            continue;
        }
        let width = ((*count as usize) * 30).div_ceil(max as usize);
        out.push_str(&format!(
            "    {} {:>3} {}\n",
            hour_label(index, now),
            count,
            "█".repeat(width)
        ));
    }
    out
}
