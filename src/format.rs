use crate::models::DeviceRecord;
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use clap::ValueEnum;
use std::collections::BTreeMap;

/// Sort keys for device listings, matching the columns the dashboard offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeviceSort {
    Hostname,
    Ip,
    Type,
    Vendor,
    LastSeen,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Parse a backend timestamp. The API emits SQLite `CURRENT_TIMESTAMP`
/// strings (`YYYY-MM-DD HH:MM:SS`, UTC) but RFC 3339 is accepted too.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Human "time ago" string for a past instant.
pub fn format_time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds();
    if seconds < 60 {
        return "Just now".to_string();
    }

    let minutes = seconds / 60;
    if minutes < 60 {
        return plural(minutes, "minute");
    }

    let hours = minutes / 60;
    if hours < 24 {
        return plural(hours, "hour");
    }

    let days = hours / 24;
    if days < 30 {
        return plural(days, "day");
    }

    let months = days / 30;
    if months < 12 {
        return plural(months, "month");
    }

    plural(months / 12, "year")
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// Time-ago for an optional raw backend timestamp, with a fallback label.
pub fn format_seen(raw: Option<&str>, now: DateTime<Utc>) -> String {
    raw.and_then(parse_timestamp)
        .map(|ts| format_time_ago(ts, now))
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Normalize a MAC address to uppercase colon-separated pairs.
pub fn format_mac(mac: &str) -> String {
    let clean: String = mac
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .collect::<String>()
        .to_uppercase();
    if clean.len() != 12 {
        return mac.to_string();
    }
    clean
        .as_bytes()
        .chunks(2)
        .map(|pair| std::str::from_utf8(pair).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(":")
}

/// Numeric sort key for dotted-quad IPv4 strings. Unparseable input sorts
/// first, like the dashboard's table does.
pub fn ip_sort_key(ip: Option<&str>) -> u32 {
    let Some(ip) = ip else { return 0 };
    let mut key = 0u32;
    let mut octets = 0;
    for part in ip.split('.') {
        let Ok(octet) = part.parse::<u8>() else {
            return 0;
        };
        key = (key << 8) | octet as u32;
        octets += 1;
    }
    if octets == 4 {
        key
    } else {
        0
    }
}

/// Sort devices in place by the given key and order.
pub fn sort_devices(devices: &mut [DeviceRecord], sort: DeviceSort, order: SortOrder) {
    devices.sort_by(|a, b| {
        let ordering = match sort {
            DeviceSort::Hostname => lower(a.hostname.as_deref().or(a.ip_address.as_deref()))
                .cmp(&lower(b.hostname.as_deref().or(b.ip_address.as_deref()))),
            DeviceSort::Ip => {
                ip_sort_key(a.ip_address.as_deref()).cmp(&ip_sort_key(b.ip_address.as_deref()))
            }
            DeviceSort::Type => {
                lower(a.device_type.as_deref()).cmp(&lower(b.device_type.as_deref()))
            }
            DeviceSort::Vendor => lower(a.vendor.as_deref()).cmp(&lower(b.vendor.as_deref())),
            DeviceSort::LastSeen => seen_key(a).cmp(&seen_key(b)),
            DeviceSort::Status => a.is_active.cmp(&b.is_active),
        };
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

fn lower(value: Option<&str>) -> String {
    value.unwrap_or("").to_lowercase()
}

fn seen_key(device: &DeviceRecord) -> i64 {
    device
        .last_seen
        .as_deref()
        .and_then(parse_timestamp)
        .map(|ts| ts.timestamp())
        .unwrap_or(0)
}

/// Device count per type, for the device-mix chart.
pub fn device_type_mix(devices: &[DeviceRecord]) -> BTreeMap<String, usize> {
    let mut mix = BTreeMap::new();
    for device in devices {
        let key = device
            .device_type
            .clone()
            .unwrap_or_else(|| "Unknown".to_string());
        *mix.entry(key).or_insert(0) += 1;
    }
    mix
}

/// Bucket devices by hour of last activity over the trailing 24 hours.
/// Index 0 is 23 hours ago, index 23 is the current hour.
pub fn activity_by_hour(devices: &[DeviceRecord], now: DateTime<Utc>) -> [u32; 24] {
    let mut buckets = [0u32; 24];
    for device in devices {
        let Some(seen) = device.last_seen.as_deref().and_then(parse_timestamp) else {
            continue;
        };
        let age_hours = (now - seen).num_hours();
        if (0..24).contains(&age_hours) {
            buckets[(23 - age_hours) as usize] += 1;
        }
    }
    buckets
}

/// Clock label for an activity bucket index, e.g. "14:00".
pub fn hour_label(index: usize, now: DateTime<Utc>) -> String {
    let hour = (now.hour() as i64 - (23 - index as i64)).rem_euclid(24);
    format!("{hour:02}:00")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn device(id: i64) -> DeviceRecord {
        DeviceRecord {
            id,
            hostname: None,
            ip_address: None,
            mac_address: None,
            vendor: None,
            device_type: None,
            open_ports: Vec::new(),
            is_active: false,
            last_seen: None,
            first_seen: None,
        }
    }

    #[test]
    fn parses_sqlite_and_rfc3339_timestamps() {
        assert!(parse_timestamp("2024-05-01 08:00:00").is_some());
        assert!(parse_timestamp("2024-05-01T08:00:00Z").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn time_ago_buckets() {
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        let cases = [
            (now - chrono::Duration::seconds(30), "Just now"),
            (now - chrono::Duration::minutes(1), "1 minute ago"),
            (now - chrono::Duration::minutes(5), "5 minutes ago"),
            (now - chrono::Duration::hours(3), "3 hours ago"),
            (now - chrono::Duration::days(2), "2 days ago"),
            (now - chrono::Duration::days(60), "2 months ago"),
            (now - chrono::Duration::days(800), "2 years ago"),
        ];
        for (then, expected) in cases {
            assert_eq!(format_time_ago(then, now), expected);
        }
    }

    #[test]
    fn mac_normalization() {
        assert_eq!(format_mac("aa-bb-cc-dd-ee-ff"), "AA:BB:CC:DD:EE:FF");
        assert_eq!(format_mac("aabbccddeeff"), "AA:BB:CC:DD:EE:FF");
        // Malformed input passes through untouched.
        assert_eq!(format_mac("not-a-mac"), "not-a-mac");
    }

    #[test]
    fn ip_keys_sort_numerically() {
        let low = ip_sort_key(Some("192.168.1.9"));
        let high = ip_sort_key(Some("192.168.1.10"));
        assert!(low < high);
        assert_eq!(ip_sort_key(Some("bogus")), 0);
        assert_eq!(ip_sort_key(None), 0);
    }

    #[test]
    fn sorts_by_ip_descending() {
        let mut devices = vec![
            {
                let mut d = device(1);
                d.ip_address = Some("10.0.0.2".into());
                d
            },
            {
                let mut d = device(2);
                d.ip_address = Some("10.0.0.10".into());
                d
            },
        ];
        sort_devices(&mut devices, DeviceSort::Ip, SortOrder::Desc);
        assert_eq!(devices[0].id, 2);
    }

    #[test]
    fn hostname_sort_falls_back_to_ip() {
        let mut devices = vec![
            {
                let mut d = device(1);
                d.ip_address = Some("zebra".into());
                d
            },
            {
                let mut d = device(2);
                d.hostname = Some("alpha".into());
                d
            },
        ];
        sort_devices(&mut devices, DeviceSort::Hostname, SortOrder::Asc);
        assert_eq!(devices[0].id, 2);
    }

    #[test]
    fn device_mix_counts_unknown_types() {
        let mut a = device(1);
        a.device_type = Some("Printer".into());
        let b = device(2);
        let mix = device_type_mix(&[a, b]);
        assert_eq!(mix.get("Printer"), Some(&1));
        assert_eq!(mix.get("Unknown"), Some(&1));
    }

    #[test]
    fn activity_buckets_recent_hours() {
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 30, 0).unwrap();
        let mut a = device(1);
        a.last_seen = Some("2024-05-02 12:00:00".into());
        let mut b = device(2);
        b.last_seen = Some("2024-05-02 01:00:00".into());
        let mut old = device(3);
        old.last_seen = Some("2024-04-01 00:00:00".into());

        let buckets = activity_by_hour(&[a, b, old], now);
        assert_eq!(buckets[23], 1);
        assert_eq!(buckets[23 - 11], 1);
        assert_eq!(buckets.iter().sum::<u32>(), 2);
    }
}
