//! Terminal output helpers.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;

/// Create a styled table for output
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS);
    table
}

/// Format a byte size into a human-readable string
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    match bytes {
        b if b >= TB => format!("{:.1} TB", b as f64 / TB as f64),
        b if b >= GB => format!("{:.1} GB", b as f64 / GB as f64),
        b if b >= MB => format!("{:.1} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.1} KB", b as f64 / KB as f64),
        b => format!("{b} B"),
    }
}

/// Format a millisecond timestamp as a date, or empty when unknown.
pub fn format_date(timestamp_ms: i64) -> String {
    if timestamp_ms <= 0 {
        return String::new();
    }
    chrono::DateTime::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

/// Shorten a UUID for listings unless full ids were requested.
pub fn format_uuid(uuid: &str, full: bool) -> String {
    if full || uuid.len() <= 8 {
        uuid.to_string()
    } else {
        format!("{}…", &uuid[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(999), "999 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn dates() {
        assert_eq!(format_date(0), "");
        assert_eq!(format_date(1_700_000_000_000), "2023-11-14 22:13");
    }

    #[test]
    fn uuids() {
        assert_eq!(format_uuid("abcd", false), "abcd");
        assert_eq!(
            format_uuid("0123456789abcdef", true),
            "0123456789abcdef"
        );
        assert_eq!(format_uuid("0123456789abcdef", false), "01234567…");
    }
}
