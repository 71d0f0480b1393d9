//! Formatting helpers for command output

use chrono::{DateTime, Local};
use std::time::{SystemTime, UNIX_EPOCH};

/// Format timestamp as relative time ("2 hours ago")
pub fn format_relative_time(ts_ms: u64) -> String {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let Some(elapsed_ms) = now_ms.checked_sub(ts_ms) else {
        return "in the future".to_string();
    };
    let seconds = elapsed_ms / 1000;

    if seconds < 60 {
        format!("{} seconds ago", seconds)
    } else if seconds < 3600 {
        format!("{} minutes ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{} hours ago", seconds / 3600)
    } else if seconds < 604800 {
        format!("{} days ago", seconds / 86400)
    } else {
        format!("{} weeks ago", seconds / 604800)
    }
}

/// Format timestamp in local time ("2024-01-03 14:30:00")
pub fn format_absolute_time(ts_ms: u64) -> String {
    DateTime::from_timestamp_millis(ts_ms as i64)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
