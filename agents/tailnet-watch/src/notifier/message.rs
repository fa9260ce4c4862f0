//! Alert text rendering (Telegram MarkdownV2)

use tailnet_watch_core::{AlertIntent, Device, MS_PER_MINUTE};

const RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
    '\\',
];

/// Backslash-escape every MarkdownV2 reserved character
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if RESERVED.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Render an outage length as `1d 2h 3m`, dropping leading zero units
pub fn format_duration(ms: i64) -> String {
    let total_minutes = ms.max(0) / MS_PER_MINUTE;
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

pub fn format_alert(device: &Device, intent: &AlertIntent) -> String {
    let name = escape_markdown(&device.short_name);
    match intent {
        AlertIntent::Down {
            minutes_since_contact,
        } => format!(
            "🔴 *{}* is OFFLINE\nLast seen {} minutes ago",
            name, minutes_since_contact
        ),
        AlertIntent::Reminder { down_for_ms } => format!(
            "🟠 *{}* is still OFFLINE\nDown for {}",
            name,
            format_duration(*down_for_ms)
        ),
        AlertIntent::Recovered { down_for_ms } => format!(
            "🟢 *{}* is back ONLINE\nWas down for {}",
            name,
            format_duration(*down_for_ms)
        ),
    }
}

/// Aggregate alert for a cycle that could not fetch the device list
pub fn format_source_failure(error: &str) -> String {
    format!("⚠️ *Tailnet monitor error*\n{}", escape_markdown(error))
}
