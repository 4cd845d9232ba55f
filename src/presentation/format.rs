use chrono::{DateTime, Utc};

/// Relative label for a past instant: "Just now", "5m ago", "3h ago",
/// "2d ago", or "Never" when absent. Future instants read as "Just now".
pub fn format_relative(instant: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(instant) = instant else {
        return "Never".to_string();
    };

    let minutes = (now - instant).num_minutes();
    if minutes < 1 {
        return "Just now".to_string();
    }
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    format!("{}d ago", hours / 24)
}

/// Integer with comma thousands separators.
pub fn format_count(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
