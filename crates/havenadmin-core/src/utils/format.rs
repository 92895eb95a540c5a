use chrono::{DateTime, Utc};

/// Truncate a string to a maximum length in characters, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format a submission timestamp for listings
pub fn format_date(date: Option<DateTime<Utc>>) -> String {
    match date {
        Some(dt) => dt.format("%b %d, %Y").to_string(),
        None => "-".to_string(),
    }
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Describe how long a session has left
pub fn format_expiry(minutes: Option<i64>) -> String {
    match minutes {
        None => "no expiry".to_string(),
        Some(m) if m <= 0 => "expired".to_string(),
        Some(m) if m < 60 => format!("{}m left", m),
        Some(m) => format!("{}h {:02}m left", m / 60, m % 60),
    }
}
