use chrono::{DateTime, Utc};

/// relative age of `past` as shown on feed cards.
///
/// `Just now` under a minute, then `Nm ago`, `Nh ago`, `Nd ago` up to a week,
/// then the plain date.
pub fn time_ago(past: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(past);

    let mins = diff.num_minutes();
    let hours = diff.num_hours();
    let days = diff.num_days();

    match () {
        _ if mins < 1 => "Just now".to_string(),
        _ if mins < 60 => format!("{}m ago", mins),
        _ if hours < 24 => format!("{}h ago", hours),
        _ if days < 7 => format!("{}d ago", days),
        _ => past.format("%Y-%m-%d").to_string(),
    }
}

/// first `n` chars of `s` (char-aware).
pub fn prefix_chars(s: &str, n: usize) -> String { s.chars().take(n).collect() }
