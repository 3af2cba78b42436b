// src/business_hours.rs

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Weekday};

/// Returns true when `now` falls inside the Monday-to-Friday
/// `[start_hour, end_hour)` notification window.
///
/// Saturday and Sunday are always outside the window regardless of
/// hour. A window with `start_hour == end_hour` never matches.
pub fn is_active_window(now: DateTime<FixedOffset>, start_hour: u32, end_hour: u32) -> bool {
    match now.weekday() {
        Weekday::Sat | Weekday::Sun => false,
        _ => {
            let hour = now.hour();
            start_hour <= hour && hour < end_hour
        }
    }
}
